//! Vendor-typed configuration as returned by device gateways.
//!
//! These types mirror what a device's own firmware or management library
//! exposes: concrete section types (fan mode variants, pool groups) and an
//! opaque extension object whose field set is fixed per vendor family. The
//! merge engine must never collapse that extension into a generic map,
//! because the concrete type is what lets a gateway re-emit the fields the
//! device expects. [`VendorExtension`] is the narrow capability the engine
//! uses instead of type-specific introspection.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// A single pool endpoint with credentials.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pool {
    pub url: String,
    pub user: String,
    pub password: String,
}

/// An ordered group of pools sharing a quota.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoolGroup {
    pub pools: Vec<Pool>,
    pub quota: Option<i64>,
    pub name: Option<String>,
}

/// Vendor pool configuration: ordered groups of endpoints.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoolConfig {
    pub groups: Vec<PoolGroup>,
}

/// Vendor fan control mode.
#[derive(Clone, Debug, PartialEq)]
pub enum FanMode {
    Normal { minimum_fans: i64, minimum_speed: i64 },
    Manual { speed: i64, minimum_fans: i64 },
    Immersion,
}

impl FanMode {
    /// Mode tag as reported over the wire.
    pub fn mode(&self) -> &'static str {
        match self {
            FanMode::Normal { .. } => "normal",
            FanMode::Manual { .. } => "manual",
            FanMode::Immersion => "immersion",
        }
    }

    pub fn speed(&self) -> Option<i64> {
        match self {
            FanMode::Manual { speed, .. } => Some(*speed),
            _ => None,
        }
    }

    pub fn minimum_fans(&self) -> Option<i64> {
        match self {
            FanMode::Normal { minimum_fans, .. } | FanMode::Manual { minimum_fans, .. } => {
                Some(*minimum_fans)
            }
            FanMode::Immersion => None,
        }
    }
}

impl Default for FanMode {
    fn default() -> Self {
        FanMode::Normal {
            minimum_fans: 1,
            minimum_speed: 0,
        }
    }
}

/// Vendor temperature limits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TemperatureSettings {
    pub target: Option<f64>,
    pub hot: Option<f64>,
    pub danger: Option<f64>,
}

/// Vendor mining mode.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MiningMode {
    #[default]
    Normal,
    Sleep,
    Low,
    High,
}

/// Narrow capability exposed by every vendor extension object.
///
/// Typed extensions declare their field set and silently refuse writes to
/// unknown names, which is what keeps a partial update from growing fields
/// the device would reject. An untyped bag reports no declared fields and
/// accepts any key.
pub trait VendorExtension: fmt::Debug + Send + Sync {
    /// Declared field names, or `None` when the object carries no schema
    /// (a plain map).
    fn declared_fields(&self) -> Option<&'static [&'static str]>;

    /// Current value of a field. `None` means the field is not part of
    /// this object at all; declared-but-unset fields read as `Null`.
    fn get(&self, field: &str) -> Option<Value>;

    /// Write a field, returning whether the write was accepted. Typed
    /// extensions ignore unknown names.
    fn set(&mut self, field: &str, value: Value) -> bool;

    fn boxed_clone(&self) -> Box<dyn VendorExtension>;
}

impl Clone for Box<dyn VendorExtension> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Field names declared by [`EspExtension`].
pub const ESP_EXTENSION_FIELDS: &[&str] = &[
    "frequency",
    "core_voltage",
    "min_fan_speed",
    "display_timeout",
    "rotation",
    "invertscreen",
    "overheat_mode",
    "stats_frequency",
    "overclock_enabled",
    "display",
];

/// Extension object for espminer firmware (Bitaxe and derivatives).
///
/// The integer fields map one-to-one onto the firmware's settings keys;
/// `display` selects the on-device display driver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EspExtension {
    pub frequency: Option<i64>,
    pub core_voltage: Option<i64>,
    pub min_fan_speed: Option<i64>,
    pub display_timeout: Option<i64>,
    pub rotation: Option<i64>,
    pub invertscreen: Option<i64>,
    pub overheat_mode: Option<i64>,
    pub stats_frequency: Option<i64>,
    pub overclock_enabled: Option<i64>,
    pub display: Option<String>,
}

impl EspExtension {
    fn int_value(v: &Option<i64>) -> Value {
        v.map(Value::from).unwrap_or(Value::Null)
    }

    fn set_int(slot: &mut Option<i64>, value: Value) {
        *slot = match value {
            Value::Null => None,
            other => other.as_i64().or(*slot),
        };
    }
}

impl VendorExtension for EspExtension {
    fn declared_fields(&self) -> Option<&'static [&'static str]> {
        Some(ESP_EXTENSION_FIELDS)
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "frequency" => Some(Self::int_value(&self.frequency)),
            "core_voltage" => Some(Self::int_value(&self.core_voltage)),
            "min_fan_speed" => Some(Self::int_value(&self.min_fan_speed)),
            "display_timeout" => Some(Self::int_value(&self.display_timeout)),
            "rotation" => Some(Self::int_value(&self.rotation)),
            "invertscreen" => Some(Self::int_value(&self.invertscreen)),
            "overheat_mode" => Some(Self::int_value(&self.overheat_mode)),
            "stats_frequency" => Some(Self::int_value(&self.stats_frequency)),
            "overclock_enabled" => Some(Self::int_value(&self.overclock_enabled)),
            "display" => Some(
                self.display
                    .as_ref()
                    .map(|s| Value::String(s.clone()))
                    .unwrap_or(Value::Null),
            ),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> bool {
        match field {
            "frequency" => Self::set_int(&mut self.frequency, value),
            "core_voltage" => Self::set_int(&mut self.core_voltage, value),
            "min_fan_speed" => Self::set_int(&mut self.min_fan_speed, value),
            "display_timeout" => Self::set_int(&mut self.display_timeout, value),
            "rotation" => Self::set_int(&mut self.rotation, value),
            "invertscreen" => Self::set_int(&mut self.invertscreen, value),
            "overheat_mode" => Self::set_int(&mut self.overheat_mode, value),
            "stats_frequency" => Self::set_int(&mut self.stats_frequency, value),
            "overclock_enabled" => Self::set_int(&mut self.overclock_enabled, value),
            "display" => {
                self.display = match value {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    _ => self.display.take(),
                };
            }
            _ => return false,
        }
        true
    }

    fn boxed_clone(&self) -> Box<dyn VendorExtension> {
        Box::new(self.clone())
    }
}

/// Schemaless extension fallback for devices whose management library
/// exposes settings as a bare map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UntypedExtension(pub BTreeMap<String, Value>);

impl VendorExtension for UntypedExtension {
    fn declared_fields(&self) -> Option<&'static [&'static str]> {
        None
    }

    fn get(&self, field: &str) -> Option<Value> {
        self.0.get(field).cloned()
    }

    fn set(&mut self, field: &str, value: Value) -> bool {
        self.0.insert(field.to_string(), value);
        true
    }

    fn boxed_clone(&self) -> Box<dyn VendorExtension> {
        Box::new(self.clone())
    }
}

/// Full vendor configuration for one device.
///
/// Borrowed from the gateway for the duration of a merge; the engine never
/// keeps a reference past one operation.
#[derive(Clone, Debug, Default)]
pub struct VendorConfig {
    pub pools: Option<PoolConfig>,
    pub fan_mode: Option<FanMode>,
    pub temperature: Option<TemperatureSettings>,
    pub mining_mode: Option<MiningMode>,
    pub extra: Option<Box<dyn VendorExtension>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn esp_extension_rejects_unknown_fields() {
        let mut ext = EspExtension::default();
        assert!(!ext.set("made_up_field", json!(1)));
        assert_eq!(ext.get("made_up_field"), None);
        assert!(ext.set("frequency", json!(525)));
        assert_eq!(ext.get("frequency"), Some(json!(525)));
    }

    #[test]
    fn esp_extension_reads_unset_fields_as_null() {
        let ext = EspExtension::default();
        assert_eq!(ext.get("rotation"), Some(Value::Null));
    }

    #[test]
    fn esp_extension_null_clears_a_field() {
        let mut ext = EspExtension {
            frequency: Some(490),
            ..Default::default()
        };
        assert!(ext.set("frequency", Value::Null));
        assert_eq!(ext.frequency, None);
    }

    #[test]
    fn untyped_extension_has_no_schema_and_accepts_any_key() {
        let mut ext = UntypedExtension::default();
        assert_eq!(ext.declared_fields(), None);
        assert!(ext.set("whatever", json!("x")));
        assert_eq!(ext.get("whatever"), Some(json!("x")));
    }

    #[test]
    fn mining_mode_parses_wire_tags() {
        assert_eq!("sleep".parse::<MiningMode>().ok(), Some(MiningMode::Sleep));
        assert_eq!("bogus".parse::<MiningMode>().ok(), None);
        assert_eq!(MiningMode::Low.to_string(), "low");
    }
}

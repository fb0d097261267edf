//! Miner family detection.
//!
//! One place decides which vendor family a device belongs to, so the
//! normalizer selection and the config validators can never disagree.
//! Detection is sparse by necessity: telemetry carries make/model strings
//! in varying places, and a vendor config only betrays its family through
//! the extension field set.

use serde_json::{Map, Value};

use crate::gateway::config::{ESP_EXTENSION_FIELDS, VendorConfig};

/// Vendor family a device belongs to.
///
/// Families share a configuration schema and validation rules. Devices
/// that match nothing known fall back to [`MinerFamily::Unknown`], which
/// gets the generic normalizer and a validator that accepts everything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MinerFamily {
    /// Bitaxe and other espminer-firmware devices.
    Bitaxe,
    #[default]
    Unknown,
}

fn lower_str(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Detect the family from raw or normalized telemetry data.
///
/// Checks `device_info.make` / `device_info.model`, then the top-level
/// `make` / `model` fields, case-insensitively. Never fails; anything
/// unrecognized is [`MinerFamily::Unknown`].
pub fn family_from_data(data: &Map<String, Value>) -> MinerFamily {
    let device_info = data.get("device_info").and_then(Value::as_object);
    let mut candidates = Vec::with_capacity(4);
    if let Some(info) = device_info {
        candidates.push(lower_str(info, "make"));
        candidates.push(lower_str(info, "model"));
    }
    candidates.push(lower_str(data, "make"));
    candidates.push(lower_str(data, "model"));

    if candidates.iter().any(|c| c.contains("bitaxe")) {
        MinerFamily::Bitaxe
    } else {
        MinerFamily::Unknown
    }
}

/// Detect the family from an existing vendor configuration.
///
/// A vendor config carries no make/model strings, so this goes by the
/// extension object: a declared field set (or, for an untyped bag, the
/// keys actually present) overlapping the espminer settings keys marks
/// the device as Bitaxe-family.
pub fn family_from_config(config: &VendorConfig) -> MinerFamily {
    let Some(extra) = config.extra.as_deref() else {
        return MinerFamily::Unknown;
    };

    let is_esp = match extra.declared_fields() {
        Some(fields) => fields.iter().any(|f| ESP_EXTENSION_FIELDS.contains(f)),
        // No schema to inspect; probe for espminer keys instead.
        None => ESP_EXTENSION_FIELDS.iter().any(|f| extra.get(f).is_some()),
    };

    if is_esp {
        MinerFamily::Bitaxe
    } else {
        MinerFamily::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::config::{EspExtension, UntypedExtension, VendorExtension};
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn detects_bitaxe_from_device_info() {
        let data = map(json!({"device_info": {"make": "BitAxe", "model": "Gamma"}}));
        assert_eq!(family_from_data(&data), MinerFamily::Bitaxe);
    }

    #[test]
    fn detects_bitaxe_from_top_level_model() {
        let data = map(json!({"model": "bitaxe ultra"}));
        assert_eq!(family_from_data(&data), MinerFamily::Bitaxe);
    }

    #[test]
    fn detection_is_case_insensitive() {
        let data = map(json!({"make": "BITAXE"}));
        assert_eq!(family_from_data(&data), MinerFamily::Bitaxe);
    }

    #[test]
    fn unknown_when_nothing_matches() {
        for data in [
            map(json!({})),
            map(json!({"make": "Antminer", "model": "S19"})),
            map(json!({"device_info": {"make": null}})),
            map(json!({"device_info": "garbage"})),
        ] {
            assert_eq!(family_from_data(&data), MinerFamily::Unknown);
        }
    }

    #[test]
    fn config_with_esp_extension_is_bitaxe() {
        let config = VendorConfig {
            extra: Some(Box::new(EspExtension::default())),
            ..Default::default()
        };
        assert_eq!(family_from_config(&config), MinerFamily::Bitaxe);
    }

    #[test]
    fn untyped_extension_detected_by_key_probe() {
        let mut bag = UntypedExtension::default();
        bag.set("frequency", json!(490));
        let config = VendorConfig {
            extra: Some(Box::new(bag)),
            ..Default::default()
        };
        assert_eq!(family_from_config(&config), MinerFamily::Bitaxe);

        let mut other = UntypedExtension::default();
        other.set("dpm_level", json!(2));
        let config = VendorConfig {
            extra: Some(Box::new(other)),
            ..Default::default()
        };
        assert_eq!(family_from_config(&config), MinerFamily::Unknown);
    }

    #[test]
    fn config_without_extension_is_unknown() {
        assert_eq!(family_from_config(&VendorConfig::default()), MinerFamily::Unknown);
    }
}

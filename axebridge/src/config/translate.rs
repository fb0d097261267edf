//! Translation between the vendor-neutral model and vendor-typed configs.
//!
//! Conversions are explicit and field-by-field through one adapter per
//! section, so the two models can evolve independently. An absent vendor
//! section reads as an absent internal field -- defaults are never
//! fabricated on the way in, only substituted on the way out where the
//! vendor side requires a value.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::model::{
    FanModeConfig, MinerConfig, MiningModeConfig, PoolEntry, PoolsConfig, TemperatureConfig,
};
use crate::config::model::PoolGroup as InternalPoolGroup;
use crate::gateway::config::{
    FanMode, MiningMode, Pool, PoolConfig, PoolGroup, TemperatureSettings, VendorConfig,
    VendorExtension,
};

/// Convert a vendor configuration to the internal model.
pub fn to_internal(vendor: &VendorConfig) -> MinerConfig {
    MinerConfig {
        pools: pools_from_vendor(vendor.pools.as_ref()),
        fan_mode: fan_mode_from_vendor(vendor.fan_mode.as_ref()),
        temperature: temperature_from_vendor(vendor.temperature.as_ref()),
        mining_mode: mining_mode_from_vendor(vendor.mining_mode.as_ref()),
        extra_config: extra_from_vendor(vendor.extra.as_deref()),
    }
}

/// Build an outgoing vendor configuration from an internal record.
///
/// Sections the internal record leaves absent fall back to vendor
/// defaults. The extension section starts from `existing`'s extension
/// object -- cloned, concrete type and all -- and only applies updates
/// that object accepts, so fields the internal model doesn't know about
/// survive the round trip.
pub fn to_vendor(internal: &MinerConfig, existing: &VendorConfig) -> VendorConfig {
    let mut out = VendorConfig {
        pools: Some(pools_to_vendor(internal.pools.as_ref())),
        fan_mode: Some(fan_mode_to_vendor(internal.fan_mode.as_ref())),
        temperature: Some(temperature_to_vendor(internal.temperature.as_ref())),
        mining_mode: Some(mining_mode_to_vendor(internal.mining_mode.as_ref())),
        extra: None,
    };

    let Some(existing_extra) = existing.extra.as_deref() else {
        return out;
    };

    let mut updated = existing_extra.boxed_clone();
    if let Some(patch) = internal.extra_config.as_ref().filter(|m| !m.is_empty()) {
        // Typed extensions drop unknown names here; an untyped bag takes
        // every key, which degenerates into a plain union merge.
        for (field, value) in patch {
            updated.set(field, value.clone());
        }
    }
    out.extra = Some(updated);
    out
}

fn pools_from_vendor(pools: Option<&PoolConfig>) -> Option<PoolsConfig> {
    let pools = pools?;
    Some(PoolsConfig {
        groups: pools
            .groups
            .iter()
            .map(|group| InternalPoolGroup {
                pools: group
                    .pools
                    .iter()
                    .map(|pool| PoolEntry {
                        url: Some(pool.url.clone()),
                        user: Some(pool.user.clone()),
                        password: Some(pool.password.clone()),
                    })
                    .collect(),
                quota: group.quota,
                name: group.name.clone(),
            })
            .collect(),
    })
}

fn pools_to_vendor(internal: Option<&PoolsConfig>) -> PoolConfig {
    let Some(internal) = internal.filter(|p| !p.groups.is_empty()) else {
        return PoolConfig::default();
    };

    PoolConfig {
        groups: internal
            .groups
            .iter()
            .map(|group| PoolGroup {
                pools: group
                    .pools
                    .iter()
                    .map(|pool| Pool {
                        url: pool.url.clone().unwrap_or_default(),
                        user: pool.user.clone().unwrap_or_default(),
                        password: pool.password.clone().unwrap_or_default(),
                    })
                    .collect(),
                quota: group.quota,
                name: group.name.clone(),
            })
            .collect(),
    }
}

fn fan_mode_from_vendor(fan_mode: Option<&FanMode>) -> Option<FanModeConfig> {
    let fan_mode = fan_mode?;
    Some(FanModeConfig {
        mode: Some(fan_mode.mode().to_string()),
        speed: fan_mode.speed(),
        minimum_fans: fan_mode.minimum_fans(),
    })
}

fn fan_mode_to_vendor(internal: Option<&FanModeConfig>) -> FanMode {
    let Some(internal) = internal else {
        return FanMode::default();
    };

    match internal.mode.as_deref() {
        Some("manual") => FanMode::Manual {
            speed: internal.speed.unwrap_or(100),
            minimum_fans: internal.minimum_fans.unwrap_or(1),
        },
        Some("immersion") => FanMode::Immersion,
        // Normal and anything unrecognized get safe automatic control.
        _ => FanMode::Normal {
            minimum_fans: internal.minimum_fans.unwrap_or(1),
            minimum_speed: 0,
        },
    }
}

fn temperature_from_vendor(temperature: Option<&TemperatureSettings>) -> Option<TemperatureConfig> {
    let temperature = temperature?;
    Some(TemperatureConfig {
        target: temperature.target,
        hot: temperature.hot,
        danger: temperature.danger,
    })
}

fn temperature_to_vendor(internal: Option<&TemperatureConfig>) -> TemperatureSettings {
    let Some(internal) = internal else {
        return TemperatureSettings::default();
    };
    TemperatureSettings {
        target: internal.target,
        hot: internal.hot,
        danger: internal.danger,
    }
}

fn mining_mode_from_vendor(mining_mode: Option<&MiningMode>) -> Option<MiningModeConfig> {
    let mining_mode = mining_mode?;
    Some(MiningModeConfig {
        mode: Some(mining_mode.to_string()),
    })
}

fn mining_mode_to_vendor(internal: Option<&MiningModeConfig>) -> MiningMode {
    internal
        .and_then(|m| m.mode.as_deref())
        .and_then(|mode| mode.parse().ok())
        .unwrap_or_default()
}

/// Read a vendor extension into a plain map of its non-null fields.
///
/// Reading goes through the declared field names only; an object with no
/// declared schema cannot be read safely and reports as absent.
fn extra_from_vendor(extra: Option<&dyn VendorExtension>) -> Option<BTreeMap<String, Value>> {
    let extra = extra?;
    let fields = extra.declared_fields()?;
    let map: BTreeMap<String, Value> = fields
        .iter()
        .filter_map(|field| {
            extra
                .get(field)
                .filter(|value| !value.is_null())
                .map(|value| (field.to_string(), value))
        })
        .collect();
    Some(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::config::{EspExtension, UntypedExtension};
    use serde_json::json;

    fn esp_config() -> VendorConfig {
        VendorConfig {
            pools: Some(PoolConfig {
                groups: vec![PoolGroup {
                    pools: vec![Pool {
                        url: "stratum+tcp://pool.example:3333".into(),
                        user: "bc1qworker".into(),
                        password: "x".into(),
                    }],
                    quota: Some(1),
                    name: Some("default".into()),
                }],
            }),
            fan_mode: Some(FanMode::Manual { speed: 60, minimum_fans: 1 }),
            temperature: Some(TemperatureSettings {
                target: Some(60.0),
                hot: Some(75.0),
                danger: Some(90.0),
            }),
            mining_mode: Some(MiningMode::Normal),
            extra: Some(Box::new(EspExtension {
                frequency: Some(490),
                core_voltage: Some(1100),
                ..Default::default()
            })),
        }
    }

    #[test]
    fn vendor_sections_map_field_by_field() {
        let internal = to_internal(&esp_config());

        let pools = internal.pools.unwrap();
        assert_eq!(pools.groups.len(), 1);
        assert_eq!(
            pools.groups[0].pools[0].url.as_deref(),
            Some("stratum+tcp://pool.example:3333")
        );

        let fan = internal.fan_mode.unwrap();
        assert_eq!(fan.mode.as_deref(), Some("manual"));
        assert_eq!(fan.speed, Some(60));

        assert_eq!(internal.temperature.unwrap().hot, Some(75.0));
        assert_eq!(internal.mining_mode.unwrap().mode.as_deref(), Some("normal"));

        let extra = internal.extra_config.unwrap();
        assert_eq!(extra["frequency"], json!(490));
        assert_eq!(extra["core_voltage"], json!(1100));
        // Unset declared fields are not reported.
        assert!(!extra.contains_key("rotation"));
    }

    #[test]
    fn absent_vendor_sections_read_as_absent() {
        let internal = to_internal(&VendorConfig::default());
        assert!(internal.pools.is_none());
        assert!(internal.fan_mode.is_none());
        assert!(internal.temperature.is_none());
        assert!(internal.mining_mode.is_none());
        assert!(internal.extra_config.is_none());
    }

    #[test]
    fn untyped_extension_reads_as_absent() {
        let mut bag = UntypedExtension::default();
        bag.set("frequency", json!(400));
        let vendor = VendorConfig {
            extra: Some(Box::new(bag)),
            ..Default::default()
        };
        assert!(to_internal(&vendor).extra_config.is_none());
    }

    #[test]
    fn absent_internal_sections_get_vendor_defaults() {
        let out = to_vendor(&MinerConfig::default(), &esp_config());
        assert_eq!(out.pools, Some(PoolConfig::default()));
        assert_eq!(out.fan_mode, Some(FanMode::default()));
        assert_eq!(out.mining_mode, Some(MiningMode::Normal));
        assert_eq!(out.temperature, Some(TemperatureSettings::default()));
    }

    #[test]
    fn existing_extension_passes_through_when_patch_is_empty() {
        let out = to_vendor(&MinerConfig::default(), &esp_config());
        let extra = out.extra.unwrap();
        assert_eq!(extra.get("frequency"), Some(json!(490)));
        assert_eq!(extra.get("core_voltage"), Some(json!(1100)));
    }

    #[test]
    fn known_extension_fields_update_and_unknown_keys_drop() {
        let internal = MinerConfig {
            extra_config: Some(BTreeMap::from([
                ("frequency".to_string(), json!(525)),
                ("made_up_field".to_string(), json!(1)),
            ])),
            ..Default::default()
        };
        let out = to_vendor(&internal, &esp_config());
        let extra = out.extra.unwrap();
        // Concrete type preserved: the declared field set is still esp's.
        assert!(extra.declared_fields().is_some());
        assert_eq!(extra.get("frequency"), Some(json!(525)));
        assert_eq!(extra.get("core_voltage"), Some(json!(1100)));
        assert_eq!(extra.get("made_up_field"), None);
    }

    #[test]
    fn untyped_extension_takes_union_merge() {
        let mut bag = UntypedExtension::default();
        bag.set("dpm_level", json!(2));
        bag.set("fan_curve", json!("quiet"));
        let existing = VendorConfig {
            extra: Some(Box::new(bag)),
            ..Default::default()
        };

        let internal = MinerConfig {
            extra_config: Some(BTreeMap::from([
                ("fan_curve".to_string(), json!("loud")),
                ("brand_new".to_string(), json!(7)),
            ])),
            ..Default::default()
        };
        let out = to_vendor(&internal, &existing);
        let extra = out.extra.unwrap();
        assert_eq!(extra.get("dpm_level"), Some(json!(2)));
        assert_eq!(extra.get("fan_curve"), Some(json!("loud")));
        assert_eq!(extra.get("brand_new"), Some(json!(7)));
    }

    #[test]
    fn fan_mode_adapter_substitutes_safe_defaults() {
        let manual = fan_mode_to_vendor(Some(&FanModeConfig {
            mode: Some("manual".into()),
            speed: None,
            minimum_fans: None,
        }));
        assert_eq!(manual, FanMode::Manual { speed: 100, minimum_fans: 1 });

        let unknown = fan_mode_to_vendor(Some(&FanModeConfig {
            mode: Some("turbo".into()),
            speed: Some(50),
            minimum_fans: None,
        }));
        assert_eq!(unknown, FanMode::Normal { minimum_fans: 1, minimum_speed: 0 });
    }

    #[test]
    fn mining_mode_adapter_parses_tags() {
        assert_eq!(
            mining_mode_to_vendor(Some(&MiningModeConfig { mode: Some("sleep".into()) })),
            MiningMode::Sleep
        );
        assert_eq!(
            mining_mode_to_vendor(Some(&MiningModeConfig { mode: Some("warp".into()) })),
            MiningMode::Normal
        );
        assert_eq!(mining_mode_to_vendor(None), MiningMode::Normal);
    }
}

//! Vendor-neutral configuration model.
//!
//! This is the shape clients read and patch. Every field is optional:
//! during a merge, absence means "leave the device's current value
//! alone", never "clear it". The `extra_config` map carries the
//! vendor-specific scalar settings that have no neutral representation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A pool endpoint with credentials.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PoolEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// An ordered group of pool endpoints sharing a quota.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PoolGroup {
    #[serde(default)]
    pub pools: Vec<PoolEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Pool configuration: ordered groups in failover priority order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PoolsConfig {
    #[serde(default)]
    pub groups: Vec<PoolGroup>,
}

/// Fan control configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FanModeConfig {
    /// Mode tag: `normal`, `manual`, or `immersion`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Fan duty cycle percent, only meaningful in manual mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_fans: Option<i64>,
}

/// Temperature threshold configuration (degrees Celsius).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemperatureConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danger: Option<f64>,
}

/// Mining mode configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MiningModeConfig {
    /// Mode tag: `normal`, `sleep`, `low`, or `high`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Vendor-neutral miner configuration.
///
/// Doubles as the PATCH request body: clients send only the fields they
/// want changed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MinerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pools: Option<PoolsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_mode: Option<FanModeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<TemperatureConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_mode: Option<MiningModeConfig>,
    /// Vendor-specific scalar settings, keyed by the vendor's own field
    /// names.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub extra_config: Option<BTreeMap<String, Value>>,
}

impl MinerConfig {
    /// True when the record carries no settings at all.
    pub fn is_empty(&self) -> bool {
        *self == MinerConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_do_not_serialize() {
        let config = MinerConfig {
            fan_mode: Some(FanModeConfig {
                mode: Some("manual".into()),
                speed: Some(80),
                minimum_fans: None,
            }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({"fan_mode": {"mode": "manual", "speed": 80}})
        );
    }

    #[test]
    fn patch_body_roundtrips() {
        let patch: MinerConfig = serde_json::from_value(json!({
            "extra_config": {"frequency": 525},
            "temperature": {"target": 60.0},
        }))
        .unwrap();
        assert_eq!(patch.extra_config.as_ref().unwrap()["frequency"], json!(525));
        assert_eq!(patch.temperature.unwrap().target, Some(60.0));
        assert!(patch.pools.is_none());
    }

    #[test]
    fn empty_config_detected() {
        assert!(MinerConfig::default().is_empty());
        let config = MinerConfig {
            mining_mode: Some(MiningModeConfig { mode: Some("sleep".into()) }),
            ..Default::default()
        };
        assert!(!config.is_empty());
    }
}

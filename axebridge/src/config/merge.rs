//! Partial-update merge and the full merge/validate pipeline.
//!
//! A client patch carries only the fields it wants changed. Merging folds
//! it onto the device's current configuration so unrelated settings
//! survive, with one deliberate exception: `pools` replaces atomically,
//! because half of a failover list is not a meaningful configuration.
//!
//! The fetch-merge-send sequence is not atomic at the system level. Two
//! racing patches for one device will last-write-win; callers that need
//! stronger guarantees must serialize updates per device themselves.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

use crate::config::model::{
    FanModeConfig, MinerConfig, MiningModeConfig, TemperatureConfig,
};
use crate::config::translate;
use crate::config::validate::validator_for;
use crate::error::ConfigError;
use crate::gateway::config::VendorConfig;
use crate::telemetry::detect::family_from_config;

/// Merge a partial patch onto a baseline record.
///
/// Top-level sections present in the patch win; within `fan_mode`,
/// `temperature` and `mining_mode` the merge goes field by field so a
/// patch touching one field leaves its siblings alone. `extra_config`
/// merges key by key (an explicit null clears the key on write). `pools`
/// is atomic: present in the patch means full replacement.
pub fn merge_patch(baseline: &MinerConfig, patch: &MinerConfig) -> MinerConfig {
    MinerConfig {
        pools: patch.pools.clone().or_else(|| baseline.pools.clone()),
        fan_mode: merge_fan_mode(baseline.fan_mode.as_ref(), patch.fan_mode.as_ref()),
        temperature: merge_temperature(baseline.temperature.as_ref(), patch.temperature.as_ref()),
        mining_mode: merge_mining_mode(baseline.mining_mode.as_ref(), patch.mining_mode.as_ref()),
        extra_config: merge_extra(baseline.extra_config.as_ref(), patch.extra_config.as_ref()),
    }
}

fn merge_fan_mode(
    baseline: Option<&FanModeConfig>,
    patch: Option<&FanModeConfig>,
) -> Option<FanModeConfig> {
    match (baseline, patch) {
        (Some(base), Some(patch)) => Some(FanModeConfig {
            mode: patch.mode.clone().or_else(|| base.mode.clone()),
            speed: patch.speed.or(base.speed),
            minimum_fans: patch.minimum_fans.or(base.minimum_fans),
        }),
        (base, patch) => patch.or(base).cloned(),
    }
}

fn merge_temperature(
    baseline: Option<&TemperatureConfig>,
    patch: Option<&TemperatureConfig>,
) -> Option<TemperatureConfig> {
    match (baseline, patch) {
        (Some(base), Some(patch)) => Some(TemperatureConfig {
            target: patch.target.or(base.target),
            hot: patch.hot.or(base.hot),
            danger: patch.danger.or(base.danger),
        }),
        (base, patch) => patch.or(base).copied(),
    }
}

fn merge_mining_mode(
    baseline: Option<&MiningModeConfig>,
    patch: Option<&MiningModeConfig>,
) -> Option<MiningModeConfig> {
    match (baseline, patch) {
        (Some(base), Some(patch)) => Some(MiningModeConfig {
            mode: patch.mode.clone().or_else(|| base.mode.clone()),
        }),
        (base, patch) => patch.or(base).cloned(),
    }
}

fn merge_extra(
    baseline: Option<&BTreeMap<String, Value>>,
    patch: Option<&BTreeMap<String, Value>>,
) -> Option<BTreeMap<String, Value>> {
    match (baseline, patch) {
        (Some(base), Some(patch)) => {
            let mut merged = base.clone();
            for (key, value) in patch {
                merged.insert(key.clone(), value.clone());
            }
            Some(merged)
        }
        (base, patch) => patch.or(base).cloned(),
    }
}

/// Run the full pipeline for one configuration patch.
///
/// Translates the existing vendor config to an internal baseline, merges
/// the patch, validates the merged record with the family's validator,
/// and builds the outgoing vendor config with the existing extension
/// object preserved. Fails fast when the existing config has no extension
/// to preserve.
pub fn merge_and_validate(
    ip: &str,
    existing: &VendorConfig,
    patch: &MinerConfig,
) -> Result<VendorConfig, ConfigError> {
    let baseline = translate::to_internal(existing);
    let merged = merge_patch(&baseline, patch);

    let family = family_from_config(existing);
    validator_for(family).validate(&merged)?;

    if existing.extra.is_none() {
        return Err(ConfigError::ExtensionUnavailable);
    }

    info!(ip, %family, "configuration patch validated");
    Ok(translate::to_vendor(&merged, existing))
}

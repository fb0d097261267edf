//! Per-family configuration constraint validation.
//!
//! Runs against the fully merged internal record before anything is sent
//! to a device. The default validator accepts everything; family
//! validators enforce the discrete value sets their hardware actually
//! supports. Exactly one violation is reported at a time so the client
//! gets a single actionable message.

use serde_json::Value;
use thiserror::Error;

use crate::config::model::MinerConfig;
use crate::telemetry::detect::MinerFamily;

/// A configuration field value outside its allowed set.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConstraintError {
    #[error("invalid {field} {value} for {family} miner; accepted values are: {allowed:?}")]
    NotInSet {
        family: MinerFamily,
        field: &'static str,
        value: Value,
        allowed: &'static [i64],
    },

    #[error("invalid {field} {value} for {family} miner; an integer is required")]
    NotAnInteger {
        family: MinerFamily,
        field: &'static str,
        value: Value,
    },
}

/// Validates a merged internal record against one family's constraints.
pub trait ConstraintValidator: Send + Sync {
    fn validate(&self, config: &MinerConfig) -> Result<(), ConstraintError>;
}

/// Select the validator for a family.
pub fn validator_for(family: MinerFamily) -> &'static dyn ConstraintValidator {
    match family {
        MinerFamily::Bitaxe => &BitaxeValidator,
        MinerFamily::Unknown => &DefaultValidator,
    }
}

/// Accepts any configuration.
pub struct DefaultValidator;

impl ConstraintValidator for DefaultValidator {
    fn validate(&self, _config: &MinerConfig) -> Result<(), ConstraintError> {
        Ok(())
    }
}

/// Allowed ASIC clock frequencies (MHz).
const FREQUENCY_MHZ: &[i64] = &[400, 490, 525, 550, 600, 625];
/// Allowed core voltages (mV).
const CORE_VOLTAGE_MV: &[i64] = &[1000, 1060, 1100, 1150, 1200, 1250];
/// Allowed display rotations (degrees).
const ROTATION_DEG: &[i64] = &[0, 90, 180, 270];
/// Allowed display timeouts (minutes, -1 = never).
const DISPLAY_TIMEOUT_MIN: &[i64] = &[-1, 1, 5, 10, 30, 60];
/// Boolean-like firmware flags.
const FLAG: &[i64] = &[0, 1];

/// Checked fields in declaration order; first failure wins. `None` for
/// the allowed set means any integer is fine.
const BITAXE_CHECKS: &[(&str, Option<&[i64]>)] = &[
    ("frequency", Some(FREQUENCY_MHZ)),
    ("core_voltage", Some(CORE_VOLTAGE_MV)),
    ("min_fan_speed", None),
    ("display_timeout", Some(DISPLAY_TIMEOUT_MIN)),
    ("rotation", Some(ROTATION_DEG)),
    ("invertscreen", Some(FLAG)),
    ("overheat_mode", Some(FLAG)),
    ("stats_frequency", None),
    ("overclock_enabled", Some(FLAG)),
];

/// Validator for espminer-firmware devices.
///
/// Only looks at `extra_config`, and only when at least one espminer
/// field name is present -- a patch touching nothing the family knows
/// about short-circuits without any checks. Unknown field names are never
/// validated; the translator drops them later anyway.
pub struct BitaxeValidator;

impl ConstraintValidator for BitaxeValidator {
    fn validate(&self, config: &MinerConfig) -> Result<(), ConstraintError> {
        let Some(extra) = config.extra_config.as_ref().filter(|m| !m.is_empty()) else {
            return Ok(());
        };

        let touches_known_field = BITAXE_CHECKS
            .iter()
            .any(|(field, _)| extra.get(*field).is_some_and(|v| !v.is_null()));
        if !touches_known_field {
            return Ok(());
        }

        for &(field, allowed) in BITAXE_CHECKS {
            let Some(value) = extra.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let Some(int) = value.as_i64() else {
                return Err(ConstraintError::NotAnInteger {
                    family: MinerFamily::Bitaxe,
                    field,
                    value: value.clone(),
                });
            };
            if let Some(allowed) = allowed
                && !allowed.contains(&int)
            {
                return Err(ConstraintError::NotInSet {
                    family: MinerFamily::Bitaxe,
                    field,
                    value: value.clone(),
                    allowed,
                });
            }
        }

        Ok(())
    }
}

//! Canonical measurement units and best-effort conversion.
//!
//! Vendors report hashrate in whatever unit their firmware happens to use
//! (H/s, MH/s, Gh/s, Th/s), sometimes as a structured rate+unit pair and
//! sometimes as a bare number. Everything here converges on two canonical
//! units: Gh/s for hashrate and J/Th for efficiency. Conversion is a
//! heuristic, not a protocol decode -- unrecognized input becomes a zero
//! measurement rather than an error, because a dashboard with one zeroed
//! gauge beats a dead telemetry endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;

/// Canonical hashrate unit value (1e9 = Gh/s).
pub const GHS_UNIT_VALUE: u64 = 1_000_000_000;

/// Canonical hashrate unit suffix.
pub const GHS_SUFFIX: &str = "Gh/s";

/// Canonical efficiency unit suffix.
pub const JTH_SUFFIX: &str = "J/Th";

/// Calculated efficiency above this is considered implausible and triggers
/// the already-Th/s reinterpretation of the hashrate figure.
const EFFICIENCY_PLAUSIBLE_MAX_JTH: f64 = 1000.0;

/// Hashrate unit descriptor (multiplier relative to H/s plus suffix).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HashrateUnit {
    pub value: u64,
    pub suffix: String,
}

/// A hashrate measurement in canonical form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Hashrate {
    pub unit: HashrateUnit,
    pub rate: f64,
}

impl Hashrate {
    /// A canonical Gh/s measurement.
    pub fn ghs(rate: f64) -> Self {
        Self {
            unit: HashrateUnit {
                value: GHS_UNIT_VALUE,
                suffix: GHS_SUFFIX.to_string(),
            },
            rate,
        }
    }
}

/// Efficiency unit descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EfficiencyUnit {
    pub suffix: String,
}

/// An efficiency measurement in canonical form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Efficiency {
    pub unit: EfficiencyUnit,
    pub rate: f64,
}

impl Efficiency {
    /// A canonical J/Th measurement.
    pub fn jth(rate: f64) -> Self {
        Self {
            unit: EfficiencyUnit {
                suffix: JTH_SUFFIX.to_string(),
            },
            rate,
        }
    }
}

/// Read a JSON value as f64, accepting numbers and numeric strings
/// (including scientific notation).
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Infer a unit multiplier from a bare number's magnitude.
///
/// Vendors disagree on what unit an unlabeled hashrate number carries, so
/// large values are assumed to be H/s, mid-range values Gh/s, and small
/// values Th/s.
fn unit_from_magnitude(rate: f64) -> f64 {
    if rate >= 1e8 {
        1.0 // H/s
    } else if rate >= 1e6 {
        1.0 // H/s
    } else if rate >= 1e3 {
        1e9 // Gh/s
    } else {
        1e12 // Th/s
    }
}

/// Convert a raw hashrate value of unknown shape to Gh/s.
///
/// Accepted shapes:
/// - a map with `rate` and `unit` keys, where `unit` is a number or a
///   nested `{ value }` map,
/// - a bare number or numeric string (unit inferred from magnitude),
/// - anything else converts to 0.0.
///
/// Returns 0.0 for negative or unparseable input.
pub fn convert_hashrate_to_ghs(raw: &Value) -> f64 {
    let (rate, unit) = match raw {
        Value::Object(map) if map.contains_key("rate") => {
            let Some(rate) = map.get("rate").and_then(as_f64) else {
                debug!(value = %raw, "unparseable hashrate rate field");
                return 0.0;
            };
            let unit = match map.get("unit") {
                Some(Value::Object(unit_map)) if unit_map.contains_key("value") => {
                    unit_map.get("value").and_then(as_f64).unwrap_or(1.0)
                }
                Some(Value::Number(n)) => n.as_f64().unwrap_or(1.0),
                // Missing or unrecognized unit shape: assume H/s.
                _ => 1.0,
            };
            (rate, unit)
        }
        Value::Number(_) | Value::String(_) => match as_f64(raw) {
            Some(rate) => (rate, unit_from_magnitude(rate)),
            None => {
                debug!(value = %raw, "unparseable hashrate value");
                return 0.0;
            }
        },
        _ => {
            debug!(value = %raw, "unrecognized hashrate shape");
            return 0.0;
        }
    };

    // Tolerance bands around the known unit multipliers absorb floating
    // point drift in serialized unit values.
    let result = if (unit - 1.0).abs() < 0.1 {
        rate / 1e9 // H/s -> Gh/s
    } else if (unit - 1e6).abs() < 1e3 {
        rate / 1000.0 // MH/s -> Gh/s
    } else if (unit - 1e9).abs() < 1e6 {
        rate // already Gh/s
    } else if (unit - 1e12).abs() < 1e9 {
        rate * 1000.0 // Th/s -> Gh/s
    } else if rate >= 1e9 {
        rate / 1e9
    } else if rate >= 1e6 {
        rate / 1000.0
    } else if rate >= 1000.0 {
        rate
    } else {
        rate * 1000.0
    };

    if result >= 0.0 { result } else { 0.0 }
}

/// Normalize a raw hashrate value into the canonical Gh/s structure.
///
/// `None` and unparseable input produce a zero measurement.
pub fn normalize_hashrate(raw: Option<&Value>) -> Hashrate {
    match raw {
        None | Some(Value::Null) => Hashrate::ghs(0.0),
        Some(value) => Hashrate::ghs(convert_hashrate_to_ghs(value)),
    }
}

/// Normalize efficiency into the canonical J/Th structure.
///
/// Priority order:
/// 1. Calculate from wattage and hashrate when both are positive:
///    `watts / (ghs / 1000)`. A result above 1000 J/Th usually means the
///    hashrate figure was already in Th/s, so the division is redone with
///    the figure taken as Th/s directly.
/// 2. Fall back to the vendor-reported value (number or string, scientific
///    notation accepted) scaled by 1e12 into J/Th.
/// 3. Zero.
///
/// Parse failures at any step fall through; this never errors.
pub fn normalize_efficiency(
    raw: Option<&Value>,
    wattage: Option<f64>,
    hashrate_ghs: Option<f64>,
) -> Efficiency {
    if let (Some(watts), Some(ghs)) = (wattage, hashrate_ghs)
        && watts > 0.0
        && ghs > 0.0
    {
        let mut rate_jth = watts / (ghs / 1000.0);
        if rate_jth > EFFICIENCY_PLAUSIBLE_MAX_JTH {
            debug!(
                rate_jth,
                hashrate_ghs = ghs,
                wattage = watts,
                "calculated efficiency implausibly high; treating hashrate as Th/s"
            );
            rate_jth = watts / ghs;
        }
        return Efficiency::jth(rate_jth.max(0.0));
    }

    let rate_jth = raw
        .and_then(as_f64)
        .filter(|raw_rate| *raw_rate != 0.0)
        // Vendor-native efficiency unit is J/H; scale into J/Th.
        .map(|raw_rate| raw_rate * 1e12)
        .unwrap_or(0.0);

    Efficiency::jth(rate_jth.max(0.0))
}

/// Coerce a difficulty value to a decimal integer string.
///
/// Difficulty counters overflow the safe-integer range of downstream JSON
/// consumers, so they travel as strings. Fractions truncate toward zero;
/// missing or malformed values become `"0"`.
pub fn coerce_difficulty(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else if let Some(f) = n.as_f64().filter(|f| f.is_finite()) {
                format!("{:.0}", f.trunc())
            } else {
                "0".to_string()
            }
        }
        Some(Value::String(s)) => match s.trim().parse::<i128>() {
            Ok(i) => i.to_string(),
            Err(_) => "0".to_string(),
        },
        _ => "0".to_string(),
    }
}

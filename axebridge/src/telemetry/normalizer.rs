//! Telemetry normalization strategies.
//!
//! The baseline pass turns whatever a device reported into the canonical
//! record every caller sees: hashrate in Gh/s, efficiency in J/Th,
//! difficulty counters as decimal strings. Family-specific strategies
//! layer extra reinterpretation of vendor extension fields on top.
//! Normalization is additive and best-effort throughout -- a field that
//! resists conversion keeps its original value, and nothing here ever
//! returns an error to the caller.

use serde_json::{Map, Value};
use tracing::debug;

use super::detect::MinerFamily;
use super::units::{Hashrate, as_f64, coerce_difficulty, normalize_efficiency, normalize_hashrate};

/// A normalization strategy for one vendor family.
pub trait TelemetryNormalizer: Send + Sync {
    /// Produce the canonical telemetry record for one raw reading.
    fn normalize(&self, data: &Map<String, Value>) -> Map<String, Value>;
}

/// Select the strategy for a detected family.
///
/// New families register here; existing strategies stay untouched.
pub fn select_normalizer(family: MinerFamily) -> &'static dyn TelemetryNormalizer {
    match family {
        MinerFamily::Bitaxe => &BitaxeNormalizer,
        MinerFamily::Unknown => &DefaultNormalizer,
    }
}

/// Generic strategy: canonical conversions plus a structural scan of the
/// extension map.
pub struct DefaultNormalizer;

impl TelemetryNormalizer for DefaultNormalizer {
    fn normalize(&self, data: &Map<String, Value>) -> Map<String, Value> {
        normalize_baseline(data)
    }
}

/// Bitaxe strategy: the baseline pass plus naming-convention
/// reinterpretation of espminer extension fields.
pub struct BitaxeNormalizer;

impl TelemetryNormalizer for BitaxeNormalizer {
    fn normalize(&self, data: &Map<String, Value>) -> Map<String, Value> {
        let mut normalized = normalize_baseline(data);
        reinterpret_esp_extension(&mut normalized);
        normalized
    }
}

/// Hashrate in Gh/s out of an already-normalized record.
fn context_hashrate_ghs(data: &Map<String, Value>) -> Option<f64> {
    match data.get("hashrate") {
        Some(Value::Object(map)) => map.get("rate").and_then(as_f64),
        Some(other) => as_f64(other),
        None => None,
    }
}

/// The canonical conversions shared by every strategy.
fn normalize_baseline(data: &Map<String, Value>) -> Map<String, Value> {
    let mut out = data.clone();

    let hashrate: Hashrate = normalize_hashrate(data.get("hashrate"));
    let hashrate_ghs = hashrate.rate;
    out.insert(
        "hashrate".to_string(),
        serde_json::to_value(&hashrate).unwrap_or(Value::Null),
    );

    // Difficulty counters always come back as decimal strings, "0" when
    // the device reported nothing usable.
    for key in ["best_difficulty", "best_session_difficulty"] {
        out.insert(key.to_string(), Value::String(coerce_difficulty(data.get(key))));
    }

    let wattage = data.get("wattage").and_then(as_f64);

    // Some firmwares report efficiency only as a fractional sibling field.
    let raw_efficiency = match data.get("efficiency") {
        Some(v) if !v.is_null() && as_f64(v) != Some(0.0) => Some(v),
        _ => data.get("efficiency_fract").or_else(|| data.get("efficiency")),
    };
    out.insert(
        "efficiency".to_string(),
        serde_json::to_value(normalize_efficiency(
            raw_efficiency,
            wattage,
            Some(hashrate_ghs),
        ))
        .unwrap_or(Value::Null),
    );

    if let Some(extra) = out.get("extra_fields").cloned() {
        out.insert("extra_fields".to_string(), normalize_extra_generic(extra));
    }

    out
}

fn looks_like_hashrate(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| m.contains_key("rate") && m.contains_key("unit"))
}

/// Recursive structural scan of the extension map: any nested value
/// shaped like a hashrate (`rate` + `unit` keys) gets renormalized.
/// Everything else passes through untouched.
fn normalize_extra_generic(extra: Value) -> Value {
    let Value::Object(map) = extra else {
        return extra;
    };

    let normalized = map
        .into_iter()
        .map(|(key, value)| {
            let value = if looks_like_hashrate(&value) {
                serde_json::to_value(normalize_hashrate(Some(&value))).unwrap_or(value)
            } else if value.is_object() {
                normalize_extra_generic(value)
            } else {
                value
            };
            (key, value)
        })
        .collect();

    Value::Object(normalized)
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_))
}

/// Reinterpret espminer extension fields by naming convention.
///
/// Keys that look like efficiencies become canonical J/Th structures using
/// the record's wattage/hashrate context; difficulty-like keys become
/// decimal strings; temperature- and power-like keys become floats.
/// Conversion failures leave the original value in place.
fn reinterpret_esp_extension(normalized: &mut Map<String, Value>) {
    let wattage = normalized.get("wattage").and_then(as_f64);
    let hashrate_ghs = context_hashrate_ghs(normalized);

    let Some(Value::Object(extra)) = normalized.get("extra_fields").cloned() else {
        return;
    };

    let reinterpreted: Map<String, Value> = extra
        .into_iter()
        .map(|(key, value)| {
            let key_lower = key.to_ascii_lowercase();
            let is_efficiency_key = key_lower.starts_with("efficiency")
                || (key_lower.ends_with("_efficiency") && !key_lower.starts_with("not_"));

            let value = if is_efficiency_key && is_scalar(&value) {
                serde_json::to_value(normalize_efficiency(Some(&value), wattage, hashrate_ghs))
                    .unwrap_or(value)
            } else if key_lower.contains("difficulty") && (value.is_null() || is_scalar(&value)) {
                Value::String(coerce_difficulty(Some(&value)))
            } else if key_lower.contains("temp") && is_scalar(&value) {
                match as_f64(&value) {
                    Some(temp) => Value::from(temp),
                    None => {
                        debug!(field = %key, "temperature-like field did not parse; keeping original");
                        value
                    }
                }
            } else if (key_lower.contains("watt") || key_lower.contains("power"))
                && is_scalar(&value)
            {
                match as_f64(&value) {
                    Some(power) => Value::from(power),
                    None => {
                        debug!(field = %key, "power-like field did not parse; keeping original");
                        value
                    }
                }
            } else {
                value
            };
            (key, value)
        })
        .collect();

    normalized.insert("extra_fields".to_string(), Value::Object(reinterpreted));
}

//! Telemetry normalization.
//!
//! Raw device telemetry arrives as an open JSON map with vendor-specific
//! shapes and units. This module converts one reading into the canonical
//! record callers see: detection picks a vendor family, the family's
//! strategy runs the canonical unit conversions, and anything it cannot
//! make sense of is preserved or zeroed rather than rejected.

pub mod detect;
pub mod normalizer;
pub mod units;

pub use detect::{MinerFamily, family_from_config, family_from_data};
pub use normalizer::{TelemetryNormalizer, select_normalizer};
pub use units::{Efficiency, Hashrate, HashrateUnit};

use serde_json::{Map, Value};

/// Normalize one raw telemetry reading into the canonical record.
///
/// Detects the vendor family from the data itself and applies the
/// matching strategy. This is the entry point the request layer uses.
pub fn normalize(raw: &Map<String, Value>) -> Map<String, Value> {
    let family = family_from_data(raw);
    select_normalizer(family).normalize(raw)
}

//! Configuration pipeline errors.
//!
//! Telemetry normalization never errors -- malformed input degrades to
//! zero values inside the normalizer. Configuration writes do error, and
//! always with enough detail for the client to fix the patch; nothing is
//! silently dropped or auto-corrected.

use thiserror::Error;

use crate::config::validate::ConstraintError;
use crate::gateway::GatewayError;

/// Why a configuration patch was not applied.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field value violated the device family's constraints. Client
    /// error; the message names the field, value, and accepted set.
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    /// The device's current configuration exposes no vendor extension
    /// object, so there is no safe concrete type to preserve on write.
    /// Refusing beats guessing a schema the device might reject.
    #[error("device configuration has no vendor extension object; refusing to update")]
    ExtensionUnavailable,

    /// The device gateway failed; passed through unchanged.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

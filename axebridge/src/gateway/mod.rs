//! Device gateways.
//!
//! A gateway owns the wire protocol for one class of devices and exposes
//! the three operations the bridge needs: read raw telemetry, read the
//! vendor configuration, write a vendor configuration back. Everything
//! above this trait is pure transformation; everything below it is I/O.

pub mod config;
pub mod esp;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use self::config::VendorConfig;

/// Errors surfaced by a device gateway.
///
/// These pass through the merge engine unchanged; a device that cannot be
/// reached is a routing problem, not a configuration problem.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No device answered at this address.
    #[error("no miner found at {ip}")]
    NotFound { ip: String },

    /// The device exists but could not be reached.
    #[error("miner at {ip} is unreachable: {source}")]
    Unreachable {
        ip: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The device answered with something the gateway could not use.
    #[error("unexpected response from miner at {ip}: {detail}")]
    Protocol { ip: String, detail: String },
}

/// Network access to one class of mining devices.
///
/// Raw telemetry is returned as an open JSON map -- the gateway does not
/// normalize, it only transports. Vendor configurations keep their
/// concrete section and extension types so a later write can preserve
/// fields the neutral model doesn't carry.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Fetch the device's current raw telemetry.
    async fn telemetry(&self, ip: &str) -> Result<Map<String, Value>, GatewayError>;

    /// Fetch the device's current configuration.
    async fn configuration(&self, ip: &str) -> Result<VendorConfig, GatewayError>;

    /// Apply a configuration to the device.
    async fn send_configuration(&self, ip: &str, config: VendorConfig)
    -> Result<(), GatewayError>;
}

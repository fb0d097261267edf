//! Bridge facade: the operations the request layer calls.
//!
//! Each operation fetches what it needs from the gateway, runs the pure
//! transformation pipeline, and hands anything outgoing back to the
//! gateway. No state is kept between calls; two racing patches for one
//! device resolve last-write-wins (see [`crate::config::merge`]).

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;
use utoipa::ToSchema;

use crate::config::model::MinerConfig;
use crate::config::{merge_and_validate, merge_patch, to_internal, validator_for};
use crate::error::ConfigError;
use crate::gateway::{DeviceGateway, GatewayError};
use crate::telemetry::{self, family_from_config};

/// Outcome of a dry-run validation.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Uniform access to a fleet of mining devices.
#[derive(Clone)]
pub struct Bridge {
    gateway: Arc<dyn DeviceGateway>,
}

impl Bridge {
    pub fn new(gateway: Arc<dyn DeviceGateway>) -> Self {
        Self { gateway }
    }

    /// Fetch and normalize one device's telemetry.
    ///
    /// Normalization is infallible; only the device fetch can error.
    pub async fn telemetry(&self, ip: &str) -> Result<Map<String, Value>, GatewayError> {
        let raw = self.gateway.telemetry(ip).await?;
        Ok(telemetry::normalize(&raw))
    }

    /// Fetch one device's configuration in the vendor-neutral model.
    pub async fn config(&self, ip: &str) -> Result<MinerConfig, GatewayError> {
        let vendor = self.gateway.configuration(ip).await?;
        Ok(to_internal(&vendor))
    }

    /// Apply a partial configuration patch to a device.
    ///
    /// Runs the full fetch-merge-validate-send pipeline. Constraint
    /// violations and a missing vendor extension surface as
    /// [`ConfigError`]; the patch is never partially applied.
    pub async fn apply_patch(&self, ip: &str, patch: &MinerConfig) -> Result<(), ConfigError> {
        let existing = self.gateway.configuration(ip).await?;
        let outgoing = merge_and_validate(ip, &existing, patch)?;
        self.gateway.send_configuration(ip, outgoing).await?;
        info!(ip, "configuration patch applied");
        Ok(())
    }

    /// Validate a patch against a device's current configuration without
    /// sending anything.
    ///
    /// Captures the validator's verdict instead of propagating it;
    /// gateway failures still propagate, since there is nothing to
    /// validate against.
    pub async fn dry_run_patch(
        &self,
        ip: &str,
        patch: &MinerConfig,
    ) -> Result<ValidationReport, GatewayError> {
        let existing = self.gateway.configuration(ip).await?;
        let baseline = to_internal(&existing);
        let merged = merge_patch(&baseline, patch);

        let family = family_from_config(&existing);
        let report = match validator_for(family).validate(&merged) {
            Ok(()) => ValidationReport { valid: true, errors: Vec::new() },
            Err(err) => ValidationReport {
                valid: false,
                errors: vec![err.to_string()],
            },
        };
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::config::{EspExtension, VendorConfig, VendorExtension};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Gateway stub serving one fixed device at 10.0.0.2 and recording
    /// whatever gets sent.
    #[derive(Default)]
    struct StubGateway {
        sent: Mutex<Vec<VendorConfig>>,
    }

    impl StubGateway {
        fn fixed_config() -> VendorConfig {
            VendorConfig {
                extra: Some(Box::new(EspExtension {
                    frequency: Some(490),
                    core_voltage: Some(1100),
                    ..Default::default()
                })),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl DeviceGateway for StubGateway {
        async fn telemetry(&self, ip: &str) -> Result<Map<String, Value>, GatewayError> {
            if ip != "10.0.0.2" {
                return Err(GatewayError::NotFound { ip: ip.to_string() });
            }
            Ok(json!({
                "device_info": {"make": "BitAxe", "model": "Gamma"},
                "hashrate": {"rate": 1000.0, "unit": {"value": 1_000_000_000u64}},
                "wattage": 20.0,
                "best_difficulty": 12345678901234567890u64,
            })
            .as_object()
            .cloned()
            .unwrap())
        }

        async fn configuration(&self, ip: &str) -> Result<VendorConfig, GatewayError> {
            if ip != "10.0.0.2" {
                return Err(GatewayError::NotFound { ip: ip.to_string() });
            }
            Ok(Self::fixed_config())
        }

        async fn send_configuration(
            &self,
            _ip: &str,
            config: VendorConfig,
        ) -> Result<(), GatewayError> {
            self.sent.lock().unwrap().push(config);
            Ok(())
        }
    }

    fn bridge() -> (Bridge, Arc<StubGateway>) {
        let gateway = Arc::new(StubGateway::default());
        (Bridge::new(gateway.clone()), gateway)
    }

    #[tokio::test]
    async fn telemetry_is_normalized_per_family() {
        let (bridge, _) = bridge();
        let out = bridge.telemetry("10.0.0.2").await.unwrap();
        assert_eq!(out["best_difficulty"], json!("12345678901234567890"));
        let eff = out["efficiency"]["rate"].as_f64().unwrap();
        assert!((eff - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_device_errors_pass_through() {
        let (bridge, _) = bridge();
        let err = bridge.telemetry("10.9.9.9").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }

    #[tokio::test]
    async fn config_read_uses_internal_model() {
        let (bridge, _) = bridge();
        let config = bridge.config("10.0.0.2").await.unwrap();
        assert_eq!(config.extra_config.unwrap()["frequency"], json!(490));
    }

    #[tokio::test]
    async fn apply_patch_sends_merged_vendor_config() {
        let (bridge, gateway) = bridge();
        let patch: MinerConfig =
            serde_json::from_value(json!({"extra_config": {"frequency": 525}})).unwrap();
        bridge.apply_patch("10.0.0.2", &patch).await.unwrap();

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let extra = sent[0].extra.as_deref().unwrap();
        assert_eq!(extra.get("frequency"), Some(json!(525)));
        assert_eq!(extra.get("core_voltage"), Some(json!(1100)));
    }

    #[tokio::test]
    async fn apply_patch_rejects_invalid_values_without_sending() {
        let (bridge, gateway) = bridge();
        let patch: MinerConfig =
            serde_json::from_value(json!({"extra_config": {"frequency": 500}})).unwrap();
        let err = bridge.apply_patch("10.0.0.2", &patch).await.unwrap_err();
        assert!(matches!(err, ConfigError::Constraint(_)));
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_captures_validation_errors() {
        let (bridge, gateway) = bridge();
        let patch: MinerConfig =
            serde_json::from_value(json!({"extra_config": {"frequency": 500}})).unwrap();
        let report = bridge.dry_run_patch("10.0.0.2", &patch).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("500"));
        assert!(gateway.sent.lock().unwrap().is_empty());

        let patch: MinerConfig =
            serde_json::from_value(json!({"extra_config": {"frequency": 525}})).unwrap();
        let report = bridge.dry_run_patch("10.0.0.2", &patch).await.unwrap();
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn dry_run_propagates_gateway_errors() {
        let (bridge, _) = bridge();
        let err = bridge
            .dry_run_patch("10.9.9.9", &MinerConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }
}

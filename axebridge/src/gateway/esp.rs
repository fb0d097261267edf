//! HTTP gateway for espminer/AxeOS devices.
//!
//! AxeOS exposes one JSON document at `GET /api/system/info` and accepts
//! partial settings at `PATCH /api/system`. This gateway translates that
//! document into the common raw telemetry shape and a typed
//! [`VendorConfig`], and translates an outgoing [`VendorConfig`] back
//! into the settings keys the firmware expects.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::config::{
    EspExtension, FanMode, Pool, PoolConfig, PoolGroup, TemperatureSettings, VendorConfig,
};
use super::{DeviceGateway, GatewayError};
use crate::telemetry::units::as_f64;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway for devices running espminer firmware (Bitaxe and derivatives).
pub struct EspGateway {
    http: reqwest::Client,
}

impl EspGateway {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            // Builder only fails on TLS backend misconfiguration.
            .unwrap_or_default();
        Self { http }
    }

    async fn system_info(&self, ip: &str) -> Result<Map<String, Value>, GatewayError> {
        let url = format!("http://{ip}/api/system/info");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable_error(ip, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound { ip: ip.to_string() });
        }
        if !response.status().is_success() {
            return Err(GatewayError::Protocol {
                ip: ip.to_string(),
                detail: format!("status {}", response.status()),
            });
        }

        let body: Value = response.json().await.map_err(|e| GatewayError::Protocol {
            ip: ip.to_string(),
            detail: e.to_string(),
        })?;
        body.as_object().cloned().ok_or_else(|| GatewayError::Protocol {
            ip: ip.to_string(),
            detail: "system info is not a JSON object".to_string(),
        })
    }
}

impl Default for EspGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn unreachable_error(ip: &str, source: reqwest::Error) -> GatewayError {
    GatewayError::Unreachable {
        ip: ip.to_string(),
        source: Box::new(source),
    }
}

/// Parse a humanized difficulty like `"4.29G"` into a plain number.
///
/// AxeOS reports its best-difficulty counters pre-formatted with an SI
/// suffix. Returns `None` for anything that doesn't parse, in which case
/// the raw value is forwarded as-is.
fn parse_humanized_difficulty(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (number, multiplier) = match trimmed.chars().last() {
        Some(suffix) if suffix.is_ascii_alphabetic() => {
            let multiplier = match suffix.to_ascii_uppercase() {
                'K' => 1e3,
                'M' => 1e6,
                'G' => 1e9,
                'T' => 1e12,
                'P' => 1e15,
                _ => return None,
            };
            (&trimmed[..trimmed.len() - 1], multiplier)
        }
        _ => (trimmed, 1.0),
    };
    number.parse::<f64>().ok().map(|n| n * multiplier)
}

fn difficulty_value(info: &Map<String, Value>, key: &str) -> Value {
    match info.get(key) {
        Some(Value::String(s)) => parse_humanized_difficulty(s)
            .map(Value::from)
            .unwrap_or_else(|| Value::String(s.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Build the common raw telemetry map from an AxeOS system info document.
fn raw_telemetry_from_info(info: &Map<String, Value>) -> Map<String, Value> {
    let mut raw = Map::new();

    // AxeOS reports hashrate in Gh/s; label it so normalization doesn't
    // have to guess from magnitude.
    if let Some(rate) = info.get("hashRate").and_then(as_f64) {
        raw.insert(
            "hashrate".to_string(),
            json!({"rate": rate, "unit": {"value": 1_000_000_000u64, "suffix": "Gh/s"}}),
        );
    }
    if let Some(power) = info.get("power").and_then(as_f64) {
        raw.insert("wattage".to_string(), Value::from(power));
    }

    raw.insert("best_difficulty".to_string(), difficulty_value(info, "bestDiff"));
    raw.insert(
        "best_session_difficulty".to_string(),
        difficulty_value(info, "bestSessionDiff"),
    );

    raw.insert(
        "device_info".to_string(),
        json!({
            "make": "BitAxe",
            "model": info.get("ASICModel").cloned().unwrap_or(Value::Null),
            "firmware": info.get("version").cloned().unwrap_or(Value::Null),
        }),
    );
    if let Some(hostname) = info.get("hostname") {
        raw.insert("hostname".to_string(), hostname.clone());
    }

    let mut extra = Map::new();
    for (source, target) in [
        ("temp", "chip_temp"),
        ("vrTemp", "vr_temp"),
        ("frequency", "frequency"),
        ("coreVoltage", "core_voltage"),
        ("fanspeed", "fan_speed"),
        ("fanSpeedRpm", "fan_rpm"),
        ("sharesAccepted", "shares_accepted"),
        ("sharesRejected", "shares_rejected"),
        ("uptimeSeconds", "uptime_seconds"),
        ("freeHeap", "free_heap"),
    ] {
        if let Some(value) = info.get(source) {
            extra.insert(target.to_string(), value.clone());
        }
    }
    raw.insert("extra_fields".to_string(), Value::Object(extra));

    raw
}

/// Build a typed vendor configuration from an AxeOS system info document.
fn vendor_config_from_info(info: &Map<String, Value>) -> VendorConfig {
    let pools = info.get("stratumURL").and_then(Value::as_str).map(|host| {
        let port = info.get("stratumPort").and_then(Value::as_i64).unwrap_or(3333);
        PoolConfig {
            groups: vec![PoolGroup {
                pools: vec![Pool {
                    url: format!("stratum+tcp://{host}:{port}"),
                    user: info
                        .get("stratumUser")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    password: info
                        .get("stratumPassword")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }],
                quota: Some(1),
                name: None,
            }],
        }
    });

    let fan_mode = match info.get("autofanspeed").and_then(Value::as_i64) {
        Some(0) => Some(FanMode::Manual {
            speed: info.get("fanspeed").and_then(Value::as_i64).unwrap_or(100),
            minimum_fans: 1,
        }),
        Some(_) => Some(FanMode::Normal { minimum_fans: 1, minimum_speed: 0 }),
        None => None,
    };

    let extra = EspExtension {
        frequency: info.get("frequency").and_then(Value::as_i64),
        core_voltage: info.get("coreVoltage").and_then(Value::as_i64),
        min_fan_speed: info.get("minFanSpeed").and_then(Value::as_i64),
        display_timeout: info.get("displayTimeout").and_then(Value::as_i64),
        rotation: info.get("rotation").and_then(Value::as_i64),
        invertscreen: info.get("invertscreen").and_then(Value::as_i64),
        overheat_mode: info.get("overheat_mode").and_then(Value::as_i64),
        stats_frequency: info.get("statsFrequency").and_then(Value::as_i64),
        overclock_enabled: info.get("overclockEnabled").and_then(Value::as_i64),
        display: info
            .get("display")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    VendorConfig {
        pools,
        fan_mode,
        temperature: Some(TemperatureSettings::default()),
        mining_mode: None,
        extra: Some(Box::new(extra)),
    }
}

/// Build the AxeOS settings body for an outgoing vendor configuration.
fn settings_from_config(config: &VendorConfig) -> Map<String, Value> {
    let mut body = Map::new();

    if let Some(pool) = config
        .pools
        .as_ref()
        .and_then(|p| p.groups.first())
        .and_then(|g| g.pools.first())
    {
        // AxeOS wants host and port split back apart.
        let trimmed = pool.url.trim_start_matches("stratum+tcp://");
        let (host, port) = match trimmed.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<i64>().unwrap_or(3333)),
            None => (trimmed, 3333),
        };
        if !host.is_empty() {
            body.insert("stratumURL".to_string(), Value::from(host));
            body.insert("stratumPort".to_string(), Value::from(port));
            body.insert("stratumUser".to_string(), Value::from(pool.user.clone()));
            body.insert(
                "stratumPassword".to_string(),
                Value::from(pool.password.clone()),
            );
        }
    }

    match config.fan_mode.as_ref() {
        Some(FanMode::Manual { speed, .. }) => {
            body.insert("autofanspeed".to_string(), Value::from(0));
            body.insert("fanspeed".to_string(), Value::from(*speed));
        }
        Some(_) => {
            body.insert("autofanspeed".to_string(), Value::from(1));
        }
        None => {}
    }

    if let Some(extra) = config.extra.as_deref() {
        for (field, key) in [
            ("frequency", "frequency"),
            ("core_voltage", "coreVoltage"),
            ("min_fan_speed", "minFanSpeed"),
            ("display_timeout", "displayTimeout"),
            ("rotation", "rotation"),
            ("invertscreen", "invertscreen"),
            ("overheat_mode", "overheat_mode"),
            ("stats_frequency", "statsFrequency"),
            ("overclock_enabled", "overclockEnabled"),
            ("display", "display"),
        ] {
            if let Some(value) = extra.get(field).filter(|v| !v.is_null()) {
                body.insert(key.to_string(), value);
            }
        }
    }

    body
}

#[async_trait]
impl DeviceGateway for EspGateway {
    async fn telemetry(&self, ip: &str) -> Result<Map<String, Value>, GatewayError> {
        let info = self.system_info(ip).await?;
        Ok(raw_telemetry_from_info(&info))
    }

    async fn configuration(&self, ip: &str) -> Result<VendorConfig, GatewayError> {
        let info = self.system_info(ip).await?;
        Ok(vendor_config_from_info(&info))
    }

    async fn send_configuration(
        &self,
        ip: &str,
        config: VendorConfig,
    ) -> Result<(), GatewayError> {
        let body = settings_from_config(&config);
        debug!(ip, keys = body.len(), "sending settings patch");

        let url = format!("http://{ip}/api/system");
        let response = self
            .http
            .patch(&url)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| unreachable_error(ip, e))?;

        if !response.status().is_success() {
            return Err(GatewayError::Protocol {
                ip: ip.to_string(),
                detail: format!("settings patch rejected with status {}", response.status()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::config::VendorExtension;
    use test_case::test_case;

    fn info(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    #[test_case("4.29G", Some(4.29e9); "giga")]
    #[test_case("123.4K", Some(123.4e3); "kilo")]
    #[test_case("2T", Some(2e12); "tera")]
    #[test_case("512", Some(512.0); "no_suffix")]
    #[test_case("0.8M", Some(0.8e6); "fractional_mega")]
    #[test_case("bogus", None; "garbage")]
    #[test_case("", None; "empty")]
    fn humanized_difficulty_parses(raw: &str, expected: Option<f64>) {
        let got = parse_humanized_difficulty(raw);
        match (got, expected) {
            (Some(g), Some(e)) => assert!((g - e).abs() < e * 1e-9),
            (None, None) => {}
            other => panic!("mismatch: {other:?}"),
        }
    }

    #[test]
    fn raw_telemetry_labels_hashrate_as_ghs() {
        let raw = raw_telemetry_from_info(&info(json!({
            "hashRate": 1234.5,
            "power": 15.2,
            "bestDiff": "4.29G",
            "temp": 58,
        })));
        assert_eq!(raw["hashrate"]["rate"], json!(1234.5));
        assert_eq!(raw["hashrate"]["unit"]["suffix"], json!("Gh/s"));
        assert_eq!(raw["wattage"], json!(15.2));
        assert_eq!(raw["best_difficulty"], json!(4.29e9));
        assert_eq!(raw["device_info"]["make"], json!("BitAxe"));
        assert_eq!(raw["extra_fields"]["chip_temp"], json!(58));
    }

    #[test]
    fn vendor_config_carries_typed_extension() {
        let config = vendor_config_from_info(&info(json!({
            "stratumURL": "pool.example",
            "stratumPort": 3333,
            "stratumUser": "bc1qworker",
            "autofanspeed": 0,
            "fanspeed": 70,
            "frequency": 490,
            "coreVoltage": 1100,
        })));

        let pool = &config.pools.as_ref().unwrap().groups[0].pools[0];
        assert_eq!(pool.url, "stratum+tcp://pool.example:3333");
        assert_eq!(config.fan_mode, Some(FanMode::Manual { speed: 70, minimum_fans: 1 }));

        let extra = config.extra.as_deref().unwrap();
        assert!(extra.declared_fields().is_some());
        assert_eq!(extra.get("frequency"), Some(json!(490)));
        assert_eq!(extra.get("core_voltage"), Some(json!(1100)));
    }

    #[test]
    fn settings_body_splits_pool_url_and_maps_extension_keys() {
        let config = VendorConfig {
            pools: Some(PoolConfig {
                groups: vec![PoolGroup {
                    pools: vec![Pool {
                        url: "stratum+tcp://pool.example:4444".into(),
                        user: "worker".into(),
                        password: "x".into(),
                    }],
                    quota: Some(1),
                    name: None,
                }],
            }),
            fan_mode: Some(FanMode::Normal { minimum_fans: 1, minimum_speed: 0 }),
            temperature: None,
            mining_mode: None,
            extra: Some(Box::new(EspExtension {
                frequency: Some(525),
                core_voltage: Some(1100),
                ..Default::default()
            })),
        };

        let body = settings_from_config(&config);
        assert_eq!(body["stratumURL"], json!("pool.example"));
        assert_eq!(body["stratumPort"], json!(4444));
        assert_eq!(body["autofanspeed"], json!(1));
        assert_eq!(body["frequency"], json!(525));
        assert_eq!(body["coreVoltage"], json!(1100));
        // Unset extension fields stay out of the patch body.
        assert!(!body.contains_key("rotation"));
    }
}

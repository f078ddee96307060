use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("host: is required")]
    MissingHost,

    #[error("c: must be at least 1")]
    InvalidConcurrency,
}

/// Transport security for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum TlsMode {
    /// Plaintext HTTP/2, no TLS at all.
    Insecure,

    /// TLS verified against the system root store.
    SystemRoots,

    /// TLS verified against a CA certificate file, optionally
    /// overriding the server name used for verification.
    #[serde(rename_all = "camelCase")]
    FileCert {
        path: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        server_name: Option<String>,
    },
}

/// Options for a single run. Validated once, then immutable; the final
/// report echoes the full struct.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Target address, either "host:port" or a full URI.
    pub host: String,

    /// Total number of calls to attempt.
    pub n: u64,

    /// Number of concurrent workers.
    pub c: u64,

    /// Global rate limit in calls per second. 0 disables pacing.
    pub qps: u64,

    /// Optional wall-clock bound; the run stops early when it elapses.
    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub z: Option<Duration>,

    /// Per-call deadline.
    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Connect timeout.
    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub dial_timeout: Option<Duration>,

    /// HTTP/2 keepalive ping interval.
    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub keepalive: Option<Duration>,

    /// Payload tree, rendered per call into the request message(s).
    pub data: serde_json::Value,

    /// Request metadata, rendered per call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,

    pub tls: TlsMode,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.c == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            n: 200,
            c: 50,
            qps: 0,
            z: None,
            timeout: Some(Duration::from_secs(20)),
            dial_timeout: Some(Duration::from_secs(10)),
            keepalive: None,
            data: serde_json::Value::Null,
            metadata: None,
            tls: TlsMode::Insecure,
        }
    }
}

mod humantime_opt {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => ser.serialize_str(&humantime::format_duration(*d).to_string()),
            None => ser.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_host() {
        let config = RunConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingHost)));
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let config = RunConfig {
            host: "localhost:50051".to_string(),
            c: 0,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency)
        ));
    }

    #[test]
    fn serializes_durations_as_humantime_strings() {
        let config = RunConfig {
            host: "localhost:50051".to_string(),
            z: Some(Duration::from_secs(90)),
            timeout: Some(Duration::from_millis(250)),
            ..RunConfig::default()
        };

        let v = match serde_json::to_value(&config) {
            Ok(v) => v,
            Err(err) => panic!("serialize failed: {err}"),
        };
        assert_eq!(v["z"], serde_json::json!("1m 30s"));
        assert_eq!(v["timeout"], serde_json::json!("250ms"));
        assert_eq!(v["tls"], serde_json::json!({ "mode": "insecure" }));
    }
}

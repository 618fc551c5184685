use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use slipline_frame::{EscapePolicy, FrameConfig, FrameError, DEFAULT_MAX_PAYLOAD, DEFAULT_RX_CAPACITY};
use slipline_transport::{Endpoint, DEFAULT_BAUD};

use crate::error::{LinkError, Result};

/// Default read timeout; an expired read is an idle tick for [`Link::run`](crate::Link::run).
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Link behavior configuration.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// changes:
///
/// ```json
/// { "endpoint": "serial:/dev/ttyUSB0", "baud": 57600, "rx_capacity": 1024 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Where to open the link. Required by [`Link::open`](crate::Link::open).
    #[serde(deserialize_with = "deserialize_endpoint")]
    pub endpoint: Option<Endpoint>,
    /// Serial speed; ignored for socket endpoints.
    pub baud: u32,
    /// Receive buffer capacity (largest frame that can be received).
    pub rx_capacity: usize,
    /// Largest payload `send_frame` accepts.
    pub max_payload_size: usize,
    /// Treatment of an escape byte followed by an invalid code.
    pub escape_policy: EscapePolicy,
    /// Read timeout in milliseconds.
    pub read_timeout_ms: u64,
    /// Upper bound on how long a blocked send waits for the transport.
    pub write_timeout_ms: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            baud: DEFAULT_BAUD,
            rx_capacity: DEFAULT_RX_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            escape_policy: EscapePolicy::default(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: None,
        }
    }
}

impl LinkConfig {
    /// Parse a JSON config document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LinkError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Reject settings no link can run with.
    pub fn validate(&self) -> Result<()> {
        if self.rx_capacity == 0 {
            return Err(FrameError::InvalidCapacity(self.rx_capacity).into());
        }
        if self.read_timeout_ms == 0 {
            return Err(LinkError::Config(
                "read_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.baud == 0 {
            return Err(LinkError::Config("baud must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// The configured endpoint with the configured baud applied.
    pub fn endpoint(&self) -> Result<Endpoint> {
        self.endpoint
            .clone()
            .map(|endpoint| endpoint.with_baud(self.baud))
            .ok_or_else(|| LinkError::Config("no endpoint configured".to_string()))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    /// Reader/writer settings derived from this configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            rx_capacity: self.rx_capacity,
            escape_policy: self.escape_policy,
            read_timeout: Some(self.read_timeout()),
            write_timeout: self.write_timeout(),
        }
    }
}

fn deserialize_endpoint<'de, D>(deserializer: D) -> std::result::Result<Option<Endpoint>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| raw.parse().map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_serial_driver() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.baud, 115_200);
        assert_eq!(cfg.rx_capacity, 512);
        assert_eq!(cfg.escape_policy, EscapePolicy::Skip);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_partial_json() {
        let cfg = LinkConfig::from_json(
            r#"{ "endpoint": "serial:/dev/ttyS9", "baud": 9600, "escape_policy": "pass-through" }"#,
        )
        .unwrap();
        assert_eq!(cfg.baud, 9600);
        assert_eq!(cfg.rx_capacity, DEFAULT_RX_CAPACITY);
        assert_eq!(cfg.escape_policy, EscapePolicy::PassThrough);
        assert_eq!(
            cfg.endpoint().unwrap(),
            Endpoint::Serial {
                path: "/dev/ttyS9".into(),
                baud: 9600
            }
        );
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = LinkConfig::from_json(r#"{ "bogus": 1 }"#).unwrap_err();
        assert!(matches!(err, LinkError::Json(_)));
    }

    #[test]
    fn rejects_bad_endpoint() {
        let err = LinkConfig::from_json(r#"{ "endpoint": "unix:" }"#).unwrap_err();
        assert!(matches!(err, LinkError::Json(_)));
    }

    #[test]
    fn zero_capacity_is_invalid() {
        let err = LinkConfig::from_json(r#"{ "rx_capacity": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            LinkError::Frame(FrameError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn missing_endpoint_is_config_error() {
        let err = LinkConfig::default().endpoint().unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
    }

    #[test]
    fn frame_config_carries_limits_and_timeouts() {
        let cfg = LinkConfig {
            rx_capacity: 64,
            write_timeout_ms: Some(250),
            ..LinkConfig::default()
        };
        let frame = cfg.frame_config();
        assert_eq!(frame.rx_capacity, 64);
        assert_eq!(frame.read_timeout, Some(Duration::from_millis(100)));
        assert_eq!(frame.write_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = LinkConfig::from_file("/nonexistent/slipline.json").unwrap_err();
        match err {
            LinkError::ConfigFile { path, .. } => {
                assert_eq!(path, std::path::Path::new("/nonexistent/slipline.json"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! Link and framing configuration.
//!
//! The original firmware protocol fixed these values (115200 baud, vendor
//! 0x2341, 8 KiB parse buffer, 1 s poll). They are configuration here, with
//! those constants as defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Default baud rate of the controller's USB serial bridge.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// USB vendor id the port filter matches (Arduino).
pub const DEFAULT_VENDOR_ID: u16 = 0x2341;

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// The fixed status request issued on each poll tick.
pub const STATUS_REQUEST: &str = r#"{"GET":"ALL"}"#;

/// Frame decoder limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramingConfig {
    /// Parse buffer cap in bytes. Exceeding it discards the whole buffer
    /// and reports a fault; never a silent truncation.
    pub max_buffer: usize,
    /// Ceiling on frame extraction iterations per `feed` call, bounding the
    /// scan loop on pathological input.
    pub max_frames_per_feed: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self { max_buffer: 8192, max_frames_per_feed: 50 }
    }
}

/// Configuration for a serial session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Explicit port path (e.g. `/dev/ttyACM0`, `COM3`). When `None`, ports
    /// are enumerated by `vendor_id` and offered to the configured picker.
    pub port: Option<String>,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// USB vendor id used to filter enumerated ports.
    pub vendor_id: u16,
    /// Interval between status polls while connected.
    pub poll_interval: Duration,
    /// Command text written on each poll tick.
    pub poll_command: String,
    /// Frame decoder limits.
    pub framing: FramingConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            vendor_id: DEFAULT_VENDOR_ID,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_command: STATUS_REQUEST.to_string(),
            framing: FramingConfig::default(),
        }
    }
}

impl LinkConfig {
    /// Validate field ranges before a session uses the config.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(LinkError::config("baud rate must be greater than zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(LinkError::config("poll interval must be greater than zero"));
        }
        if self.framing.max_buffer == 0 {
            return Err(LinkError::config("framing buffer cap must be greater than zero"));
        }
        if self.framing.max_frames_per_feed == 0 {
            return Err(LinkError::config("frame iteration ceiling must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware_protocol() {
        let config = LinkConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.vendor_id, 0x2341);
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.poll_command, r#"{"GET":"ALL"}"#);
        assert_eq!(config.framing.max_buffer, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_fields() {
        let mut config = LinkConfig::default();
        config.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = LinkConfig::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = LinkConfig::default();
        config.framing.max_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = LinkConfig { port: Some("/dev/ttyACM0".into()), ..Default::default() };
        let json = serde_json::to_string(&config).unwrap();
        let back: LinkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}

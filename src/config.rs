//! Device settings and board constants
//!
//! Settings come from a small JSON document (`setting.json`) read once at boot.
//! Every key is read on its own: a key that is missing, null or of the wrong
//! type keeps its default without touching the others. A missing or unparsable
//! document yields [`DeviceConfig::default`], which makes the cycle fail at its
//! first stage and restart.

use alloc::string::String;
use core::fmt;
use core::time::Duration;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;

/// Name of the settings document
pub const SETTINGS_FILE: &str = "setting.json";

/// Default InfluxDB HTTP port
pub const DEFAULT_INFLUX_PORT: u16 = 8086;

/// Timer wake interval after a successful cycle
pub const WAKE_INTERVAL: Duration = Duration::from_secs(5);

/// Number of pixels on the indicator strip
pub const LED_COUNT: usize = 8;

/// LED data GPIO pin
pub const LED_DATA_PIN: u8 = 4;

/// Interval between WiFi link status polls
pub const WIFI_POLL_INTERVAL_MS: u32 = 500;

/// Link status polls before giving up (30 seconds)
pub const WIFI_CONNECT_POLL_LIMIT: u32 = 60;

/// Interval between mDNS start attempts
pub const MDNS_RETRY_INTERVAL_MS: u32 = 100;

/// mDNS start attempts before giving up (5 seconds)
pub const MDNS_START_ATTEMPT_LIMIT: u32 = 50;

/// Bounded wait for a blocking bring-up step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval_ms: u32,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const WIFI_CONNECT: Self = Self {
        interval_ms: WIFI_POLL_INTERVAL_MS,
        max_attempts: WIFI_CONNECT_POLL_LIMIT,
    };

    pub const MDNS_START: Self = Self {
        interval_ms: MDNS_RETRY_INTERVAL_MS,
        max_attempts: MDNS_START_ATTEMPT_LIMIT,
    };

    /// Worst case time spent waiting, in milliseconds
    pub const fn budget_ms(&self) -> u32 {
        self.interval_ms.saturating_mul(self.max_attempts)
    }
}

/// Immutable settings snapshot for one boot
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// `SSID`
    pub ssid: String,
    /// `PSK`
    pub psk: String,
    /// `influx_mdns_addr`, takes precedence over `ip_addr`
    pub mdns_name: String,
    /// `influx_ip_addr`
    pub ip_addr: String,
    /// `influx_port`
    pub port: u16,
    pub db_name: String,
    pub measurement: String,
    /// Value of the `id` tag to look up
    pub id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            psk: String::new(),
            mdns_name: String::new(),
            ip_addr: String::new(),
            port: DEFAULT_INFLUX_PORT,
            db_name: String::new(),
            measurement: String::new(),
            id: String::new(),
        }
    }
}

/// Where the InfluxDB address comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfluxTarget<'a> {
    /// Look the host up over mDNS
    Mdns(&'a str),
    /// Use the configured address as is
    Literal(&'a str),
}

impl DeviceConfig {
    /// Parse a settings document; unusable keys fall back one by one
    pub fn from_json(raw: &[u8]) -> Self {
        if raw.is_empty() {
            warn!("[CONFIG] Settings document is empty, using defaults");
            return Self::default();
        }

        let document: Value = match serde_json::from_slice(raw) {
            Ok(document) => document,
            Err(e) => {
                warn!("[CONFIG] Failed to parse settings: {}", e);
                return Self::default();
            }
        };
        if !document.is_object() {
            warn!("[CONFIG] Settings document is not an object, using defaults");
            return Self::default();
        }

        let defaults = Self::default();
        let config = Self {
            ssid: key(&document, "SSID", defaults.ssid),
            psk: key(&document, "PSK", defaults.psk),
            mdns_name: key(&document, "influx_mdns_addr", defaults.mdns_name),
            ip_addr: key(&document, "influx_ip_addr", defaults.ip_addr),
            port: key(&document, "influx_port", defaults.port),
            db_name: key(&document, "db_name", defaults.db_name),
            measurement: key(&document, "measurement", defaults.measurement),
            id: key(&document, "id", defaults.id),
        };
        info!("[CONFIG] Loaded settings: {:?}", config);
        config
    }

    /// Load settings from an optional document
    pub fn load(raw: Option<&[u8]>) -> Self {
        match raw {
            Some(raw) => Self::from_json(raw),
            None => {
                warn!("[CONFIG] No {} found, using defaults", SETTINGS_FILE);
                Self::default()
            }
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.ssid.is_empty() && !self.psk.is_empty()
    }

    /// The authoritative address source, mDNS first
    pub fn influx_target(&self) -> Option<InfluxTarget<'_>> {
        if !self.mdns_name.is_empty() {
            Some(InfluxTarget::Mdns(&self.mdns_name))
        } else if !self.ip_addr.is_empty() {
            Some(InfluxTarget::Literal(&self.ip_addr))
        } else {
            None
        }
    }
}

/// Read one settings key, keeping `default` when it is absent, null or mistyped
fn key<'a, T: Deserialize<'a>>(document: &'a Value, name: &str, default: T) -> T {
    match document.get(name) {
        None | Some(Value::Null) => default,
        Some(value) => T::deserialize(value).unwrap_or_else(|e| {
            warn!("[CONFIG] Ignoring {}: {}", name, e);
            default
        }),
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("ssid", &self.ssid)
            .field("psk", &if self.psk.is_empty() { "" } else { "***" })
            .field("mdns_name", &self.mdns_name)
            .field("ip_addr", &self.ip_addr)
            .field("port", &self.port)
            .field("db_name", &self.db_name)
            .field("measurement", &self.measurement)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_recognized_keys() {
        let raw = br#"{
            "SSID": "home-net",
            "PSK": "hunter22",
            "influx_mdns_addr": "influx",
            "influx_ip_addr": "192.168.1.50",
            "influx_port": 8087,
            "db_name": "home",
            "measurement": "presence",
            "id": "front-door"
        }"#;

        let config = DeviceConfig::from_json(raw);
        assert_eq!(config.ssid, "home-net");
        assert_eq!(config.psk, "hunter22");
        assert_eq!(config.mdns_name, "influx");
        assert_eq!(config.ip_addr, "192.168.1.50");
        assert_eq!(config.port, 8087);
        assert_eq!(config.db_name, "home");
        assert_eq!(config.measurement, "presence");
        assert_eq!(config.id, "front-door");
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let config = DeviceConfig::from_json(br#"{"SSID": "home-net", "unknown": [1, 2]}"#);
        assert_eq!(config.ssid, "home-net");
        assert_eq!(config.psk, "");
        assert_eq!(config.port, DEFAULT_INFLUX_PORT);
        assert!(!config.has_credentials());
    }

    #[test]
    fn bad_field_keeps_the_other_settings() {
        let config = DeviceConfig::from_json(
            br#"{
                "SSID": "home-net",
                "PSK": "hunter22",
                "influx_ip_addr": null,
                "influx_mdns_addr": 42,
                "influx_port": "8087",
                "db_name": "home"
            }"#,
        );
        assert_eq!(config.ssid, "home-net");
        assert_eq!(config.psk, "hunter22");
        assert!(config.has_credentials());
        assert_eq!(config.ip_addr, "");
        assert_eq!(config.mdns_name, "");
        assert_eq!(config.port, DEFAULT_INFLUX_PORT);
        assert_eq!(config.db_name, "home");
    }

    #[test]
    fn out_of_range_port_falls_back() {
        let config = DeviceConfig::from_json(br#"{"SSID": "home-net", "influx_port": 70000}"#);
        assert_eq!(config.ssid, "home-net");
        assert_eq!(config.port, DEFAULT_INFLUX_PORT);
    }

    #[test]
    fn broken_or_missing_document_yields_defaults() {
        assert_eq!(DeviceConfig::from_json(b""), DeviceConfig::default());
        assert_eq!(DeviceConfig::from_json(b"{\"SSID\": "), DeviceConfig::default());
        assert_eq!(DeviceConfig::from_json(b"[\"home-net\"]"), DeviceConfig::default());
        assert_eq!(DeviceConfig::load(None), DeviceConfig::default());
        assert_eq!(DeviceConfig::default().port, 8086);
    }

    #[test]
    fn mdns_name_takes_precedence() {
        let mut config = DeviceConfig {
            mdns_name: "influx".into(),
            ip_addr: "192.168.1.50".into(),
            ..Default::default()
        };
        assert_eq!(config.influx_target(), Some(InfluxTarget::Mdns("influx")));

        config.mdns_name.clear();
        assert_eq!(
            config.influx_target(),
            Some(InfluxTarget::Literal("192.168.1.50"))
        );

        config.ip_addr.clear();
        assert_eq!(config.influx_target(), None);
    }

    #[test]
    fn debug_output_masks_passphrase() {
        let config = DeviceConfig {
            psk: "hunter22".into(),
            ..Default::default()
        };
        let shown = format!("{:?}", config);
        assert!(!shown.contains("hunter22"));
        assert!(shown.contains("***"));
    }
}

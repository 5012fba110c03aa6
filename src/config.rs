//! Receiver configuration
//!
//! Configuration is plain serde data, loadable from TOML. Protocol timing
//! constants default to the E1.31 recommendations but can be overridden.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, ReceiverError};
use crate::merge::AddressRange;
use crate::protocol::{self, Cid};
use crate::sources::SequenceWindow;

/// Which IP families to listen on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IpMode {
    #[default]
    Ipv4Only,
    Ipv6Only,
    Ipv4AndIpv6,
}

impl IpMode {
    pub fn uses_ipv4(&self) -> bool {
        matches!(self, IpMode::Ipv4Only | IpMode::Ipv4AndIpv6)
    }

    pub fn uses_ipv6(&self) -> bool {
        matches!(self, IpMode::Ipv6Only | IpMode::Ipv4AndIpv6)
    }
}

/// Protocol timers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Startup window before the first merge is reported
    pub sampling_period_ms: u64,
    /// Silence after which a source is considered lost
    pub source_loss_timeout_ms: u64,
    /// Period of the expiry sweep
    pub expiry_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sampling_period_ms: 1500,
            source_loss_timeout_ms: 2500,
            expiry_interval_ms: 250,
        }
    }
}

impl TimingConfig {
    pub fn sampling_period(&self) -> Duration {
        Duration::from_millis(self.sampling_period_ms)
    }

    pub fn source_loss_timeout(&self) -> Duration {
        Duration::from_millis(self.source_loss_timeout_ms)
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ReceiverError> {
        if self.source_loss_timeout_ms == 0 {
            return Err(ReceiverError::InvalidTiming(
                "source loss timeout must be non-zero".to_string(),
            ));
        }
        if self.expiry_interval_ms == 0 || self.expiry_interval_ms >= self.source_loss_timeout_ms {
            return Err(ReceiverError::InvalidTiming(format!(
                "expiry interval {}ms must be non-zero and shorter than the loss timeout {}ms",
                self.expiry_interval_ms, self.source_loss_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Settings accepted when starting a receiver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Universe to listen on (1-63999)
    pub universe: u16,
    /// Maximum number of concurrently tracked sources
    pub source_limit: usize,
    /// Drop packets flagged as preview data
    pub filter_preview_data: bool,
    /// Sources to ignore, typically this host's own transmitters
    pub excluded_cids: Vec<Cid>,
    pub ip_mode: IpMode,
    /// Local IPv4 interface for the multicast join
    pub interface: Option<Ipv4Addr>,
    /// IPv6 interface index for the multicast join (0 = any)
    pub ipv6_interface: u32,
    /// UDP port; 0 binds an ephemeral port for unicast-only use
    pub port: u16,
    pub join_multicast: bool,
    /// Trailing sequence window treated as stale (1-128)
    pub sequence_window: u8,
    pub timing: TimingConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            universe: 1,
            source_limit: crate::constants::DEFAULT_SOURCE_LIMIT,
            filter_preview_data: true,
            excluded_cids: Vec::new(),
            ip_mode: IpMode::default(),
            interface: None,
            ipv6_interface: 0,
            port: protocol::ACN_SDT_MULTICAST_PORT,
            join_multicast: true,
            sequence_window: SequenceWindow::HALF_RING.size(),
            timing: TimingConfig::default(),
        }
    }
}

impl ReceiverConfig {
    /// Default configuration for a universe
    pub fn for_universe(universe: u16) -> Self {
        Self {
            universe,
            ..Default::default()
        }
    }

    pub fn with_source_limit(mut self, source_limit: usize) -> Self {
        self.source_limit = source_limit;
        self
    }

    pub fn with_excluded_cid(mut self, cid: Cid) -> Self {
        self.excluded_cids.push(cid);
        self
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<(), ReceiverError> {
        protocol::validate_universe(self.universe)?;
        if self.source_limit == 0 {
            return Err(ReceiverError::InvalidSourceLimit(self.source_limit));
        }
        if self.sequence_window == 0 || self.sequence_window > 128 {
            return Err(ReceiverError::InvalidSequenceWindow(self.sequence_window));
        }
        self.timing.validate()
    }

    pub fn sequence_window(&self) -> SequenceWindow {
        SequenceWindow::new(self.sequence_window)
    }
}

/// Which addresses a consumer displays
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub start_address: u16,
    pub end_address: u16,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            start_address: 1,
            end_address: 512,
        }
    }
}

impl DisplayConfig {
    pub fn address_range(&self) -> Result<AddressRange, ReceiverError> {
        AddressRange::new(self.start_address, self.end_address)
    }
}

/// Application configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub receiver: ReceiverConfig,
    pub display: DisplayConfig,
}

impl AppConfig {
    /// Platform config file location
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "sacn", "sacn-receiver")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.receiver.validate()?;
        config.display.address_range()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from the platform location, falling back to defaults if absent
    pub fn load_or_default() -> Result<Self, Error> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReceiverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 5568);
        assert_eq!(config.timing.source_loss_timeout(), Duration::from_millis(2500));
        assert_eq!(config.sequence_window(), SequenceWindow::HALF_RING);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            ReceiverConfig::for_universe(0).validate(),
            Err(ReceiverError::InvalidUniverse(0))
        );
        assert_eq!(
            ReceiverConfig::for_universe(64000).validate(),
            Err(ReceiverError::InvalidUniverse(64000))
        );
        assert_eq!(
            ReceiverConfig::for_universe(1).with_source_limit(0).validate(),
            Err(ReceiverError::InvalidSourceLimit(0))
        );

        let mut config = ReceiverConfig::default();
        config.timing.expiry_interval_ms = 3000;
        assert!(matches!(config.validate(), Err(ReceiverError::InvalidTiming(_))));

        let mut config = ReceiverConfig::default();
        config.sequence_window = 0;
        assert_eq!(config.validate(), Err(ReceiverError::InvalidSequenceWindow(0)));
    }

    #[test]
    fn test_parse_toml() {
        let config = AppConfig::from_toml(
            r#"
            [receiver]
            universe = 5
            source_limit = 2
            filter_preview_data = false
            excluded_cids = ["6ba7b810-9dad-11d1-80b4-00c04fd430c8"]
            ip_mode = "ipv4_and_ipv6"
            interface = "192.168.1.20"

            [receiver.timing]
            sampling_period_ms = 500

            [display]
            start_address = 10
            end_address = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.receiver.universe, 5);
        assert_eq!(config.receiver.source_limit, 2);
        assert!(!config.receiver.filter_preview_data);
        assert_eq!(config.receiver.excluded_cids.len(), 1);
        assert!(config.receiver.ip_mode.uses_ipv6());
        assert_eq!(config.receiver.interface, Some(Ipv4Addr::new(192, 168, 1, 20)));
        assert_eq!(config.receiver.timing.sampling_period_ms, 500);
        assert_eq!(config.receiver.timing.source_loss_timeout_ms, 2500);
        assert_eq!(config.display.address_range().unwrap().len(), 11);
    }

    #[test]
    fn test_reject_invalid_toml() {
        assert!(matches!(
            AppConfig::from_toml("[receiver]\nuniverse = 0\n"),
            Err(Error::Receiver(ReceiverError::InvalidUniverse(0)))
        ));
        assert!(matches!(
            AppConfig::from_toml("[receiver]\nuniverse = \"one\"\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[display]\nstart_address = 20\nend_address = 10\n"),
            Err(Error::Receiver(ReceiverError::InvalidAddressRange { .. }))
        ));
    }

    #[test]
    fn test_toml_roundtrip_preserves_defaults() {
        let text = AppConfig::default().to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.receiver.universe, 1);
        assert_eq!(parsed.display.end_address, 512);
    }
}

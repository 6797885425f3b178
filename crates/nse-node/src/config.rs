//! Node configuration loaded from a TOML file.
//!
//! # Config File Format
//!
//! ```toml
//! [nse]
//! api_address = "127.0.0.1:7201"
//! enforce_localhost = true
//! frequency = 300
//! respected_rounds = 8
//! max_backlog_rounds = 2
//! proof_of_work_bits = 20
//! min_proximity = 0
//! data_type = 520
//! gossip_ttl = 0
//! private_key = "nse_key.pem"
//! database = "nse-data"
//!
//! [gossip]
//! api_address = "127.0.0.1:7001"
//! reconnect_base = 1.5
//! reconnect_max_delay_secs = 0
//!
//! [logging]
//! level = "info"
//! json = false
//! file = ""
//! ```
//!
//! Every key is optional; missing keys take the defaults shown above.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use nse_core::protocol::pow::MAX_PROOF_OF_WORK_BITS;
use nse_core::{EstimationConfig, DEFAULT_PROOF_OF_WORK_BITS};

/// Default config file name used by the CLI.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Errors that can occur during config loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Cannot access config file {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// TOML parse error.
    #[error("Invalid config file: {0}")]
    Parse(String),

    #[error("Cannot serialize config: {0}")]
    Serialize(String),

    /// A value is out of range.
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted key, e.g. `nse.frequency`.
        field: &'static str,
        reason: String,
    },

    #[error("Refusing to overwrite existing file {0}")]
    AlreadyExists(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub nse: NseSection,
    pub gossip: GossipSection,
    pub logging: LoggingSection,
}

/// `[nse]` section: estimation parameters and the local control API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NseSection {
    /// Control listener address.
    pub api_address: String,
    /// Close control connections from non-loopback peers.
    pub enforce_localhost: bool,
    /// Round length in seconds. Must match the network.
    pub frequency: u64,
    pub respected_rounds: usize,
    pub max_backlog_rounds: u64,
    /// Must match the network.
    pub proof_of_work_bits: u32,
    /// Relayed claims below this proximity are dropped unverified.
    pub min_proximity: u8,
    /// Relay data type carrying claims.
    pub data_type: u16,
    pub gossip_ttl: u8,
    /// PEM file holding the 4096-bit RSA identity.
    pub private_key: PathBuf,
    /// RocksDB directory (only used with the `rocksdb` feature).
    pub database: PathBuf,
}

impl Default for NseSection {
    fn default() -> Self {
        let estimation = EstimationConfig::default();
        Self {
            api_address: "127.0.0.1:7201".to_string(),
            enforce_localhost: true,
            frequency: estimation.frequency,
            respected_rounds: estimation.respected_rounds,
            max_backlog_rounds: estimation.max_backlog_rounds,
            proof_of_work_bits: DEFAULT_PROOF_OF_WORK_BITS,
            min_proximity: estimation.min_proximity,
            data_type: 520,
            gossip_ttl: 0,
            private_key: PathBuf::from("nse_key.pem"),
            database: PathBuf::from("nse-data"),
        }
    }
}

/// `[gossip]` section: relay connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipSection {
    pub api_address: String,
    /// Reconnect delay is `reconnect_base ^ failures` seconds.
    pub reconnect_base: f64,
    /// Cap on the reconnect delay; 0 means uncapped.
    pub reconnect_max_delay_secs: u64,
}

impl Default for GossipSection {
    fn default() -> Self {
        Self {
            api_address: "127.0.0.1:7001".to_string(),
            reconnect_base: 1.5,
            reconnect_max_delay_secs: 0,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub json: bool,
    /// `""`, `"-"`, `"stdout"`, `"stderr"` or a file path.
    pub file: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: String::new(),
        }
    }
}

impl NodeConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nse.frequency == 0 {
            return Err(invalid("nse.frequency", "must be greater than zero"));
        }
        if self.nse.respected_rounds == 0 {
            return Err(invalid("nse.respected_rounds", "must be greater than zero"));
        }
        if self.nse.proof_of_work_bits > MAX_PROOF_OF_WORK_BITS {
            return Err(invalid(
                "nse.proof_of_work_bits",
                format!("must be at most {MAX_PROOF_OF_WORK_BITS}"),
            ));
        }
        self.api_address()?;
        self.gossip_address()?;
        if !(self.gossip.reconnect_base > 1.0) {
            return Err(invalid("gossip.reconnect_base", "must be greater than 1.0"));
        }
        EnvFilter::try_new(&self.logging.level)
            .map_err(|e| invalid("logging.level", e.to_string()))?;
        Ok(())
    }

    /// Control listener address.
    pub fn api_address(&self) -> Result<SocketAddr, ConfigError> {
        parse_socket_addr("nse.api_address", &self.nse.api_address)
    }

    /// Relay address.
    pub fn gossip_address(&self) -> Result<SocketAddr, ConfigError> {
        parse_socket_addr("gossip.api_address", &self.gossip.api_address)
    }

    pub fn reconnect_max_delay(&self) -> Option<Duration> {
        match self.gossip.reconnect_max_delay_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Estimation parameters for the core services.
    pub fn estimation(&self) -> EstimationConfig {
        EstimationConfig {
            frequency: self.nse.frequency,
            respected_rounds: self.nse.respected_rounds,
            max_backlog_rounds: self.nse.max_backlog_rounds,
            proof_of_work_bits: self.nse.proof_of_work_bits,
            min_proximity: self.nse.min_proximity,
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Write the default configuration to `path`.
    ///
    /// Fails with `AlreadyExists` unless `force` is set.
    pub fn write_default<P: AsRef<Path>>(path: P, force: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path.display().to_string()));
        }
        let config = Self::default();
        fs::write(path, config.to_toml()?).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Ok(config)
    }
}

fn parse_socket_addr(field: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(field, format!("{value:?} is not a socket address")))
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

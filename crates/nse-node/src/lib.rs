//! # NSE Node Library
//!
//! Process-level pieces of a network size estimation node. The main entry
//! point is the `main.rs` binary; the modules are exposed for integration
//! tests.
//!
//! - `config` - TOML configuration with validation
//! - `logging` - tracing subscriber setup
//! - `keys` - RSA identity loading and generation
//! - `connection` - framed connection driver and the `ConnectionHandler` trait
//! - `control` - local control API listener
//! - `gossip` - relay client with reconnect supervisor
//! - `runtime` - round loop and `NodeRuntime` wiring

pub mod config;
pub mod connection;
pub mod control;
pub mod gossip;
pub mod keys;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, NodeConfig, DEFAULT_CONFIG_FILE};
pub use connection::{Action, CloseReason, ConnectionHandler, SessionId};
pub use control::{ControlHandler, ControlListener};
pub use gossip::{GossipClient, GossipHandler, GossipSettings, ReconnectBackoff};
pub use keys::{generate_key, load_private_key, KeyError};
pub use logging::{init_logging, LogTarget, LoggingError};
pub use runtime::{open_ledger, NodeRuntime, RoundLoop};

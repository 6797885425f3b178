//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSection;

/// Logging setup failures.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Cannot open log file {path}: {error}")]
    Open { path: String, error: String },

    #[error("Cannot install subscriber: {0}")]
    Init(String),
}

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// `""`, `"-"` and `"stderr"` select stderr; `"stdout"` selects stdout;
    /// anything else is a file path.
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "-" | "stderr" => Self::Stderr,
            "stdout" => Self::Stdout,
            path => Self::File(PathBuf::from(path)),
        }
    }

    fn is_terminal_stream(&self) -> bool {
        !matches!(self, Self::File(_))
    }

    /// Open the target; files are appended to.
    pub fn make_writer(&self) -> Result<BoxMakeWriter, LoggingError> {
        Ok(match self {
            Self::Stdout => BoxMakeWriter::new(std::io::stdout),
            Self::Stderr => BoxMakeWriter::new(std::io::stderr),
            Self::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| LoggingError::Open {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    })?;
                BoxMakeWriter::new(Mutex::new(file))
            }
        })
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingSection) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LoggingError::Filter(e.to_string()))?;

    let target = LogTarget::parse(&config.file);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(target.is_terminal_stream())
        .with_writer(target.make_writer()?);

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };
    installed.map_err(|e| LoggingError::Init(e.to_string()))
}

use std::fmt;
use thiserror::Error;

/// A single observer callback that failed during a collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    /// Name of the instrument the callback was registered on
    pub instrument: String,
    /// Error text, or the panic message when the callback panicked
    pub reason: String,
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.instrument, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid histogram boundaries: {0}")]
    InvalidBoundaries(String),

    #[error("{} observer callback(s) failed: {}", failures.len(), join_failures(failures))]
    CallbackFailed { failures: Vec<CallbackFailure> },

    #[error("Unknown metric reader: {0}")]
    UnknownReader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for metrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;

fn join_failures(failures: &[CallbackFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl MetricsError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new boundaries error
    pub fn invalid_boundaries<S: Into<String>>(msg: S) -> Self {
        Self::InvalidBoundaries(msg.into())
    }

    /// Failed callbacks carried by this error, empty for every other variant
    pub fn callback_failures(&self) -> &[CallbackFailure] {
        match self {
            Self::CallbackFailed { failures } => failures,
            _ => &[],
        }
    }

    /// Returns true if the next collection cycle may succeed without intervention
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CallbackFailed { .. })
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidBoundaries(_) | Self::UnknownReader(_) => "config",
            Self::CallbackFailed { .. } => "collection",
            Self::Io(_) => "io",
            Self::Yaml(_) => "serialization",
        }
    }
}

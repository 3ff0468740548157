//! Custom error types for proxied
//!
//! Every failure surfaces to the caller; nothing is recovered internally apart
//! from the rollback performed by write plans.

use thiserror::Error;

/// Main error type for proxied operations
#[derive(Error, Debug)]
pub enum ProxiedError {
    /// The binary was built for an OS without an adapter
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The Linux desktop environment has no proxy adapter
    #[error("Unsupported desktop: {0}")]
    UnsupportedDesktop(String),

    /// Invalid proxy configuration, raised before anything is written
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration feature the platform cannot store
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The native utility could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The native utility exited unsuccessfully
    #[error("Command `{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A write plan failed after some of its writes were applied
    #[error("Applied {applied} of {total} writes before failing (rolled back: {rolled_back}): {source}")]
    PartialApply {
        applied: usize,
        total: usize,
        rolled_back: bool,
        #[source]
        source: Box<ProxiedError>,
    },

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings file errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxiedError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an unsupported-feature error
    pub fn unsupported_feature(msg: impl Into<String>) -> Self {
        Self::UnsupportedFeature(msg.into())
    }

    /// Create an unsupported-desktop error
    pub fn unsupported_desktop(desktop: impl Into<String>) -> Self {
        Self::UnsupportedDesktop(desktop.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error was raised by validation, before any command ran
    pub fn is_rejected_config(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::UnsupportedFeature(_))
    }
}

/// Result type alias using ProxiedError
pub type Result<T> = std::result::Result<T, ProxiedError>;

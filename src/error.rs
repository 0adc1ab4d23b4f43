//! Error handling for Stillpoint
//!
//! Nothing here is meant to end a meditation session. Every variant is caught
//! at the smallest scope that can handle it and logged; the public engine API
//! only ever returns plain values.

use thiserror::Error;

use crate::layers::Layer;

/// Result type alias for Stillpoint operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Errors raised by the platform media layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("source could not be opened: {0}")]
    Open(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("player has been released")]
    Released,

    #[error("audio session rejected configuration: {0}")]
    Session(String),

    #[error("{0}")]
    Other(String),
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Unsupported audio source: {source_str}")]
    UnsupportedSource { source_str: String },

    #[error("Failed to load {layer} track from {source_str}")]
    LoadFailure {
        layer: Layer,
        source_str: String,
        #[source]
        source: PlatformError,
    },

    #[error("{action} failed on {layer}")]
    TransportFailure {
        layer: Layer,
        action: &'static str,
        #[source]
        source: PlatformError,
    },

    #[error("Fade step {step} failed on {layer}")]
    FadeStepFailure {
        layer: Layer,
        step: usize,
        #[source]
        source: PlatformError,
    },

    #[error("Audio session configuration failed")]
    SessionConfig(#[source] PlatformError),

    #[error("Invalid configuration: {reason}")]
    ConfigInvalid { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AudioError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            AudioError::UnsupportedSource { .. } => "UNSUPPORTED_SOURCE",
            AudioError::LoadFailure { .. } => "LOAD_FAILURE",
            AudioError::TransportFailure { .. } => "TRANSPORT_FAILURE",
            AudioError::FadeStepFailure { .. } => "FADE_STEP_FAILURE",
            AudioError::SessionConfig(_) => "SESSION_CONFIG",
            AudioError::ConfigInvalid { .. } => "CONFIG_INVALID",
            AudioError::Io(_) => "IO_ERROR",
            AudioError::Json(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the session can carry on after this error
    ///
    /// Layer-scoped failures only ever silence one layer.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AudioError::UnsupportedSource { .. }
                | AudioError::LoadFailure { .. }
                | AudioError::TransportFailure { .. }
                | AudioError::FadeStepFailure { .. }
                | AudioError::SessionConfig(_)
        )
    }

    /// The layer this error is scoped to, if any
    pub fn layer(&self) -> Option<Layer> {
        match self {
            AudioError::LoadFailure { layer, .. }
            | AudioError::TransportFailure { layer, .. }
            | AudioError::FadeStepFailure { layer, .. } => Some(*layer),
            _ => None,
        }
    }

    /// Log a swallowed error. Called once, at the scope that caught it.
    pub(crate) fn report(&self) {
        let cause = std::error::Error::source(self)
            .map(|s| s.to_string())
            .unwrap_or_default();
        let layer = self.layer().map(|l| l.as_str()).unwrap_or("-");
        match self {
            AudioError::UnsupportedSource { .. } => {
                tracing::warn!(code = self.error_code(), "{}", self)
            }
            _ => tracing::error!(code = self.error_code(), layer, cause = %cause, "{}", self),
        }
    }
}

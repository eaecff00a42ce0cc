//! Error types and handling infrastructure for render-dispatch.
//!
//! The library reports failures through [`DispatchError`]; the binary wraps them in
//! `anyhow` for context. Two variants mirror the worker protocol's error taxonomy:
//!
//! - **ImportFailure**: the compute module could not be loaded where it was asked to run.
//!   An environment limitation, never surfaced to the user as an error.
//! - **RenderFailure**: the compute call failed or produced malformed output. Always
//!   surfaced, never retried automatically.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for render-dispatch operations.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Compute module could not be loaded or initialized
    #[error("Compute module import failed: {message}")]
    ImportFailure { message: String },

    /// The compute call itself failed or returned malformed data
    #[error("Render failed: {message}")]
    RenderFailure { message: String },

    /// A reply did not match the request it answers
    #[error("Unexpected protocol message: {message}")]
    Protocol { message: String },

    /// The background context is gone or could not be constructed
    #[error("Background worker unavailable: {message}")]
    WorkerUnavailable { message: String },

    /// Configuration file or value problems
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Writing render output failed
    #[error("Output failed for {path}: {source}")]
    OutputError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image encoding failed
    #[error("Image encoding failed: {message}")]
    ImageError { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for render-dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

impl DispatchError {
    pub fn import_failure(message: impl Into<String>) -> Self {
        Self::ImportFailure {
            message: message.into(),
        }
    }

    pub fn render_failure(message: impl Into<String>) -> Self {
        Self::RenderFailure {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn worker_unavailable(message: impl Into<String>) -> Self {
        Self::WorkerUnavailable {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputError {
            path: path.into(),
            source,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether the error belongs to the environment-limitation class that triggers fallback
    pub fn is_import_failure(&self) -> bool {
        matches!(self, Self::ImportFailure { .. })
    }
}

impl From<image::ImageError> for DispatchError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError {
            message: err.to_string(),
        }
    }
}

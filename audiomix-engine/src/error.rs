//! Error types for audiomix-engine
//!
//! Defines engine error types using thiserror for clear error propagation.
//! Nothing in the mixing path returns these; failures there degrade to silence.

use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from the shared common library
    #[error(transparent)]
    Common(#[from] audiomix_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream or decoder could not be opened
    #[error("Open error: {0}")]
    Open(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Resampler backend initialisation errors
    #[error("Resampler error: {0}")]
    Resampler(String),

    /// Sample format or channel layout the engine cannot produce
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;

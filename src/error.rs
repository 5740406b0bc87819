//! Error types for qpolicy

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported quantization range: {bits}-bit (signed: {signed})")]
    UnsupportedRange { bits: u8, signed: bool },

    #[error("Channel mismatch: expected {expected}, got {got}")]
    ChannelMismatch { expected: usize, got: usize },

    #[error("Observer mismatch: {0}")]
    ObserverMismatch(String),

    #[error("Observer lock poisoned")]
    ObserverPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

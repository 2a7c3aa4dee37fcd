//! Crate-level error type

use thiserror::Error;

/// Errors surfaced by the gateway outside of the boundary handlers.
///
/// Fetch and workflow failures never reach this type; handlers turn them
/// into JSON bodies.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

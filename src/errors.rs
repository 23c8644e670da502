//! Typed errors for adapter-boundary failures and config/symbol parsing.
//!
//! Adapter errors never cross the boundary as panics; `VenueAdapter` methods
//! map every failure into an `OrderResponse` or a `VenueEvent::Error`
//! carrying the `Display` form of one of these.

use thiserror::Error;

/// The four error kinds named in the adapter error-handling design: a
/// not-connected call, a transport/protocol failure, a venue-side rejection,
/// or a malformed payload.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("not connected")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingVar(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("unrecognized quote asset in symbol: {0}")]
    UnrecognizedQuote(String),
}

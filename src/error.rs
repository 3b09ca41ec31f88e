use thiserror::Error;

use crate::exchange::AdapterError;

/// Errors raised by the execution layer
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("{exchange} does not offer the {currency}/{asset} market")]
    UnsupportedMarket {
        exchange: String,
        currency: String,
        asset: String,
    },

    #[error("Unknown fund: {0}")]
    UnknownFund(String),

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Exchange adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// An adapter call kept failing after the bounded retries
    #[error("Exchange unavailable for {operation} after {attempts} attempts: {source}")]
    AdapterUnavailable {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: AdapterError,
    },
}

pub type Result<T> = std::result::Result<T, ExecutionError>;

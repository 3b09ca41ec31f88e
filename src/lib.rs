// Core modules
pub mod config;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod models;

// Re-export commonly used types
pub use error::{ExecutionError, Result};
pub use exchange::ExchangeAdapter;
pub use execution::{SupervisionOutcome, TradeExecutor};
pub use models::*;

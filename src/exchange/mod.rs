// Exchange adapter boundary
pub mod paper;
pub mod registry;

pub use paper::{AdapterCall, PaperExchange, PaperSettings};
pub use registry::{ResolvedVenue, VenueRegistry, VenueSettings};

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{OrderPrice, Portfolio, Ticker};

/// Failure reported by a venue adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("connectivity: {0}")]
    Connectivity(String),

    #[error("order rejected by venue: {0}")]
    Rejected(String),

    #[error("unknown order: {0}")]
    UnknownOrder(String),
}

/// Fill progress of a submitted order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillState {
    Unfilled,
    PartiallyFilled,
    Filled,
}

impl FillState {
    pub fn is_fully_filled(&self) -> bool {
        matches!(self, FillState::Filled)
    }
}

/// Normalized, authenticated access to one venue account
///
/// Implementations own the wire protocol, rate limiting and venue quirks.
/// Every call may fail.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Display name used in log lines
    fn name(&self) -> &str;

    async fn get_portfolio(&self) -> Result<Portfolio, AdapterError>;

    /// Trading fee as a fraction (0.002 = 0.2%)
    async fn get_fee(&self) -> Result<Decimal, AdapterError>;

    async fn get_ticker(&self) -> Result<Ticker, AdapterError>;

    /// Place a buy order, returning the venue's order id
    async fn buy(&self, amount: Decimal, price: OrderPrice) -> Result<String, AdapterError>;

    /// Place a sell order, returning the venue's order id
    async fn sell(&self, amount: Decimal, price: OrderPrice) -> Result<String, AdapterError>;

    async fn check_order(&self, order_id: &str) -> Result<FillState, AdapterError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), AdapterError>;
}

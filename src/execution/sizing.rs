use rust_decimal::Decimal;

use crate::config::SizingConfig;
use crate::models::{ExchangeCapabilities, Portfolio, Signal, Ticker};

/// Decides how much of the asset a single attempt orders
pub trait OrderSizer: Send + Sync {
    fn amount(&self, signal: &Signal, portfolio: &Portfolio, ticker: &Ticker) -> Decimal;
}

/// Same amount for every attempt, ignoring balances
///
/// Infinity-order venues get a separate (large) amount since they accept
/// orders beyond the literal balance.
#[derive(Debug, Clone)]
pub struct FixedSizing {
    amount: Decimal,
}

impl FixedSizing {
    pub fn new(amount: Decimal) -> Self {
        Self { amount }
    }

    pub fn from_config(config: &SizingConfig, capabilities: ExchangeCapabilities) -> Self {
        if capabilities.infinity_order {
            Self::new(config.infinity_amount)
        } else {
            Self::new(config.fixed_amount)
        }
    }
}

impl OrderSizer for FixedSizing {
    fn amount(&self, _signal: &Signal, _portfolio: &Portfolio, _ticker: &Ticker) -> Decimal {
        self.amount
    }
}

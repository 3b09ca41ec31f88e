use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{MarketConfig, Portfolio, Side};

/// Why an attempt was stopped before submission
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("insufficient {symbol} to {side}: wanted {amount}, available {available:.12}")]
    InsufficientFunds {
        side: Side,
        symbol: String,
        amount: Decimal,
        available: Decimal,
    },

    #[error("{side} amount too small: {amount:.12} below minimum {minimum:.12}")]
    OrderTooSmall {
        side: Side,
        amount: Decimal,
        minimum: Decimal,
    },

    #[error("no {0} balance in portfolio")]
    UnknownFund(String),

    #[error("non-positive price {0}")]
    InvalidPrice(Decimal),

    /// `value` divided by `price` does not fit in a `Decimal`
    #[error("{side} of {amount} at {price}: {value} is out of range in asset units")]
    Overflow {
        side: Side,
        amount: Decimal,
        price: Decimal,
        value: Decimal,
    },
}

/// Checks an (amount, price) candidate against balances and venue minimums
#[derive(Debug, Clone)]
pub struct FeasibilityValidator {
    market: MarketConfig,
}

impl FeasibilityValidator {
    pub fn new(market: MarketConfig) -> Self {
        Self { market }
    }

    pub fn market(&self) -> &MarketConfig {
        &self.market
    }

    /// Minimum order size in asset units at `price`
    pub fn minimum(&self, price: Decimal) -> Option<Decimal> {
        self.market.minimal_order.minimum_amount(price)
    }

    /// Asset amount the portfolio can cover when ordering `amount` on
    /// `side` at `price`
    pub fn available(
        &self,
        side: Side,
        amount: Decimal,
        price: Decimal,
        portfolio: &Portfolio,
    ) -> Result<Decimal, Rejection> {
        let symbol = match side {
            Side::Buy => self.market.currency(),
            Side::Sell => self.market.asset(),
        };
        let balance = portfolio
            .fund(symbol)
            .map(|f| f.amount)
            .ok_or_else(|| Rejection::UnknownFund(symbol.to_string()))?;

        match side {
            Side::Buy => balance.checked_div(price).ok_or(Rejection::Overflow {
                side,
                amount,
                price,
                value: balance,
            }),
            Side::Sell => Ok(balance),
        }
    }

    /// Approve the candidate, or say why not
    ///
    /// `price` is the limit price, or the reference price (ask) for a
    /// market order.
    pub fn check(
        &self,
        side: Side,
        amount: Decimal,
        price: Decimal,
        portfolio: &Portfolio,
    ) -> Result<(), Rejection> {
        if price <= Decimal::ZERO {
            return Err(Rejection::InvalidPrice(price));
        }

        let available = self.available(side, amount, price, portfolio)?;
        if amount > available {
            let symbol = match side {
                Side::Buy => self.market.currency(),
                Side::Sell => self.market.asset(),
            };
            return Err(Rejection::InsufficientFunds {
                side,
                symbol: symbol.to_string(),
                amount,
                available,
            });
        }

        let minimum = self.minimum(price).ok_or(Rejection::Overflow {
            side,
            amount,
            price,
            value: self.market.minimal_order.amount,
        })?;
        if amount < minimum {
            return Err(Rejection::OrderTooSmall {
                side,
                amount,
                minimum,
            });
        }

        Ok(())
    }
}

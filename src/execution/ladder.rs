use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::LadderConfig;
use crate::models::{ExchangeCapabilities, OrderPrice, Side, Signal, Ticker};

/// Venues reject prices with more decimals than this
pub const PRICE_DECIMALS: u32 = 8;

/// Round a buy price down so we never bid above the computed figure
pub fn floor_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::ToNegativeInfinity)
}

/// Round a sell price up so we never offer below the computed figure
pub fn ceil_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::ToPositiveInfinity)
}

/// Candidate prices for each (side, tier) derived from the latest ask
///
/// Buy tier `t` sits `offset[t]` below the ask. The sell price of a tier is
/// the buy price of the same tier plus a fixed spread, independent of the bid.
#[derive(Debug, Clone)]
pub struct PriceLadder {
    tier_offsets: [Decimal; 3],
    sell_spread: Decimal,
    direct_exchange: bool,
}

impl PriceLadder {
    pub fn new(config: &LadderConfig, capabilities: ExchangeCapabilities) -> Self {
        Self {
            tier_offsets: config.tier_offsets,
            sell_spread: config.sell_spread,
            direct_exchange: capabilities.direct,
        }
    }

    /// Unrounded limit price for a signal
    pub fn raw_price(&self, ticker: &Ticker, signal: &Signal) -> Decimal {
        let buy_price = ticker.ask - self.tier_offsets[signal.tier.index()];
        match signal.side {
            Side::Buy => buy_price,
            Side::Sell => buy_price + self.sell_spread,
        }
    }

    /// Price to submit for a signal
    ///
    /// Direct venues take buys as market orders. Sells always carry a limit.
    pub fn price(&self, ticker: &Ticker, signal: &Signal) -> OrderPrice {
        match signal.side {
            Side::Buy if self.direct_exchange => OrderPrice::Market,
            Side::Buy => OrderPrice::Limit(floor_price(self.raw_price(ticker, signal))),
            Side::Sell => OrderPrice::Limit(ceil_price(self.raw_price(ticker, signal))),
        }
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ExecutionError;

/// Direction of a trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price tier, 1 (closest to the ask) through 3
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tier(u8);

impl Tier {
    pub const FIRST: Tier = Tier(1);
    pub const SECOND: Tier = Tier(2);
    pub const THIRD: Tier = Tier(3);

    pub const ALL: [Tier; 3] = [Tier::FIRST, Tier::SECOND, Tier::THIRD];

    pub fn new(value: u8) -> Option<Self> {
        (1..=3).contains(&value).then_some(Tier(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Zero-based position in per-tier lookup tables
    pub fn index(&self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for Tier {
    type Error = ExecutionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tier::new(value).ok_or_else(|| ExecutionError::InvalidSignal(format!("tier {}", value)))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trading signal emitted by the strategy layer
///
/// Immutable once issued. A retry after an unfilled order reuses the very
/// same value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Signal {
    pub side: Side,
    pub tier: Tier,
}

impl Signal {
    pub fn new(side: Side, tier: Tier) -> Self {
        Self { side, tier }
    }

    pub fn buy(tier: Tier) -> Self {
        Self::new(Side::Buy, tier)
    }

    pub fn sell(tier: Tier) -> Self {
        Self::new(Side::Sell, tier)
    }

    /// All six recognised (side, tier) combinations
    pub fn all() -> impl Iterator<Item = Signal> {
        [Side::Buy, Side::Sell]
            .into_iter()
            .flat_map(|side| Tier::ALL.into_iter().map(move |tier| Signal::new(side, tier)))
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.side, self.tier)
    }
}

impl FromStr for Signal {
    type Err = ExecutionError;

    /// Parses the legacy command names `BUY1`..`BUY3` and `SELL1`..`SELL3`
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let upper = raw.trim().to_ascii_uppercase();
        let (side, digits) = if let Some(rest) = upper.strip_prefix("BUY") {
            (Side::Buy, rest)
        } else if let Some(rest) = upper.strip_prefix("SELL") {
            (Side::Sell, rest)
        } else {
            return Err(ExecutionError::InvalidSignal(raw.to_string()));
        };

        digits
            .parse::<u8>()
            .ok()
            .and_then(Tier::new)
            .map(|tier| Signal::new(side, tier))
            .ok_or_else(|| ExecutionError::InvalidSignal(raw.to_string()))
    }
}

/// Balance of one currency or asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fund {
    pub name: String,
    pub amount: Decimal,
}

/// Fund balances keyed by symbol
///
/// Always replaced as a whole; there is no per-fund update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    funds: HashMap<String, Fund>,
}

impl Portfolio {
    pub fn new(funds: impl IntoIterator<Item = Fund>) -> Self {
        Self {
            funds: funds.into_iter().map(|f| (f.name.clone(), f)).collect(),
        }
    }

    pub fn fund(&self, name: &str) -> Option<&Fund> {
        self.funds.get(name)
    }

    /// Funds sorted by symbol, for stable log output
    pub fn funds(&self) -> Vec<&Fund> {
        let mut funds: Vec<&Fund> = self.funds.values().collect();
        funds.sort_by(|a, b| a.name.cmp(&b.name));
        funds
    }

    pub fn len(&self) -> usize {
        self.funds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funds.is_empty()
    }
}

/// Top of book snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Ticker {
    pub bid: Decimal,
    pub ask: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderUnit {
    Currency,
    Asset,
}

/// Smallest order a venue accepts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MinimalOrder {
    pub unit: OrderUnit,
    pub amount: Decimal,
}

impl MinimalOrder {
    /// Minimum order size in asset units at the given price
    ///
    /// `None` when converting a currency minimum overflows at this price.
    pub fn minimum_amount(&self, price: Decimal) -> Option<Decimal> {
        match self.unit {
            OrderUnit::Currency => self.amount.checked_div(price),
            OrderUnit::Asset => Some(self.amount),
        }
    }
}

/// A tradable pair on one venue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketConfig {
    /// (currency, asset)
    pub pair: (String, String),
    pub minimal_order: MinimalOrder,
}

impl MarketConfig {
    pub fn currency(&self) -> &str {
        &self.pair.0
    }

    pub fn asset(&self) -> &str {
        &self.pair.1
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExchangeCapabilities {
    /// Accepts orders without a limit price
    pub direct: bool,
    /// Accepts orders larger than the literal balance (margin venues)
    pub infinity_order: bool,
}

/// Price attached to a submitted order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum OrderPrice {
    Limit(Decimal),
    Market,
}

impl OrderPrice {
    pub fn limit(&self) -> Option<Decimal> {
        match self {
            OrderPrice::Limit(price) => Some(*price),
            OrderPrice::Market => None,
        }
    }
}

impl fmt::Display for OrderPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderPrice::Limit(price) => write!(f, "{:.8}", price),
            OrderPrice::Market => f.write_str("MKT"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    FilledPartially,
    FilledFully,
    Cancelled,
}

/// One submitted order
///
/// A retry never mutates an earlier record: it appends a new one with the
/// freshly computed price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Handle returned by the venue
    pub exchange_order_id: String,
    pub signal: Signal,
    pub price: OrderPrice,
    pub amount: Decimal,
    pub status: OrderStatus,
    /// 1 for the first submission of a signal, incremented per retry
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn side(&self) -> Side {
        self.signal.side
    }

    pub fn tier(&self) -> Tier {
        self.signal.tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signal_parsing() {
        assert_eq!("BUY1".parse::<Signal>().unwrap(), Signal::buy(Tier::FIRST));
        assert_eq!("sell3".parse::<Signal>().unwrap(), Signal::sell(Tier::THIRD));
        assert_eq!(" SELL2 ".parse::<Signal>().unwrap(), Signal::sell(Tier::SECOND));

        assert!("BUY4".parse::<Signal>().is_err());
        assert!("BUY0".parse::<Signal>().is_err());
        assert!("HOLD".parse::<Signal>().is_err());
        assert!("BUY".parse::<Signal>().is_err());
    }

    #[test]
    fn test_signal_display_matches_command() {
        for signal in Signal::all() {
            let parsed: Signal = signal.to_string().parse().unwrap();
            assert_eq!(parsed, signal);
        }
        assert_eq!(Signal::all().count(), 6);
    }

    #[test]
    fn test_tier_bounds() {
        assert!(Tier::new(0).is_none());
        assert!(Tier::new(4).is_none());
        assert_eq!(Tier::new(2), Some(Tier::SECOND));
        assert_eq!(Tier::THIRD.index(), 2);
    }

    #[test]
    fn test_minimum_in_currency_is_converted() {
        let minimal = MinimalOrder {
            unit: OrderUnit::Currency,
            amount: dec!(10),
        };
        assert_eq!(minimal.minimum_amount(dec!(500)), Some(dec!(0.02)));
    }

    #[test]
    fn test_minimum_conversion_overflow() {
        let minimal = MinimalOrder {
            unit: OrderUnit::Currency,
            amount: Decimal::MAX,
        };
        assert_eq!(minimal.minimum_amount(dec!(0.00000001)), None);
    }

    #[test]
    fn test_minimum_in_asset_ignores_price() {
        let minimal = MinimalOrder {
            unit: OrderUnit::Asset,
            amount: dec!(0.02),
        };
        assert_eq!(minimal.minimum_amount(dec!(500)), Some(dec!(0.02)));
        assert_eq!(minimal.minimum_amount(dec!(1)), Some(dec!(0.02)));
    }

    #[test]
    fn test_portfolio_lookup() {
        let portfolio = Portfolio::new(vec![
            Fund {
                name: "USD".to_string(),
                amount: dec!(10.1),
            },
            Fund {
                name: "BTC".to_string(),
                amount: dec!(0.5),
            },
        ]);

        assert_eq!(portfolio.len(), 2);
        assert_eq!(portfolio.fund("USD").unwrap().amount, dec!(10.1));
        assert!(portfolio.fund("ETH").is_none());
        assert_eq!(portfolio.funds()[0].name, "BTC");
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, Result};
use crate::models::{ExchangeCapabilities, MarketConfig, MinimalOrder, OrderUnit};

/// Static description of one venue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VenueSettings {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub direct: bool,
    #[serde(default)]
    pub infinity_order: bool,
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

impl VenueSettings {
    pub fn capabilities(&self) -> ExchangeCapabilities {
        ExchangeCapabilities {
            direct: self.direct,
            infinity_order: self.infinity_order,
        }
    }

    pub fn market(&self, currency: &str, asset: &str) -> Option<&MarketConfig> {
        self.markets
            .iter()
            .find(|m| m.currency() == currency && m.asset() == asset)
    }
}

/// Venue and market the trader is bound to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVenue {
    pub slug: String,
    pub name: String,
    pub capabilities: ExchangeCapabilities,
    pub market: MarketConfig,
}

/// Known venues and the markets they support
#[derive(Debug, Clone)]
pub struct VenueRegistry {
    venues: Vec<VenueSettings>,
}

impl VenueRegistry {
    pub fn new(venues: Vec<VenueSettings>) -> Self {
        Self { venues }
    }

    /// Built-in venues plus configured ones; a configured venue replaces a
    /// built-in one with the same slug
    pub fn with_overrides(overrides: Vec<VenueSettings>) -> Self {
        let mut registry = Self::default();
        for venue in overrides {
            registry.venues.retain(|v| v.slug != venue.slug);
            registry.venues.push(venue);
        }
        registry
    }

    pub fn get(&self, slug: &str) -> Option<&VenueSettings> {
        self.venues.iter().find(|v| v.slug == slug)
    }

    pub fn venues(&self) -> &[VenueSettings] {
        &self.venues
    }

    /// Bind to a venue and market, failing if either is unknown
    pub fn resolve(&self, exchange: &str, currency: &str, asset: &str) -> Result<ResolvedVenue> {
        let venue = self
            .get(exchange)
            .ok_or_else(|| ExecutionError::UnknownExchange(exchange.to_string()))?;

        let market = venue
            .market(currency, asset)
            .ok_or_else(|| ExecutionError::UnsupportedMarket {
                exchange: venue.name.clone(),
                currency: currency.to_string(),
                asset: asset.to_string(),
            })?;

        Ok(ResolvedVenue {
            slug: venue.slug.clone(),
            name: venue.name.clone(),
            capabilities: venue.capabilities(),
            market: market.clone(),
        })
    }
}

impl Default for VenueRegistry {
    fn default() -> Self {
        let paper_market = |currency: &str| MarketConfig {
            pair: (currency.to_string(), "BTC".to_string()),
            minimal_order: MinimalOrder {
                unit: OrderUnit::Asset,
                amount: Decimal::new(1, 3), // 0.001
            },
        };

        Self::new(vec![VenueSettings {
            slug: "paper".to_string(),
            name: "Paper".to_string(),
            direct: false,
            infinity_order: false,
            markets: vec![paper_market("USD"), paper_market("EUR")],
        }])
    }
}

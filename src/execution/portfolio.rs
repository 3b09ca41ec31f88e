use rust_decimal::Decimal;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{ExecutionError, Result};
use crate::exchange::ExchangeAdapter;
use crate::models::{Fund, Portfolio, Ticker};

#[derive(Debug, Default)]
struct Snapshot {
    portfolio: Portfolio,
    fee: Option<Decimal>,
    ticker: Option<Ticker>,
}

/// Latest balances, fee and ticker of the trading account
///
/// Every refresh replaces the previous snapshot as a whole.
pub struct PortfolioStore {
    exchange: Arc<dyn ExchangeAdapter>,
    snapshot: RwLock<Snapshot>,
}

impl PortfolioStore {
    pub fn new(exchange: Arc<dyn ExchangeAdapter>) -> Self {
        Self {
            exchange,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch balances, then the fee
    ///
    /// Failures here mean the venue is misconfigured or unreachable; callers
    /// should treat them as fatal.
    pub async fn init(&self) -> Result<()> {
        tracing::debug!(exchange = %self.exchange.name(), "Getting balance & fee");

        self.refresh_portfolio().await?;
        let fee = self.exchange.get_fee().await?;
        self.write().fee = Some(fee);

        tracing::info!("Trading at {} ACTIVE", self.exchange.name());
        tracing::info!(
            "{} trading fee will be: {}%",
            self.exchange.name(),
            (fee * Decimal::ONE_HUNDRED).normalize()
        );
        self.log_portfolio();

        Ok(())
    }

    pub async fn refresh_portfolio(&self) -> Result<Portfolio> {
        let portfolio = self.exchange.get_portfolio().await?;
        self.write().portfolio = portfolio.clone();
        Ok(portfolio)
    }

    pub async fn refresh_ticker(&self) -> Result<Ticker> {
        let ticker = self.exchange.get_ticker().await?;
        self.write().ticker = Some(ticker);
        Ok(ticker)
    }

    pub fn portfolio(&self) -> Portfolio {
        self.read().portfolio.clone()
    }

    pub fn get_fund(&self, name: &str) -> Option<Fund> {
        self.read().portfolio.fund(name).cloned()
    }

    pub fn get_balance(&self, name: &str) -> Result<Decimal> {
        self.get_fund(name)
            .map(|f| f.amount)
            .ok_or_else(|| ExecutionError::UnknownFund(name.to_string()))
    }

    /// Fee fraction, known after `init`
    pub fn fee(&self) -> Option<Decimal> {
        self.read().fee
    }

    pub fn ticker(&self) -> Option<Ticker> {
        self.read().ticker
    }

    pub fn log_portfolio(&self) {
        let snapshot = self.read();
        tracing::info!("{} portfolio:", self.exchange.name());
        for fund in snapshot.portfolio.funds() {
            tracing::info!("\t{}: {:.12}", fund.name, fund.amount);
        }
    }
}

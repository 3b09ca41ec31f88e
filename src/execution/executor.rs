use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::feasibility::FeasibilityValidator;
use super::ladder::PriceLadder;
use super::order_book::SlotState;
use super::portfolio::PortfolioStore;
use super::sizing::{FixedSizing, OrderSizer};
use super::supervisor::{AttemptOutcome, AttemptPipeline, OrderSupervisor, SupervisionOutcome};
use crate::config::{AppConfig, ExecutionConfig, LadderConfig};
use crate::error::Result;
use crate::exchange::{ExchangeAdapter, ResolvedVenue};
use crate::models::{Order, Signal};

/// Entry point turning trade signals into supervised orders
///
/// Cheap to clone; all clones share the same portfolio snapshot and
/// order slots.
#[derive(Clone)]
pub struct TradeExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    exchange: Arc<dyn ExchangeAdapter>,
    venue: ResolvedVenue,
    store: PortfolioStore,
    ladder: PriceLadder,
    validator: FeasibilityValidator,
    sizer: Arc<dyn OrderSizer>,
    supervisor: OrderSupervisor,
    /// Present when sibling tiers must not interleave refresh and submit
    gate: Option<Mutex<()>>,
}

impl TradeExecutor {
    pub fn new(
        exchange: Arc<dyn ExchangeAdapter>,
        venue: ResolvedVenue,
        execution: ExecutionConfig,
        ladder: &LadderConfig,
        sizer: Arc<dyn OrderSizer>,
    ) -> Self {
        let gate = execution.serialize_attempts.then(|| Mutex::new(()));

        let inner = ExecutorInner {
            store: PortfolioStore::new(exchange.clone()),
            ladder: PriceLadder::new(ladder, venue.capabilities),
            validator: FeasibilityValidator::new(venue.market.clone()),
            supervisor: OrderSupervisor::new(exchange.clone(), execution),
            exchange,
            venue,
            sizer,
            gate,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Build with the fixed sizing policy from configuration
    pub fn from_config(
        exchange: Arc<dyn ExchangeAdapter>,
        venue: ResolvedVenue,
        config: &AppConfig,
    ) -> Self {
        let sizer = Arc::new(FixedSizing::from_config(&config.sizing, venue.capabilities));
        Self::new(
            exchange,
            venue,
            config.execution.clone(),
            &config.ladder,
            sizer,
        )
    }

    /// Load balances and fee; an error here should stop the process
    pub async fn init(&self) -> Result<()> {
        self.inner.store.init().await
    }

    /// Start executing a signal in its (side, tier) slot
    ///
    /// Returns `None` when that slot already supervises an order. The
    /// handle resolves once the signal is filled or given up.
    pub fn trade(&self, signal: Signal) -> Option<JoinHandle<SupervisionOutcome>> {
        if !self.inner.supervisor.book().claim(signal) {
            tracing::warn!(signal = %signal, "Order already in flight for this tier, ignoring signal");
            return None;
        }

        let slot = SlotGuard {
            inner: self.inner.clone(),
            signal,
        };
        let span = tracing::info_span!("trade", action = %signal);

        Some(tokio::spawn(
            async move {
                let inner = slot.inner.clone();
                let _slot = slot;
                inner.supervisor.supervise(inner.as_ref(), signal).await
            }
            .instrument(span),
        ))
    }

    /// Execute a textual command such as `BUY1`; unknown commands are ignored
    pub fn trade_command(&self, command: &str) -> Option<JoinHandle<SupervisionOutcome>> {
        match command.parse::<Signal>() {
            Ok(signal) => self.trade(signal),
            Err(_) => {
                tracing::debug!(command, "Ignoring unrecognised trade command");
                None
            }
        }
    }

    /// Forward a fill pushed by the venue so the check happens immediately
    pub fn notify_fill(&self, exchange_order_id: &str) -> bool {
        self.inner.supervisor.notify_fill(exchange_order_id)
    }

    pub fn store(&self) -> &PortfolioStore {
        &self.inner.store
    }

    pub fn venue(&self) -> &ResolvedVenue {
        &self.inner.venue
    }

    pub fn slot_state(&self, signal: &Signal) -> SlotState {
        self.inner.supervisor.book().state(signal)
    }

    /// Every order submitted so far, oldest first
    pub fn orders(&self) -> Vec<Order> {
        self.inner.supervisor.book().orders().to_vec()
    }
}

/// Frees a claimed slot however the supervision task ends
///
/// Dropped on return, on panic, and when the task is aborted before or
/// during supervision.
struct SlotGuard {
    inner: Arc<ExecutorInner>,
    signal: Signal,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.supervisor.book().release(&self.signal);
    }
}

#[async_trait]
impl AttemptPipeline for ExecutorInner {
    async fn run_attempt(&self, signal: Signal, attempt: u32) -> AttemptOutcome {
        let _turn = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        tracing::debug!(signal = %signal, attempt, "Starting attempt");

        // Ticker first, then balances: feasibility needs both fresh
        let ticker = match self.store.refresh_ticker().await {
            Ok(ticker) => ticker,
            Err(error) => return AttemptOutcome::Failed(error),
        };
        let portfolio = match self.store.refresh_portfolio().await {
            Ok(portfolio) => portfolio,
            Err(error) => return AttemptOutcome::Failed(error),
        };

        let amount = self.sizer.amount(&signal, &portfolio, &ticker);
        let price = self.ladder.price(&ticker, &signal);
        let reference_price = price.limit().unwrap_or(ticker.ask);

        if let Err(rejection) =
            self.validator
                .check(signal.side, amount, reference_price, &portfolio)
        {
            tracing::info!(
                signal = %signal,
                attempt,
                exchange = %self.exchange.name(),
                "Attempt rejected: {}",
                rejection
            );
            return AttemptOutcome::Rejected(rejection);
        }

        tracing::info!(
            signal = %signal,
            attempt,
            %price,
            "Attempting to {} {} {} at {}",
            signal.side,
            amount,
            self.venue.market.asset(),
            self.exchange.name()
        );

        match self.supervisor.submit(signal, amount, price, attempt).await {
            Ok(order) => AttemptOutcome::Submitted(order),
            Err(error) => AttemptOutcome::Failed(error),
        }
    }
}

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{AdapterError, ExchangeAdapter, FillState};
use crate::models::{Fund, OrderPrice, Portfolio, Side, Ticker};

/// Configuration of the simulated venue
#[derive(Debug, Clone, Deserialize)]
pub struct PaperSettings {
    #[serde(default = "default_name")]
    pub name: String,
    pub currency: String,
    pub asset: String,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    /// Opening balances
    #[serde(default)]
    pub balances: Vec<Fund>,
    /// Chance that a fill check finds an open order fully filled
    #[serde(default = "default_fill_probability")]
    pub fill_probability: f64,
}

fn default_name() -> String {
    "Paper".to_string()
}

fn default_fill_probability() -> f64 {
    0.5
}

/// Adapter operations, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperOp {
    Portfolio,
    Fee,
    Ticker,
    Buy,
    Sell,
    Check,
    Cancel,
}

/// One call received by the paper venue
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    GetPortfolio,
    GetFee,
    GetTicker,
    Buy { amount: Decimal, price: OrderPrice },
    Sell { amount: Decimal, price: OrderPrice },
    CheckOrder(String),
    CancelOrder(String),
}

#[derive(Debug, Clone)]
struct PaperOrder {
    side: Side,
    amount: Decimal,
    price: OrderPrice,
    filled: bool,
    cancelled: bool,
}

struct PaperState {
    balances: HashMap<String, Decimal>,
    ticker: Ticker,
    fee: Decimal,
    orders: HashMap<String, PaperOrder>,
    fill_script: VecDeque<FillState>,
    failures: HashMap<PaperOp, u32>,
    calls: Vec<AdapterCall>,
    next_order: u64,
}

/// In-memory venue for dry runs
///
/// Orders fill from a scripted sequence when one is queued, otherwise
/// randomly with the configured probability. Filled orders settle against
/// the simulated balances.
pub struct PaperExchange {
    settings: PaperSettings,
    state: Mutex<PaperState>,
}

impl PaperExchange {
    pub fn new(settings: PaperSettings) -> Self {
        let state = PaperState {
            balances: settings
                .balances
                .iter()
                .map(|f| (f.name.clone(), f.amount))
                .collect(),
            ticker: Ticker {
                bid: settings.bid,
                ask: settings.ask,
            },
            fee: settings.fee,
            orders: HashMap::new(),
            fill_script: VecDeque::new(),
            failures: HashMap::new(),
            calls: Vec::new(),
            next_order: 1,
        };

        Self {
            settings,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the results of upcoming fill checks
    pub fn script_fills(&self, fills: impl IntoIterator<Item = FillState>) {
        self.state().fill_script.extend(fills);
    }

    /// Make the next `times` calls of `op` fail with a connectivity error
    pub fn fail_next(&self, op: PaperOp, times: u32) {
        *self.state().failures.entry(op).or_insert(0) += times;
    }

    pub fn set_ticker(&self, ticker: Ticker) {
        self.state().ticker = ticker;
    }

    pub fn set_balance(&self, name: &str, amount: Decimal) {
        self.state().balances.insert(name.to_string(), amount);
    }

    pub fn balance(&self, name: &str) -> Option<Decimal> {
        self.state().balances.get(name).copied()
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.state().calls.clone()
    }

    /// Buy and sell submissions received so far
    pub fn submissions(&self) -> Vec<AdapterCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, AdapterCall::Buy { .. } | AdapterCall::Sell { .. }))
            .collect()
    }

    pub fn cancellations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                AdapterCall::CancelOrder(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: AdapterCall, op: PaperOp) -> Result<(), AdapterError> {
        let mut state = self.state();
        state.calls.push(call);

        if let Some(remaining) = state.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AdapterError::Connectivity(format!(
                    "{} simulated outage ({:?})",
                    self.settings.name, op
                )));
            }
        }

        Ok(())
    }

    fn place(&self, side: Side, amount: Decimal, price: OrderPrice) -> String {
        let mut state = self.state();
        let id = format!("paper-{}", state.next_order);
        state.next_order += 1;
        state.orders.insert(
            id.clone(),
            PaperOrder {
                side,
                amount,
                price,
                filled: false,
                cancelled: false,
            },
        );

        tracing::debug!(order_id = %id, side = %side, %amount, %price, "Paper order placed");
        id
    }

    fn settle(state: &mut PaperState, settings: &PaperSettings, order: &PaperOrder) {
        let price = order.price.limit().unwrap_or(match order.side {
            Side::Buy => state.ticker.ask,
            Side::Sell => state.ticker.bid,
        });
        let value = order.amount * price;
        let fee = state.fee;

        let mut adjust = |name: &str, delta: Decimal| {
            *state.balances.entry(name.to_string()).or_insert(Decimal::ZERO) += delta;
        };

        match order.side {
            Side::Buy => {
                adjust(&settings.currency, -value);
                adjust(&settings.asset, order.amount - order.amount * fee);
            }
            Side::Sell => {
                adjust(&settings.asset, -order.amount);
                adjust(&settings.currency, value - value * fee);
            }
        }
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchange {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn get_portfolio(&self) -> Result<Portfolio, AdapterError> {
        self.record(AdapterCall::GetPortfolio, PaperOp::Portfolio)?;
        let state = self.state();
        Ok(Portfolio::new(state.balances.iter().map(|(name, amount)| {
            Fund {
                name: name.clone(),
                amount: *amount,
            }
        })))
    }

    async fn get_fee(&self) -> Result<Decimal, AdapterError> {
        self.record(AdapterCall::GetFee, PaperOp::Fee)?;
        Ok(self.state().fee)
    }

    async fn get_ticker(&self) -> Result<Ticker, AdapterError> {
        self.record(AdapterCall::GetTicker, PaperOp::Ticker)?;
        Ok(self.state().ticker)
    }

    async fn buy(&self, amount: Decimal, price: OrderPrice) -> Result<String, AdapterError> {
        self.record(AdapterCall::Buy { amount, price }, PaperOp::Buy)?;
        Ok(self.place(Side::Buy, amount, price))
    }

    async fn sell(&self, amount: Decimal, price: OrderPrice) -> Result<String, AdapterError> {
        self.record(AdapterCall::Sell { amount, price }, PaperOp::Sell)?;
        Ok(self.place(Side::Sell, amount, price))
    }

    async fn check_order(&self, order_id: &str) -> Result<FillState, AdapterError> {
        self.record(AdapterCall::CheckOrder(order_id.to_string()), PaperOp::Check)?;

        let mut state = self.state();
        let order = match state.orders.get(order_id) {
            Some(order) if !order.cancelled => order.clone(),
            _ => return Err(AdapterError::UnknownOrder(order_id.to_string())),
        };
        if order.filled {
            return Ok(FillState::Filled);
        }

        let fill = match state.fill_script.pop_front() {
            Some(fill) => fill,
            None => {
                let probability = self.settings.fill_probability.clamp(0.0, 1.0);
                if rand::thread_rng().gen_bool(probability) {
                    FillState::Filled
                } else {
                    FillState::Unfilled
                }
            }
        };

        if fill.is_fully_filled() {
            Self::settle(&mut state, &self.settings, &order);
            if let Some(stored) = state.orders.get_mut(order_id) {
                stored.filled = true;
            }
        }

        Ok(fill)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), AdapterError> {
        self.record(AdapterCall::CancelOrder(order_id.to_string()), PaperOp::Cancel)?;

        match self.state().orders.get_mut(order_id) {
            Some(order) if !order.filled => {
                order.cancelled = true;
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(AdapterError::UnknownOrder(order_id.to_string())),
        }
    }
}

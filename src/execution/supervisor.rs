use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::time::sleep;
use uuid::Uuid;

use super::feasibility::Rejection;
use super::order_book::{OrderBook, SlotState};
use crate::config::ExecutionConfig;
use crate::error::{ExecutionError, Result};
use crate::exchange::{AdapterError, ExchangeAdapter, FillState};
use crate::models::{Order, OrderPrice, OrderStatus, Side, Signal};

/// Result of one refresh → price → validate → submit pass
#[derive(Debug)]
pub enum AttemptOutcome {
    Submitted(Order),
    Rejected(Rejection),
    Failed(ExecutionError),
}

/// Terminal result of supervising a signal
#[derive(Debug)]
pub enum SupervisionOutcome {
    Filled {
        order: Order,
    },
    /// Feasibility check stopped the attempt; nothing was submitted
    Rejected {
        signal: Signal,
        attempt: u32,
        rejection: Rejection,
    },
    /// Refresh or submission failed; no retry is scheduled
    SubmissionFailed {
        signal: Signal,
        attempt: u32,
        error: ExecutionError,
    },
    /// Fill check or cancel could not reach the venue
    Abandoned {
        signal: Signal,
        attempt: u32,
        error: ExecutionError,
    },
    RetryLimitReached {
        signal: Signal,
        attempts: u32,
    },
}

impl SupervisionOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, SupervisionOutcome::Filled { .. })
    }
}

/// Runs one attempt for a signal; the supervisor calls it again on retry
#[async_trait]
pub trait AttemptPipeline: Send + Sync {
    async fn run_attempt(&self, signal: Signal, attempt: u32) -> AttemptOutcome;
}

/// Owns submitted orders until they are filled or given up
///
/// Per signal: submit, wait for the fill-check window, check. A full fill
/// ends supervision; anything less cancels the order, waits briefly and
/// runs the pipeline again with the same signal.
pub struct OrderSupervisor {
    exchange: Arc<dyn ExchangeAdapter>,
    config: ExecutionConfig,
    book: Mutex<OrderBook>,
    fill_signals: Mutex<HashMap<String, Arc<Notify>>>,
}

impl OrderSupervisor {
    pub fn new(exchange: Arc<dyn ExchangeAdapter>, config: ExecutionConfig) -> Self {
        Self {
            exchange,
            config,
            book: Mutex::new(OrderBook::new()),
            fill_signals: Mutex::new(HashMap::new()),
        }
    }

    pub fn book(&self) -> MutexGuard<'_, OrderBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fill_signals(&self) -> MutexGuard<'_, HashMap<String, Arc<Notify>>> {
        self.fill_signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Place the order on the venue and start tracking it
    pub async fn submit(
        &self,
        signal: Signal,
        amount: Decimal,
        price: OrderPrice,
        attempt: u32,
    ) -> Result<Order> {
        let exchange_order_id = match signal.side {
            Side::Buy => self.exchange.buy(amount, price).await?,
            Side::Sell => self.exchange.sell(amount, price).await?,
        };

        self.fill_signals()
            .insert(exchange_order_id.clone(), Arc::new(Notify::new()));

        let order = Order {
            id: Uuid::new_v4(),
            exchange_order_id,
            signal,
            price,
            amount,
            status: OrderStatus::Pending,
            attempt,
            created_at: Utc::now(),
        };

        {
            let mut book = self.book();
            book.record(order.clone());
            book.transition(
                signal,
                SlotState::Pending {
                    order_id: order.id,
                    attempt,
                },
            );
        }

        tracing::info!(
            signal = %signal,
            attempt,
            order_id = %order.exchange_order_id,
            %price,
            %amount,
            "Order placed"
        );

        Ok(order)
    }

    /// Cut the fill-check wait short for an order known to be filled
    ///
    /// Returns false if no pending order has this venue id.
    pub fn notify_fill(&self, exchange_order_id: &str) -> bool {
        match self.fill_signals().get(exchange_order_id) {
            Some(notify) => {
                notify.notify_one();
                true
            }
            None => false,
        }
    }

    /// Supervise `signal` until it fills or has to be given up
    pub async fn supervise<P>(&self, pipeline: &P, signal: Signal) -> SupervisionOutcome
    where
        P: AttemptPipeline + ?Sized,
    {
        let mut attempt = 1;

        loop {
            self.book()
                .transition(signal, SlotState::Submitting { attempt });

            let order = match pipeline.run_attempt(signal, attempt).await {
                AttemptOutcome::Submitted(order) => order,
                AttemptOutcome::Rejected(rejection) => {
                    return SupervisionOutcome::Rejected {
                        signal,
                        attempt,
                        rejection,
                    };
                }
                AttemptOutcome::Failed(error) => {
                    tracing::error!(signal = %signal, attempt, "Attempt failed: {}", error);
                    return SupervisionOutcome::SubmissionFailed {
                        signal,
                        attempt,
                        error,
                    };
                }
            };

            let fill = match self.await_fill(&order).await {
                Ok(fill) => fill,
                Err(error) => {
                    tracing::error!(
                        signal = %signal,
                        order_id = %order.exchange_order_id,
                        "Giving up on order: {}",
                        error
                    );
                    return SupervisionOutcome::Abandoned {
                        signal,
                        attempt,
                        error,
                    };
                }
            };

            if fill.is_fully_filled() {
                let filled = self
                    .book()
                    .set_status(order.id, OrderStatus::FilledFully)
                    .cloned()
                    .unwrap_or(order);
                tracing::info!(signal = %signal, attempt, "{} was successful", signal);
                return SupervisionOutcome::Filled { order: filled };
            }

            {
                let mut book = self.book();
                if fill == FillState::PartiallyFilled {
                    book.set_status(order.id, OrderStatus::FilledPartially);
                }
                book.transition(
                    signal,
                    SlotState::Retrying {
                        order_id: order.id,
                        attempt,
                    },
                );
            }

            tracing::info!(
                signal = %signal,
                attempt,
                order_id = %order.exchange_order_id,
                "{} order was not (fully) filled, cancelling and creating new order",
                signal
            );

            if let Err(error) = self.cancel(&order).await {
                tracing::error!(
                    signal = %signal,
                    order_id = %order.exchange_order_id,
                    "Order may still be live, not resubmitting: {}",
                    error
                );
                return SupervisionOutcome::Abandoned {
                    signal,
                    attempt,
                    error,
                };
            }
            self.book().set_status(order.id, OrderStatus::Cancelled);

            if let Some(max_retries) = self.config.max_retries {
                if attempt > max_retries {
                    tracing::warn!(signal = %signal, attempts = attempt, "Retry limit reached");
                    return SupervisionOutcome::RetryLimitReached {
                        signal,
                        attempts: attempt,
                    };
                }
            }

            // cancel -> submit within the same venue tick can be rejected
            sleep(self.config.retry_delay()).await;
            attempt += 1;
        }
    }

    async fn await_fill(&self, order: &Order) -> Result<FillState> {
        let id = order.exchange_order_id.as_str();
        let notify = self.fill_signals().get(id).cloned();

        match notify {
            Some(notify) => {
                tokio::select! {
                    _ = sleep(self.config.fill_check_delay()) => {}
                    _ = notify.notified() => {
                        tracing::debug!(order_id = %id, "Fill reported before check window elapsed");
                    }
                }
            }
            None => sleep(self.config.fill_check_delay()).await,
        }
        self.fill_signals().remove(id);

        self.with_retries("check_order", move || self.exchange.check_order(id))
            .await
    }

    async fn cancel(&self, order: &Order) -> Result<()> {
        let id = order.exchange_order_id.as_str();
        match self
            .with_retries("cancel_order", move || self.exchange.cancel_order(id))
            .await
        {
            Ok(()) => Ok(()),
            Err(ExecutionError::Adapter(error)) => {
                // The venue answered: the order is no longer open
                tracing::warn!(order_id = %id, "Cancel not acknowledged: {}", error);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Retry connectivity failures a bounded number of times
    async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, AdapterError>>,
    {
        let limit = self.config.adapter_retry_limit.max(1);
        let mut attempts = 1;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(AdapterError::Connectivity(reason)) if attempts < limit => {
                    tracing::warn!(operation, attempts, "Exchange unavailable, retrying: {}", reason);
                    sleep(self.config.adapter_retry_delay()).await;
                    attempts += 1;
                }
                Err(source @ AdapterError::Connectivity(_)) => {
                    return Err(ExecutionError::AdapterUnavailable {
                        operation,
                        attempts,
                        source,
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }
    }
}

use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Order, OrderStatus, Signal};

/// Where a (side, tier) slot is in its order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Submitting { attempt: u32 },
    Pending { order_id: Uuid, attempt: u32 },
    Retrying { order_id: Uuid, attempt: u32 },
}

impl SlotState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SlotState::Idle)
    }
}

/// One slot per signal plus the history of every order placed
#[derive(Debug, Default)]
pub struct OrderBook {
    slots: HashMap<Signal, SlotState>,
    history: Vec<Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, signal: &Signal) -> SlotState {
        self.slots.get(signal).copied().unwrap_or(SlotState::Idle)
    }

    /// Take an idle slot for a new signal; false if it is already busy
    pub fn claim(&mut self, signal: Signal) -> bool {
        if !self.state(&signal).is_idle() {
            return false;
        }
        self.slots.insert(signal, SlotState::Submitting { attempt: 1 });
        true
    }

    pub fn transition(&mut self, signal: Signal, state: SlotState) {
        self.slots.insert(signal, state);
    }

    pub fn release(&mut self, signal: &Signal) {
        self.slots.remove(signal);
    }

    /// Signals with a live state machine
    pub fn active(&self) -> Vec<Signal> {
        self.slots
            .iter()
            .filter(|(_, state)| !state.is_idle())
            .map(|(signal, _)| *signal)
            .collect()
    }

    pub fn record(&mut self, order: Order) {
        self.history.push(order);
    }

    pub fn set_status(&mut self, order_id: Uuid, status: OrderStatus) -> Option<&Order> {
        let order = self.history.iter_mut().find(|o| o.id == order_id)?;
        order.status = status;
        Some(order)
    }

    pub fn get(&self, order_id: Uuid) -> Option<&Order> {
        self.history.iter().find(|o| o.id == order_id)
    }

    pub fn orders(&self) -> &[Order] {
        &self.history
    }

    pub fn orders_for(&self, signal: &Signal) -> Vec<&Order> {
        self.history.iter().filter(|o| o.signal == *signal).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderPrice, Tier};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order(signal: Signal, attempt: u32) -> Order {
        Order {
            id: Uuid::new_v4(),
            exchange_order_id: format!("x-{}", attempt),
            signal,
            price: OrderPrice::Limit(dec!(101)),
            amount: dec!(0.01),
            status: OrderStatus::Pending,
            attempt,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_claim_is_exclusive_per_slot() {
        let mut book = OrderBook::new();
        let buy1 = Signal::buy(Tier::FIRST);
        let buy2 = Signal::buy(Tier::SECOND);

        assert!(book.claim(buy1));
        assert!(!book.claim(buy1));
        assert!(book.claim(buy2));
        assert_eq!(book.state(&buy1), SlotState::Submitting { attempt: 1 });
        assert_eq!(book.active().len(), 2);

        book.release(&buy1);
        assert!(book.state(&buy1).is_idle());
        assert!(book.claim(buy1));
    }

    #[test]
    fn test_retry_appends_new_record() {
        let mut book = OrderBook::new();
        let signal = Signal::sell(Tier::THIRD);

        let first = order(signal, 1);
        let first_id = first.id;
        book.record(first);
        book.set_status(first_id, OrderStatus::Cancelled);
        book.record(order(signal, 2));

        let orders = book.orders_for(&signal);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
        assert_eq!(orders[1].status, OrderStatus::Pending);
        assert_eq!(orders[1].attempt, 2);
        assert!(book.orders_for(&Signal::buy(Tier::THIRD)).is_empty());
    }

    #[test]
    fn test_set_status_unknown_order() {
        let mut book = OrderBook::new();
        assert!(book.set_status(Uuid::new_v4(), OrderStatus::FilledFully).is_none());
    }
}

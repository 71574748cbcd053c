// 6.0: single slot memo in front of the pool's fair price and best price queries.
// within one matching pass the position only moves one way, so the last answer is
// the only one worth keeping. each write replaces the slot.
//
// Cell makes Pool !Sync: a pool and its cache belong to one execution thread.

use crate::pool::PoolStatus;
use crate::types::{Price, Side};
use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq)]
struct BestEntry {
    position: i64,
    status: PoolStatus,
    best: Option<(Price, u64)>,
}

#[derive(Debug, Clone, Default)]
pub struct PoolCache {
    fair_price: Cell<Option<(i64, Price)>>,
    best_bid: Cell<Option<BestEntry>>,
    best_ask: Cell<Option<BestEntry>>,
}

impl PoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fair_price(&self, position: i64) -> Option<Price> {
        match self.fair_price.get() {
            Some((pos, price)) if pos == position => Some(price),
            _ => None,
        }
    }

    pub fn set_fair_price(&self, position: i64, price: Price) {
        self.fair_price.set(Some((position, price)));
    }

    /// `Some(answer)` on a hit, where the answer itself may be "no price".
    pub fn best_price(&self, side: Side, position: i64, status: PoolStatus) -> Option<Option<(Price, u64)>> {
        let slot = match side {
            Side::Buy => &self.best_bid,
            Side::Sell => &self.best_ask,
        };
        match slot.get() {
            Some(entry) if entry.position == position && entry.status == status => Some(entry.best),
            _ => None,
        }
    }

    pub fn set_best_price(&self, side: Side, position: i64, status: PoolStatus, best: Option<(Price, u64)>) {
        let entry = Some(BestEntry { position, status, best });
        match side {
            Side::Buy => self.best_bid.set(entry),
            Side::Sell => self.best_ask.set(entry),
        }
    }

    pub fn clear(&self) {
        self.fair_price.set(None);
        self.best_bid.set(None);
        self.best_ask.set(None);
    }
}

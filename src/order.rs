//! Orders exchanged with the matching engine.
//!
//! Incoming (aggressive) orders arrive from the order book; the AMM answers with
//! generated off-book orders priced from its curve. Sizes are whole lots.

use crate::types::{MarketId, OrderId, PartyId, Price, Side, Timestamp};
use serde::{Deserialize, Serialize};

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Limit order with specified price.
    Limit,
    /// Market order. Executes at whatever price is available.
    Market,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// generated shape orders carry no id
    pub id: Option<OrderId>,
    pub market_id: MarketId,
    pub party: PartyId,
    pub side: Side,
    pub order_type: OrderType,
    /// asset precision
    pub price: Price,
    /// market precision
    pub original_price: Price,
    pub size: u64,
    pub remaining: u64,
    pub created_at: Timestamp,
}

impl Order {
    pub fn new_limit(
        id: OrderId,
        party: PartyId,
        market_id: MarketId,
        side: Side,
        size: u64,
        price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Some(id),
            market_id,
            party,
            side,
            order_type: OrderType::Limit,
            price,
            original_price: price,
            size,
            remaining: size,
            created_at: timestamp,
        }
    }

    pub fn new_market(id: OrderId, party: PartyId, market_id: MarketId, side: Side, size: u64, timestamp: Timestamp) -> Self {
        Self {
            id: Some(id),
            market_id,
            party,
            side,
            order_type: OrderType::Market,
            price: Price::zero(),
            original_price: Price::zero(),
            size,
            remaining: size,
            created_at: timestamp,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.remaining == 0
    }

    pub fn is_market(&self) -> bool {
        self.order_type == OrderType::Market
    }

    pub fn fill(&mut self, size: u64) {
        debug_assert!(size <= self.remaining, "cannot fill more than remaining");
        self.remaining = self.remaining.saturating_sub(size);
    }
}

// 11.0: positions of parties in the market, as the AMM engine sees them.
// the engine only reads sizes; the book also keeps an average entry so collateral
// release can tell an open position from a closed one.
// 11.1 has increase/reduce/flip logic for a fill.

use crate::types::{PartyId, Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPosition {
    pub party: PartyId,
    /// signed lots, positive = long
    pub size: i64,
    pub average_entry: Price,
}

impl MarketPosition {
    pub fn flat(party: PartyId) -> Self {
        Self {
            party,
            size: 0,
            average_entry: Price::zero(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    // 11.1: same direction averages the entry, opposite direction keeps it until
    // the position flips, then the fill price becomes the new entry
    pub fn apply_fill(&mut self, side: Side, size: u64, price: Price) {
        let delta = side.signed(size);
        let new_size = self.size.saturating_add(delta);

        let increasing = self.size == 0 || (self.size > 0) == (delta > 0);
        if increasing {
            let old = Decimal::from(self.size.unsigned_abs());
            let added = Decimal::from(size);
            let total = old + added;
            if !total.is_zero() {
                self.average_entry = Price::floor((old * self.average_entry.value() + added * price.value()) / total);
            }
        } else if new_size == 0 {
            self.average_entry = Price::zero();
        } else if (new_size > 0) != (self.size > 0) {
            self.average_entry = price;
        }

        self.size = new_size;
    }
}

/// Read access to positions, as held by the position engine.
pub trait PositionProvider {
    fn positions_by_party(&self, party: &PartyId) -> Vec<MarketPosition>;
}

/// In-memory position engine for one market.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: HashMap<PartyId, MarketPosition>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_fill(&mut self, party: &PartyId, side: Side, size: u64, price: Price) {
        self.positions
            .entry(party.clone())
            .or_insert_with(|| MarketPosition::flat(party.clone()))
            .apply_fill(side, size, price);
    }

    pub fn set_size(&mut self, party: &PartyId, size: i64, average_entry: Price) {
        self.positions.insert(
            party.clone(),
            MarketPosition {
                party: party.clone(),
                size,
                average_entry,
            },
        );
    }

    /// Drops a closed out party, returning what it held.
    pub fn close_out(&mut self, party: &PartyId) -> Option<MarketPosition> {
        self.positions.remove(party)
    }

    pub fn size_of(&self, party: &PartyId) -> i64 {
        self.positions.get(party).map_or(0, |p| p.size)
    }
}

impl PositionProvider for PositionBook {
    fn positions_by_party(&self, party: &PartyId) -> Vec<MarketPosition> {
        self.positions.get(party).cloned().into_iter().collect()
    }
}

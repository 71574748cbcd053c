// 8.0 engine/core.rs: main engine. holds every pool of one market, keyed by owner,
// in the order they were added.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::collateral::Collateral;
use crate::events::{AmmPoolEvent, Event, EventId, EventPayload, StatusReason};
use crate::idgen::IdGenerator;
use crate::market::MarketContext;
use crate::pool::{Pool, PoolSnapshot};
use crate::position::{MarketPosition, PositionProvider};
use crate::sqrt::Sqrter;
use crate::types::{PartyId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine<C: Collateral, P: PositionProvider> {
    pub(super) config: EngineConfig,
    pub(super) market: MarketContext,
    pub(super) collateral: C,
    pub(super) positions: P,
    /// insertion order; every iteration over pools goes through this
    pub(super) pools: Vec<Pool>,
    /// sub-account -> owner
    pub(super) amm_parties: HashMap<PartyId, PartyId>,
    pub(super) sqrt: Rc<Sqrter>,
    pub(super) idgen: IdGenerator,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

/// Engine state as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// (sub-account, owner), sorted by sub-account
    pub amm_parties: Vec<(String, String)>,
    pub pools: Vec<PoolSnapshot>,
}

impl<C: Collateral, P: PositionProvider> Engine<C, P> {
    pub fn new(config: EngineConfig, market: MarketContext, collateral: C, positions: P) -> Self {
        let idgen = IdGenerator::for_block("", &market.id);
        Self {
            config,
            market,
            collateral,
            positions,
            pools: Vec::new(),
            amm_parties: HashMap::new(),
            sqrt: Rc::new(Sqrter::new()),
            idgen,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn market(&self) -> &MarketContext {
        &self.market
    }

    pub fn collateral(&self) -> &C {
        &self.collateral
    }

    pub fn collateral_mut(&mut self) -> &mut C {
        &mut self.collateral
    }

    pub fn positions(&self) -> &P {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut P {
        &mut self.positions
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn pool(&self, owner: &PartyId) -> Option<&Pool> {
        self.pools.iter().find(|p| p.owner() == owner)
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    /// Sub-account of the pool `owner` runs.
    pub fn get_amm_party(&self, owner: &PartyId) -> Result<PartyId, EngineError> {
        self.pool(owner)
            .map(|p| p.sub_account().clone())
            .ok_or(EngineError::NoPoolMatchingParty)
    }

    pub fn is_amm_party(&self, party: &PartyId) -> bool {
        self.amm_parties.contains_key(party)
    }

    /// Every registered sub-account, sorted.
    pub fn sub_accounts(&self) -> Vec<PartyId> {
        let mut subs: Vec<PartyId> = self.amm_parties.keys().cloned().collect();
        subs.sort();
        subs
    }

    /// Position the sub-account holds right now, outside any matching pass.
    pub fn position_of(&self, sub_account: &PartyId) -> i64 {
        self.market_position(sub_account).map_or(0, |p| p.size)
    }

    pub(super) fn market_position(&self, sub_account: &PartyId) -> Option<MarketPosition> {
        self.positions.positions_by_party(sub_account).into_iter().next()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub(super) fn add(&mut self, pool: Pool) {
        self.amm_parties.insert(pool.sub_account().clone(), pool.owner().clone());
        self.pools.push(pool);
    }

    /// Takes the pool out of the engine and publishes its final state.
    pub(super) fn remove(&mut self, owner: &PartyId, reason: StatusReason) -> Option<Pool> {
        let idx = self.pools.iter().position(|p| p.owner() == owner)?;
        let pool = self.pools.remove(idx);
        self.amm_parties.remove(pool.sub_account());
        self.emit_pool_event(&pool, reason);
        debug!(owner = %owner, pool = %pool.id(), status = ?pool.status(), "pool removed");
        Some(pool)
    }

    pub(super) fn pool_mut(&mut self, owner: &PartyId) -> Option<&mut Pool> {
        self.pools.iter_mut().find(|p| p.owner() == owner)
    }

    pub(super) fn emit_pool_event(&mut self, pool: &Pool, reason: StatusReason) {
        self.emit_event(EventPayload::AmmPool(AmmPoolEvent::from_pool(pool, reason)));
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }

    pub fn to_snapshot(&self) -> EngineSnapshot {
        let mut amm_parties: Vec<(String, String)> = self
            .amm_parties
            .iter()
            .map(|(sub, owner)| (sub.to_string(), owner.to_string()))
            .collect();
        amm_parties.sort();

        EngineSnapshot {
            amm_parties,
            pools: self.pools.iter().map(Pool::to_snapshot).collect(),
        }
    }

    pub fn from_snapshot(
        config: EngineConfig,
        market: MarketContext,
        collateral: C,
        positions: P,
        snapshot: &EngineSnapshot,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(config, market, collateral, positions);
        for state in &snapshot.pools {
            let pool = Pool::from_snapshot(state, Rc::clone(&engine.sqrt), engine.config.pool_limits())?;
            engine.add(pool);
        }
        for (sub, owner) in &snapshot.amm_parties {
            engine
                .amm_parties
                .insert(PartyId::new(sub.as_str()), PartyId::new(owner.as_str()));
        }
        Ok(engine)
    }
}

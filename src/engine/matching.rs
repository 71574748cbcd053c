// 8.4 engine/matching.rs: what the matching engine asks the AMMs while an incoming
// order is matched.
// 8.4.1: a MatchingPass tracks each pool's position as generated orders fill; the
//        live position service is only consulted for pools it has not touched.

use super::core::Engine;
use super::results::BestPrices;
use crate::collateral::Collateral;
use crate::order::Order;
use crate::pool::Pool;
use crate::position::PositionProvider;
use crate::shape::ShapeResult;
use crate::types::{PartyId, Price, Side};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

impl<C: Collateral, P: PositionProvider> Engine<C, P> {
    /// Best bid and ask over every pool at their live positions.
    pub fn best_prices_and_volumes(&self) -> BestPrices {
        best_across(&self.pools, |pool| self.position_of(pool.sub_account()))
    }

    /// Volume all pools would trade against an order on `side` at `price`.
    pub fn volume_at_price(&self, price: Price, side: Side) -> u64 {
        self.pools
            .iter()
            .filter_map(|pool| {
                let pos = self.position_of(pool.sub_account());
                let best = pool.best_price(pos, side.opposite())?;
                let crossed = match side {
                    Side::Buy => best <= price,
                    Side::Sell => best >= price,
                };
                crossed.then(|| pool.tradable_volume_for_price(pos, side, price))
            })
            .fold(0u64, u64::saturating_add)
    }

    /// Shapes of every pool, or only of the pool behind `sub_account`. An unknown
    /// sub-account yields nothing.
    pub fn orderbook_shape(
        &self,
        from: Option<Price>,
        to: Option<Price>,
        sub_account: Option<&PartyId>,
    ) -> Vec<ShapeResult> {
        let shape = |pool: &Pool| {
            let pos = self.position_of(pool.sub_account());
            pool.orderbook_shape(pos, from, to, self.current_time)
        };

        match sub_account {
            None => self.pools.iter().map(shape).collect(),
            Some(sub) => self
                .amm_parties
                .get(sub)
                .and_then(|owner| self.pool(owner))
                .map(shape)
                .into_iter()
                .collect(),
        }
    }

    /// Starts matching one incoming order. Positions the pass records die with it.
    pub fn begin_matching(&mut self) -> MatchingPass<'_, C, P> {
        MatchingPass {
            engine: self,
            ephemeral: HashMap::new(),
        }
    }
}

/// Scratch state for matching a single incoming order against the pools.
pub struct MatchingPass<'e, C: Collateral, P: PositionProvider> {
    engine: &'e mut Engine<C, P>,
    /// sub-account -> position including fills generated in this pass
    ephemeral: HashMap<PartyId, i64>,
}

impl<'e, C: Collateral, P: PositionProvider> MatchingPass<'e, C, P> {
    pub fn position(&self, sub_account: &PartyId) -> i64 {
        self.ephemeral
            .get(sub_account)
            .copied()
            .unwrap_or_else(|| self.engine.position_of(sub_account))
    }

    pub fn best_prices_and_volumes(&self) -> BestPrices {
        best_across(&self.engine.pools, |pool| self.position(pool.sub_account()))
    }

    /// Generates the pool orders that trade with `agg` strictly inside the price
    /// range between `inner` and `outer`. For a buy `inner < outer`, for a sell the
    /// other way round. `None` leaves that end open.
    pub fn submit_order(&mut self, agg: &Order, inner: Option<Price>, outer: Option<Price>) -> Vec<Order> {
        if self.engine.pools.is_empty() {
            return Vec::new();
        }
        debug!(party = %agg.party, side = ?agg.side, remaining = agg.remaining, pools = self.engine.pools.len(), "looking for amm match");

        let (active, levels) = self.partition(agg, inner, outer);

        let mut remaining = agg.remaining;
        let mut orders = Vec::new();
        for window in levels.windows(2) {
            orders.extend(self.submit_level(&active, agg, &mut remaining, window[1]));
            if remaining == 0 {
                break;
            }
        }
        orders
    }

    // pools that can take part, and the price levels (in trading order) at which
    // any of their curves start or end
    fn partition(&self, agg: &Order, mut inner: Option<Price>, mut outer: Option<Price>) -> (Vec<usize>, Vec<Price>) {
        let one_tick = self.engine.market.one_tick();

        if !agg.is_market() {
            outer = Some(match outer {
                Some(o) if agg.side == Side::Buy && agg.price >= o => o,
                Some(o) if agg.side == Side::Sell && agg.price <= o => o,
                _ => agg.price,
            });
        }

        // open inner end: start a little inside the pools' best quote
        if inner.is_none() {
            let best = self.best_prices_and_volumes();
            let two = one_tick.times(2);
            inner = match agg.side {
                Side::Buy => best.ask.map(|(ask, _)| ask.saturating_sub(two)),
                Side::Sell => best.bid.map(|(bid, _)| bid.add(two)),
            };
        }

        // from here on inner <= outer
        if agg.side == Side::Sell {
            std::mem::swap(&mut inner, &mut outer);
        }

        // a single price is traded as the one tick interval next to it
        if let (Some(i), Some(o)) = (inner, outer) {
            if i == o {
                match agg.side {
                    Side::Sell => outer = Some(o.add(one_tick)),
                    Side::Buy => inner = Some(i.saturating_sub(one_tick)),
                }
            }
        }

        let mut bounds: BTreeSet<Price> = inner.into_iter().chain(outer).collect();
        let mut active = Vec::new();

        for (idx, pool) in self.engine.pools.iter().enumerate() {
            let pos = self.position(pool.sub_account());
            if !pool.can_trade(pos, agg.side) || &agg.party == pool.sub_account() {
                continue;
            }
            let outside = inner.map_or(false, |i| pool.max_price() < i)
                || outer.map_or(false, |o| pool.min_price() > o);
            if outside {
                continue;
            }
            active.push(idx);

            // the two curves meet at base; trade across it in two steps
            let base = pool.base();
            let base_inside = match (inner, outer) {
                (Some(i), Some(o)) => base > i && base < o,
                (Some(i), None) => base > i,
                (None, Some(o)) => base < o,
                (None, None) => true,
            };
            if base_inside {
                bounds.insert(base);
            }
            if outer.map_or(true, |o| pool.max_price() < o) {
                bounds.insert(pool.max_price());
            }
            if inner.map_or(true, |i| pool.min_price() > i) {
                bounds.insert(pool.min_price());
            }
        }

        let mut levels: Vec<Price> = bounds.into_iter().collect();
        if agg.side == Side::Sell {
            levels.reverse();
        }
        (active, levels)
    }

    fn submit_level(&mut self, active: &[usize], agg: &Order, remaining: &mut u64, outer: Price) -> Vec<Order> {
        let limited = !agg.is_market();

        let mut candidates: Vec<(usize, i64)> = Vec::with_capacity(active.len());
        for &idx in active {
            let pool = &self.engine.pools[idx];
            let pos = self.position(pool.sub_account());
            let best = match pool.best_price(pos, agg.side.opposite()) {
                Some(best) => best,
                None => continue,
            };
            let out_of_range = match agg.side {
                Side::Buy => best > outer || (limited && best > agg.price),
                Side::Sell => best < outer || (limited && best < agg.price),
            };
            if !out_of_range {
                candidates.push((idx, pos));
            }
        }

        let mut volumes: Vec<u64> = candidates
            .iter()
            .map(|&(idx, pos)| self.engine.pools[idx].tradable_volume_for_price(pos, agg.side, outer))
            .collect();
        let total = volumes.iter().copied().fold(0u64, u64::saturating_add);
        if *remaining < total {
            share_pro_rata(&mut volumes, *remaining, total);
        }

        let side = agg.side.opposite();
        let mut orders = Vec::new();
        for ((idx, pos), volume) in candidates.into_iter().zip(volumes) {
            if volume == 0 {
                continue;
            }
            let engine = &mut *self.engine;
            let pool = &engine.pools[idx];
            let price = pool.price_for_volume(pos, volume, agg.side);
            let order = pool.make_order(Some(engine.idgen.next_order_id()), side, volume, price, agg.created_at);
            debug!(sub_account = %order.party, side = ?side, price = %price, volume, "generated amm order");

            self.ephemeral.insert(order.party.clone(), pos + side.signed(volume));
            *remaining -= volume;
            orders.push(order);
        }
        orders
    }
}

fn best_across(pools: &[Pool], position: impl Fn(&Pool) -> i64) -> BestPrices {
    let mut best = BestPrices::default();
    for pool in pools {
        let pos = position(pool);
        if let Some((bid, volume)) = pool.best_price_and_volume(pos, Side::Buy) {
            best.bid = Some(match best.bid {
                Some((b, v)) if b > bid => (b, v),
                Some((b, v)) if b == bid => (b, v.saturating_add(volume)),
                _ => (bid, volume),
            });
        }
        if let Some((ask, volume)) = pool.best_price_and_volume(pos, Side::Sell) {
            best.ask = Some(match best.ask {
                Some((a, v)) if a < ask => (a, v),
                Some((a, v)) if a == ask => (a, v.saturating_add(volume)),
                _ => (ask, volume),
            });
        }
    }
    best
}

// scales `volumes` down so they sum to `remaining`; rounding crumbs go to the
// first pools with room for them
fn share_pro_rata(volumes: &mut [u64], remaining: u64, total: u64) {
    let max = volumes.to_vec();
    let mut shared = 0u64;
    for v in volumes.iter_mut() {
        *v = (u128::from(remaining) * u128::from(*v) / u128::from(total)) as u64;
        shared += *v;
    }

    let mut crumbs = remaining - shared;
    for (v, cap) in volumes.iter_mut().zip(max) {
        if crumbs == 0 {
            break;
        }
        let room = cap - *v;
        let take = room.min(crumbs);
        *v += take;
        crumbs -= take;
    }
}

// 9.0: expands a pool's curve over a price range into discrete orders, for auction
// uncrossing and market depth. one order per tick unless the range holds more than
// `max_calculation_levels` ticks, in which case interior steps widen and the result
// is approximate. orders at both edges of the range are always exact.

use crate::order::Order;
use crate::pool::Pool;
use crate::types::{PartyId, Price, Side, Timestamp};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ShapeResult {
    pub sub_account: Option<PartyId>,
    /// ascending by price
    pub buys: Vec<Order>,
    /// ascending by price
    pub sells: Vec<Order>,
}

impl ShapeResult {
    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }
}

pub struct ShapeMaker<'a> {
    pool: &'a Pool,
    pos: i64,
    fair_price: Price,
    from: Price,
    to: Price,
    step: Price,
    approx: bool,
    created_at: Timestamp,
    buys: Vec<Order>,
    sells: Vec<Order>,
}

// what adjust_region decided
enum Region {
    Empty,
    Done,
    Expand,
}

impl<'a> ShapeMaker<'a> {
    pub fn new(pool: &'a Pool, pos: i64, from: Option<Price>, to: Option<Price>, created_at: Timestamp) -> Self {
        Self {
            pool,
            pos,
            fair_price: pool.fair_price(pos),
            from: from.unwrap_or_else(|| pool.min_price()),
            to: to.unwrap_or_else(|| pool.max_price()),
            step: pool.one_tick(),
            approx: false,
            created_at,
            buys: Vec::new(),
            sells: Vec::new(),
        }
    }

    pub fn make_shape(mut self) -> ShapeResult {
        match self.adjust_region() {
            Region::Empty => {}
            Region::Done => {}
            Region::Expand => {
                self.calculate_step_size();
                self.widen_region();
                let mut steps = self.calculate_boundary_orders();
                self.expand_curve(&mut steps);
                for (st, nd) in steps {
                    self.add_step(st, nd);
                }
            }
        }

        self.buys.sort_by(|a, b| a.price.cmp(&b.price));
        self.sells.sort_by(|a, b| a.price.cmp(&b.price));

        debug!(
            pool = %self.pool.id(),
            position = self.pos,
            from = %self.from,
            to = %self.to,
            step = %self.step,
            approx = self.approx,
            buys = self.buys.len(),
            sells = self.sells.len(),
            "shape"
        );

        ShapeResult {
            sub_account: Some(self.pool.sub_account().clone()),
            buys: self.buys,
            sells: self.sells,
        }
    }

    fn adjust_region(&mut self) -> Region {
        let (min, max) = (self.pool.min_price(), self.pool.max_price());
        self.from = self.from.max(min);
        self.to = self.to.min(max);

        if self.is_empty_region() {
            return Region::Empty;
        }

        if !self.pool.is_closing() {
            return Region::Expand;
        }

        // a closing pool only shows the orders that take it back to flat
        if self.pos == 0 {
            return Region::Empty;
        }
        let base = self.pool.base();
        let (lo, hi) = if self.pos > 0 {
            (self.fair_price, base)
        } else {
            (base, self.fair_price)
        };

        if base.abs_diff(self.fair_price) < self.pool.one_tick() && self.from <= hi && self.to >= lo {
            let side = if self.pos > 0 { Side::Sell } else { Side::Buy };
            let order = self.pool.make_order(
                None,
                side,
                self.pos.unsigned_abs(),
                self.fair_price,
                self.created_at,
            );
            match side {
                Side::Buy => self.buys.push(order),
                Side::Sell => self.sells.push(order),
            }
            return Region::Done;
        }

        self.from = self.from.max(lo);
        self.to = self.to.min(hi);
        if self.is_empty_region() {
            return Region::Empty;
        }
        Region::Expand
    }

    fn is_empty_region(&self) -> bool {
        self.from > self.to || (self.from == self.to && self.to == self.fair_price)
    }

    fn calculate_step_size(&mut self) {
        let tick = self.pool.one_tick();
        let delta = (self.to.value() - self.from.value()) / tick.value();
        let levels = Decimal::from(self.pool.limits().max_calculation_levels.max(1));

        if delta > levels {
            let ticks = (delta / levels).ceil().to_u64().unwrap_or(u64::MAX);
            self.step = tick.times(ticks);
            self.approx = true;
        } else {
            self.step = tick;
        }
    }

    // an edge strictly on the sell side of fair gets the tick below it so its own
    // price shows up as a sell, and likewise for a buy edge
    fn widen_region(&mut self) {
        let tick = self.pool.one_tick();
        if self.from > self.fair_price {
            self.from = self.from.saturating_sub(tick);
        }
        if self.to < self.fair_price {
            self.to = self.to.add(tick);
        }
        self.from = self.from.max(self.pool.min_price());
        self.to = self.to.min(self.pool.max_price());
    }

    fn calculate_boundary_orders(&self) -> Vec<(Price, Price)> {
        let tick = self.pool.one_tick();
        let mut steps = Vec::new();

        let first = (self.from, self.from.add(tick).min(self.to));
        self.push_split(&mut steps, first);

        let last = (self.to.saturating_sub(tick).max(self.from), self.to);
        if last != first {
            self.push_split(&mut steps, last);
        }
        steps
    }

    fn push_split(&self, steps: &mut Vec<(Price, Price)>, (st, nd): (Price, Price)) {
        let fp = self.fair_price;
        if st < fp && fp < nd {
            steps.push((st, fp));
            steps.push((fp, nd));
        } else {
            steps.push((st, nd));
        }
    }

    fn expand_curve(&self, steps: &mut Vec<(Price, Price)>) {
        let tick = self.pool.one_tick();
        let fp = self.fair_price;
        let end = self.to.saturating_sub(tick);
        let mut cur = self.from.add(tick);

        while cur < end {
            let mut next = cur.add(self.step);
            // leftover shorter than a tick joins this step
            if next.add(tick) > end {
                next = end;
            }
            if cur < fp && fp < next {
                steps.push((cur, fp));
                cur = fp;
                continue;
            }
            steps.push((cur, next));
            cur = next;
        }
    }

    fn add_step(&mut self, st: Price, nd: Price) {
        if st >= nd {
            return;
        }

        let sqrt = &self.pool.sqrt;
        let volume = self
            .pool
            .lower_curve()
            .lot_volume_between_prices(sqrt, st, nd)
            .saturating_add(self.pool.upper_curve().lot_volume_between_prices(sqrt, st, nd));
        if volume == 0 {
            return;
        }

        if nd <= self.fair_price {
            let order = self.pool.make_order(None, Side::Buy, volume, st, self.created_at);
            self.buys.push(order);
        } else if st >= self.fair_price {
            let order = self.pool.make_order(None, Side::Sell, volume, nd, self.created_at);
            self.sells.push(order);
        }
    }
}

impl Pool {
    /// Discrete orders reproducing the curve between `from` and `to` for position `pos`.
    pub fn orderbook_shape(&self, pos: i64, from: Option<Price>, to: Option<Price>, created_at: Timestamp) -> ShapeResult {
        ShapeMaker::new(self, pos, from, to, created_at).make_shape()
    }
}

// 7.1 pool/pricing.rs: what the pool will trade and at what price, given a position.
// the position is always passed in; the pool never looks it up itself.
//
// `side` is the incoming order's side unless a method says otherwise.

use super::{Pool, PoolStatus};
use crate::types::{Price, Side};
use rust_decimal::Decimal;
use std::cmp::Ordering;

impl Pool {
    /// Whether an incoming order on `side` may trade with the pool at all.
    pub fn can_trade(&self, pos: i64, side: Side) -> bool {
        if self.status != PoolStatus::ReduceOnly {
            return true;
        }
        match pos.cmp(&0) {
            // long pool can only sell, so it needs an incoming buy
            Ordering::Greater => side == Side::Buy,
            Ordering::Less => side == Side::Sell,
            Ordering::Equal => false,
        }
    }

    /// Price at which the pool's curve sits for `pos`. Long positions round down and
    /// short ones round up, away from the base either way.
    pub fn fair_price(&self, pos: i64) -> Price {
        if pos == 0 {
            return self.base;
        }
        if let Some(fp) = self.cache.fair_price(pos) {
            return fp;
        }

        let (curve, pv) = if pos > 0 {
            (&self.lower, Decimal::from(pos))
        } else {
            (&self.upper, self.upper.pv + Decimal::from(pos))
        };

        if curve.is_empty() {
            panic!(
                "pool {} holds position {} on a side with no curve",
                self.id, pos
            );
        }

        let sqrt_high = self.sqrt.sqrt(curve.high);
        let sqrt_fp = sqrt_high / (pv * sqrt_high / curve.l + Decimal::ONE);
        let fp = sqrt_fp * sqrt_fp;

        let fp = if pos > 0 { Price::floor(fp) } else { Price::ceil(fp) };
        self.cache.set_fair_price(pos, fp);
        fp
    }

    // x: virtual base balance, y: virtual quote balance
    fn virtual_balances(&self, pos: i64, fair_price: Price, side: Side) -> (Decimal, Decimal) {
        let pos = Decimal::from(pos);
        let sqrt_fp = self.sqrt.sqrt(fair_price);

        if pos < Decimal::ZERO || (pos.is_zero() && side == Side::Buy) {
            let c = &self.upper;
            let x = pos + c.pv + c.l / self.sqrt.sqrt(c.high);
            (x, c.l * sqrt_fp)
        } else {
            let c = &self.lower;
            let x = pos + c.l / self.sqrt.sqrt(c.high);
            (x, c.l * sqrt_fp)
        }
    }

    /// Average price the pool fills `volume` at for an incoming order on `side`.
    pub fn price_for_volume(&self, pos: i64, volume: u64, side: Side) -> Price {
        let fp = self.fair_price(pos);
        if volume == 0 {
            return fp;
        }

        let (x, y) = self.virtual_balances(pos, fp, side);
        let dx = match side {
            Side::Buy => Decimal::from(volume),
            Side::Sell => -Decimal::from(volume),
        };

        if x - dx <= Decimal::ZERO {
            panic!(
                "pool {} cannot fill {} at position {}: virtual balance exhausted",
                self.id, volume, pos
            );
        }

        let dy = x * y / (x - dx) - y;
        Price::floor((dy / dx).abs())
    }

    /// Volume the pool trades with an incoming `side` order between two prices.
    /// `None` stretches that end to the pool's limit.
    pub fn tradable_volume_in_range(&self, pos: i64, side: Side, p1: Option<Price>, p2: Option<Price>) -> u64 {
        if !self.can_trade(pos, side) {
            return 0;
        }

        let p1 = p1.unwrap_or_else(Price::zero);
        let p2 = p2.unwrap_or_else(|| self.max_price());
        if p1 == p2 {
            return 0;
        }
        let (mut st, mut nd) = if p1 < p2 { (p1, p2) } else { (p2, p1) };

        // sellers only reach the pool's bids, buyers only its asks
        let fp = self.fair_price(pos);
        match side {
            Side::Sell => nd = nd.min(fp),
            Side::Buy => st = st.max(fp),
        }
        if st >= nd {
            return 0;
        }

        let (current, other) = if pos < 0 || (pos == 0 && side == Side::Buy) {
            (&self.upper, &self.lower)
        } else {
            (&self.lower, &self.upper)
        };

        let mut volume = current.volume_between_prices(&self.sqrt, st, nd);
        let reducing = (pos > 0 && side == Side::Buy) || (pos < 0 && side == Side::Sell);
        if reducing {
            volume = volume.min(pos.unsigned_abs());
        }

        if self.is_closing() {
            return volume;
        }
        volume.saturating_add(other.volume_between_prices(&self.sqrt, st, nd))
    }

    /// Volume between the fair price and `price` for an incoming `side` order.
    pub fn tradable_volume_for_price(&self, pos: i64, side: Side, price: Price) -> u64 {
        match side {
            Side::Sell => self.tradable_volume_in_range(pos, side, Some(price), None),
            Side::Buy => self.tradable_volume_in_range(pos, side, None, Some(price)),
        }
    }

    /// The pool's own best quote on `side` (Buy = bid) with the volume behind it.
    pub fn best_price_and_volume(&self, pos: i64, side: Side) -> Option<(Price, u64)> {
        let incoming = side.opposite();
        if !self.can_trade(pos, incoming) {
            return None;
        }
        if let Some(hit) = self.cache.best_price(side, pos, self.status) {
            return hit;
        }

        let fp = self.fair_price(pos);
        let (min, max) = (self.min_price(), self.max_price());
        let mut best = None;

        for level in 1..=self.limits.allowed_empty_levels.saturating_add(1) {
            let offset = self.one_tick.times(level);
            let price = match side {
                Side::Buy => {
                    if offset > fp || fp.saturating_sub(offset) < min {
                        break;
                    }
                    fp.saturating_sub(offset)
                }
                Side::Sell => {
                    let ask = fp.add(offset);
                    if ask > max {
                        break;
                    }
                    ask
                }
            };

            let volume = self.tradable_volume_for_price(pos, incoming, price);
            if volume > 0 {
                best = Some((price, volume));
                break;
            }
        }

        self.cache.set_best_price(side, pos, self.status, best);
        best
    }

    pub fn best_price(&self, pos: i64, side: Side) -> Option<Price> {
        self.best_price_and_volume(pos, side).map(|(price, _)| price)
    }
}

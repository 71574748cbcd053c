// 5.0: one side of a pool's liquidity. immutable once generated.
// the lower curve spans [lower bound, base] and the pool is long on it,
// the upper curve spans [base, upper bound] and the pool is short on it.
// 5.1 generate_curve, 5.2 volume queries, 5.3 viability check.

use crate::estimator;
use crate::pool::PoolError;
use crate::sqrt::Sqrter;
use crate::types::{Price, Quote};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveSide {
    Lower,
    Upper,
}

impl fmt::Display for CurveSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveSide::Lower => f.write_str("lower"),
            CurveSide::Upper => f.write_str("upper"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    /// virtual liquidity
    pub(crate) l: Decimal,
    pub(crate) low: Price,
    pub(crate) high: Price,
    /// theoretical position at the outer bound, always non-negative here
    pub(crate) pv: Decimal,
    pub(crate) empty: bool,
}

/// Risk inputs for one side of the pool.
#[derive(Debug, Clone)]
pub struct CurveParams {
    pub risk_factor: Decimal,
    pub margin_factor: Decimal,
    pub linear_slippage: Decimal,
    pub leverage_cap: Option<Decimal>,
    pub position_factor: Decimal,
}

impl Curve {
    /// Zero-length curve sitting at the base price, for a side with no bound.
    pub fn empty_at(base: Price) -> Self {
        Self {
            l: Decimal::ZERO,
            low: base,
            high: base,
            pv: Decimal::ZERO,
            empty: true,
        }
    }

    pub fn from_parts(l: Decimal, low: Price, high: Price, pv: Decimal, empty: bool) -> Self {
        debug_assert!(low <= high);
        Self { l, low, high, pv, empty }
    }

    pub fn virtual_liquidity(&self) -> Decimal {
        self.l
    }

    pub fn low(&self) -> Price {
        self.low
    }

    pub fn high(&self) -> Price {
        self.high
    }

    pub fn theoretical_position(&self) -> Decimal {
        self.pv
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    // 5.2: |implied(p1) - implied(p2)| with both prices clamped into the curve
    pub fn continuous_volume_between_prices(&self, sqrt: &Sqrter, p1: Price, p2: Price) -> Decimal {
        if self.empty || self.l.is_zero() {
            return Decimal::ZERO;
        }

        let st = p1.min(p2).max(self.low);
        let nd = p1.max(p2).min(self.high);
        if st >= nd {
            return Decimal::ZERO;
        }

        let sqrt_high = sqrt.sqrt(self.high);
        let pos_st = implied_position(sqrt.sqrt(st), sqrt_high, self.l);
        let pos_nd = implied_position(sqrt.sqrt(nd), sqrt_high, self.l);
        (pos_st - pos_nd).abs()
    }

    /// Tradable volume between two prices, floored to whole lots.
    pub fn volume_between_prices(&self, sqrt: &Sqrter, p1: Price, p2: Price) -> u64 {
        self.continuous_volume_between_prices(sqrt, p1, p2)
            .floor()
            .to_u64()
            .unwrap_or(u64::MAX)
    }

    /// Whole lots between the curve's positions at two prices, each position truncated
    /// first. Adjacent ranges telescope, so per-tick volumes sum to the range's volume.
    pub fn lot_volume_between_prices(&self, sqrt: &Sqrter, p1: Price, p2: Price) -> u64 {
        if self.empty || self.l.is_zero() {
            return 0;
        }

        let st = p1.min(p2).max(self.low);
        let nd = p1.max(p2).min(self.high);
        if st >= nd {
            return 0;
        }

        let sqrt_high = sqrt.sqrt(self.high);
        let lots = |price: Price| {
            implied_position(sqrt.sqrt(price), sqrt_high, self.l)
                .floor()
                .to_u64()
                .unwrap_or(u64::MAX)
        };
        lots(st).abs_diff(lots(nd))
    }

    // 5.3: at least one lot must trade between the outer bound and the level
    // (allowed_empty_levels + 1) ticks inside it
    pub fn check(
        &self,
        sqrt: &Sqrter,
        side: CurveSide,
        one_tick: Price,
        allowed_empty_levels: u64,
    ) -> Result<(), PoolError> {
        if self.empty {
            return Ok(());
        }

        let band = one_tick.times(allowed_empty_levels.saturating_add(1));
        let volume = match side {
            CurveSide::Lower => self.volume_between_prices(sqrt, self.low, self.low.add(band)),
            CurveSide::Upper => self.volume_between_prices(sqrt, self.high.saturating_sub(band), self.high),
        };

        if volume == 0 {
            return Err(PoolError::InsufficientCommitment(side));
        }
        Ok(())
    }
}

/// Position of the curve if its fair price were `sqrt_price`^2.
///
/// `L * (sqrt(high) - sqrt(price)) / (sqrt(high) * sqrt(price))`
pub fn implied_position(sqrt_price: Decimal, sqrt_high: Decimal, l: Decimal) -> Decimal {
    if sqrt_price.is_zero() {
        return Decimal::ZERO;
    }
    l * (sqrt_high - sqrt_price) / (sqrt_high * sqrt_price)
}

// 5.1: derive pv and L for one side. `low`/`high` are in asset precision.
pub fn generate_curve(
    sqrt: &Sqrter,
    side: CurveSide,
    commitment: Quote,
    low: Price,
    high: Price,
    params: &CurveParams,
) -> Curve {
    let rf = estimator::risk_factor(
        params.leverage_cap,
        params.risk_factor,
        params.linear_slippage,
        params.margin_factor,
    );

    let lu = estimator::liquidity_unit(sqrt, high, low);
    let pa = estimator::average_entry_price(sqrt, lu, high);

    let pv = match side {
        CurveSide::Lower => {
            estimator::position_at_lower_bound(rf, commitment.value(), low.value(), pa, params.position_factor)
        }
        CurveSide::Upper => estimator::position_at_upper_bound(
            rf,
            commitment.value(),
            high.value(),
            pa,
            params.position_factor,
        )
        .abs(),
    };

    Curve {
        l: pv * lu,
        low,
        high,
        pv,
        empty: false,
    }
}

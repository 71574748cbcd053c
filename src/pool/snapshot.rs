// 7.2 pool/snapshot.rs: pool state as plain strings. numbers go through their decimal
// string form so a restore reproduces the curves digit for digit.

use super::{Pool, PoolError, PoolLimits, PoolStatus};
use crate::cache::PoolCache;
use crate::commands::ConcentratedLiquidityParameters;
use crate::curve::Curve;
use crate::sqrt::Sqrter;
use crate::types::{AssetId, MarketId, PartyId, PoolId, Price, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSnapshot {
    pub l: String,
    pub low: String,
    pub high: String,
    pub pv: String,
    pub empty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersSnapshot {
    pub base: String,
    pub lower_bound: Option<String>,
    pub upper_bound: Option<String>,
    pub leverage_at_lower_bound: Option<String>,
    pub leverage_at_upper_bound: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub id: String,
    pub owner: String,
    pub sub_account: String,
    pub market: String,
    pub asset: String,
    pub commitment: String,
    pub proposed_fee: String,
    pub parameters: ParametersSnapshot,
    pub status: PoolStatus,
    pub price_factor: String,
    pub position_factor: String,
    pub lower: CurveSnapshot,
    pub upper: CurveSnapshot,
}

impl Pool {
    pub fn to_snapshot(&self) -> PoolSnapshot {
        let p = &self.parameters;
        PoolSnapshot {
            id: self.id.to_string(),
            owner: self.owner.to_string(),
            sub_account: self.sub_account.to_string(),
            market: self.market.to_string(),
            asset: self.asset.to_string(),
            commitment: self.commitment.value().to_string(),
            proposed_fee: self.proposed_fee.to_string(),
            parameters: ParametersSnapshot {
                base: p.base.to_string(),
                lower_bound: p.lower_bound.map(|v| v.to_string()),
                upper_bound: p.upper_bound.map(|v| v.to_string()),
                leverage_at_lower_bound: p.leverage_at_lower_bound.map(|v| v.to_string()),
                leverage_at_upper_bound: p.leverage_at_upper_bound.map(|v| v.to_string()),
            },
            status: self.status,
            price_factor: self.price_factor.to_string(),
            position_factor: self.position_factor.to_string(),
            lower: curve_snapshot(&self.lower),
            upper: curve_snapshot(&self.upper),
        }
    }

    /// Restores a pool without regenerating its curves.
    pub fn from_snapshot(state: &PoolSnapshot, sqrt: Rc<Sqrter>, limits: PoolLimits) -> Result<Pool, PoolError> {
        let parameters = ConcentratedLiquidityParameters {
            base: price(&state.parameters.base)?,
            lower_bound: state.parameters.lower_bound.as_deref().map(price).transpose()?,
            upper_bound: state.parameters.upper_bound.as_deref().map(price).transpose()?,
            leverage_at_lower_bound: state.parameters.leverage_at_lower_bound.as_deref().map(decimal).transpose()?,
            leverage_at_upper_bound: state.parameters.leverage_at_upper_bound.as_deref().map(decimal).transpose()?,
        };

        let price_factor = decimal(&state.price_factor)?;
        let base = Price::new(parameters.base.value() * price_factor)
            .ok_or_else(|| PoolError::Snapshot(format!("base price {}", parameters.base)))?;

        Ok(Pool {
            id: PoolId::new(state.id.as_str()),
            owner: PartyId::new(state.owner.as_str()),
            sub_account: PartyId::new(state.sub_account.as_str()),
            market: MarketId::new(state.market.as_str()),
            asset: AssetId::new(state.asset.as_str()),
            commitment: Quote::new(decimal(&state.commitment)?),
            proposed_fee: decimal(&state.proposed_fee)?,
            parameters,
            base,
            lower: restore_curve(&state.lower)?,
            upper: restore_curve(&state.upper)?,
            status: state.status,
            one_tick: Price::new(price_factor.max(Decimal::ONE))
                .ok_or_else(|| PoolError::Snapshot(format!("price factor {}", price_factor)))?,
            price_factor,
            position_factor: decimal(&state.position_factor)?,
            limits,
            sqrt,
            cache: PoolCache::new(),
        })
    }
}

fn curve_snapshot(curve: &Curve) -> CurveSnapshot {
    CurveSnapshot {
        l: curve.l.to_string(),
        low: curve.low.to_string(),
        high: curve.high.to_string(),
        pv: curve.pv.to_string(),
        empty: curve.empty,
    }
}

fn restore_curve(state: &CurveSnapshot) -> Result<Curve, PoolError> {
    let low = price(&state.low)?;
    let high = price(&state.high)?;
    if low > high {
        return Err(PoolError::Snapshot(format!("curve low {} above high {}", low, high)));
    }
    Ok(Curve::from_parts(decimal(&state.l)?, low, high, decimal(&state.pv)?, state.empty))
}

fn decimal(s: &str) -> Result<Decimal, PoolError> {
    Decimal::from_str(s).map_err(|e| PoolError::Snapshot(format!("{:?}: {}", s, e)))
}

fn price(s: &str) -> Result<Price, PoolError> {
    Price::new(decimal(s)?).ok_or_else(|| PoolError::Snapshot(format!("{:?} is not a price", s)))
}

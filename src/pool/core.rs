// 7.0 pool/core.rs: pool state. curves are rebuilt from scratch on amendment, so a
// Pool value is never edited in place beyond its status and the shared limits.

use super::{PoolError, PoolLimits, PoolStatus};
use crate::cache::PoolCache;
use crate::commands::{AmendAmm, ConcentratedLiquidityParameters, SubmitAmm};
use crate::curve::{generate_curve, Curve, CurveParams, CurveSide};
use crate::market::{MarketContext, RiskInputs};
use crate::order::{Order, OrderType};
use crate::sqrt::Sqrter;
use crate::types::{AssetId, MarketId, OrderId, PartyId, PoolId, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Pool {
    pub(crate) id: PoolId,
    pub(crate) owner: PartyId,
    pub(crate) sub_account: PartyId,
    pub(crate) market: MarketId,
    pub(crate) asset: AssetId,
    pub(crate) commitment: Quote,
    pub(crate) proposed_fee: Decimal,
    /// market precision, as submitted
    pub(crate) parameters: ConcentratedLiquidityParameters,
    /// asset precision
    pub(crate) base: Price,
    pub(crate) lower: Curve,
    pub(crate) upper: Curve,
    pub(crate) status: PoolStatus,
    pub(crate) one_tick: Price,
    pub(crate) price_factor: Decimal,
    pub(crate) position_factor: Decimal,
    pub(crate) limits: PoolLimits,
    pub(crate) sqrt: Rc<Sqrter>,
    pub(crate) cache: PoolCache,
}

impl Pool {
    pub fn new(
        id: PoolId,
        sub_account: PartyId,
        submit: &SubmitAmm,
        market: &MarketContext,
        risk: &RiskInputs,
        sqrt: Rc<Sqrter>,
        limits: PoolLimits,
    ) -> Result<Self, PoolError> {
        submit.parameters.validate()?;

        let base = market.to_asset_price(submit.parameters.base);
        let one_tick = market.one_tick();
        let (lower, upper) = build_curves(&sqrt, submit.commitment, &submit.parameters, market, risk);

        lower.check(&sqrt, CurveSide::Lower, one_tick, limits.allowed_empty_levels)?;
        upper.check(&sqrt, CurveSide::Upper, one_tick, limits.allowed_empty_levels)?;

        Ok(Self {
            id,
            owner: submit.party.clone(),
            sub_account,
            market: market.id.clone(),
            asset: market.settlement_asset.clone(),
            commitment: submit.commitment,
            proposed_fee: submit.proposed_fee,
            parameters: submit.parameters.clone(),
            base,
            lower,
            upper,
            status: PoolStatus::Active,
            one_tick,
            price_factor: market.price_factor,
            position_factor: market.position_factor,
            limits,
            sqrt,
            cache: PoolCache::new(),
        })
    }

    /// Builds the pool an amendment would produce. `self` is left as it was so a
    /// failed amendment costs nothing.
    pub fn update(&self, amend: &AmendAmm, risk: &RiskInputs) -> Result<Pool, PoolError> {
        let submit = SubmitAmm {
            party: self.owner.clone(),
            commitment: amend.commitment.unwrap_or(self.commitment),
            parameters: amend.parameters.clone().unwrap_or_else(|| self.parameters.clone()),
            proposed_fee: amend.proposed_fee.unwrap_or(self.proposed_fee),
        };

        Pool::new(
            self.id.clone(),
            self.sub_account.clone(),
            &submit,
            &self.market_context(),
            risk,
            Rc::clone(&self.sqrt),
            self.limits,
        )
    }

    fn market_context(&self) -> MarketContext {
        MarketContext {
            id: self.market.clone(),
            settlement_asset: self.asset.clone(),
            price_factor: self.price_factor,
            position_factor: self.position_factor,
        }
    }

    pub fn id(&self) -> &PoolId {
        &self.id
    }

    pub fn owner(&self) -> &PartyId {
        &self.owner
    }

    pub fn sub_account(&self) -> &PartyId {
        &self.sub_account
    }

    pub fn market(&self) -> &MarketId {
        &self.market
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn commitment(&self) -> Quote {
        self.commitment
    }

    pub fn proposed_fee(&self) -> Decimal {
        self.proposed_fee
    }

    pub fn parameters(&self) -> &ConcentratedLiquidityParameters {
        &self.parameters
    }

    pub fn base(&self) -> Price {
        self.base
    }

    pub fn lower_curve(&self) -> &Curve {
        &self.lower
    }

    pub fn upper_curve(&self) -> &Curve {
        &self.upper
    }

    pub fn status(&self) -> PoolStatus {
        self.status
    }

    pub fn one_tick(&self) -> Price {
        self.one_tick
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    pub fn is_closing(&self) -> bool {
        self.status == PoolStatus::ReduceOnly
    }

    pub fn set_status(&mut self, status: PoolStatus) {
        self.status = status;
    }

    pub fn set_max_calculation_levels(&mut self, levels: u64) {
        self.limits.max_calculation_levels = levels;
    }

    // best prices depend on this, so anything cached is stale
    pub fn set_allowed_empty_levels(&mut self, levels: u64) {
        self.limits.allowed_empty_levels = levels;
        self.cache.clear();
    }

    /// Lowest price the pool quotes at, in asset precision.
    pub fn min_price(&self) -> Price {
        if self.lower.is_empty() {
            self.base
        } else {
            self.lower.low()
        }
    }

    pub fn max_price(&self) -> Price {
        if self.upper.is_empty() {
            self.base
        } else {
            self.upper.high()
        }
    }

    /// Order on behalf of the pool's sub-account. `price` is in asset precision;
    /// the market price rounds in the pool's favour.
    pub fn make_order(
        &self,
        id: Option<OrderId>,
        side: Side,
        size: u64,
        price: Price,
        created_at: Timestamp,
    ) -> Order {
        let market_price = price.value() / self.price_factor;
        let original_price = match side {
            Side::Buy => Price::ceil(market_price),
            Side::Sell => Price::floor(market_price),
        };

        Order {
            id,
            market_id: self.market.clone(),
            party: self.sub_account.clone(),
            side,
            order_type: OrderType::Limit,
            price,
            original_price,
            size,
            remaining: size,
            created_at,
        }
    }
}

fn build_curves(
    sqrt: &Sqrter,
    commitment: Quote,
    parameters: &ConcentratedLiquidityParameters,
    market: &MarketContext,
    risk: &RiskInputs,
) -> (Curve, Curve) {
    let base = market.to_asset_price(parameters.base);

    let lower = match parameters.lower_bound {
        Some(bound) => {
            let params = CurveParams {
                risk_factor: risk.risk_factor_long,
                margin_factor: risk.initial_margin_scaling,
                linear_slippage: risk.linear_slippage,
                leverage_cap: parameters.leverage_at_lower_bound,
                position_factor: market.position_factor,
            };
            generate_curve(sqrt, CurveSide::Lower, commitment, market.to_asset_price(bound), base, &params)
        }
        None => Curve::empty_at(base),
    };

    let upper = match parameters.upper_bound {
        Some(bound) => {
            let params = CurveParams {
                risk_factor: risk.risk_factor_short,
                margin_factor: risk.initial_margin_scaling,
                linear_slippage: risk.linear_slippage,
                leverage_cap: parameters.leverage_at_upper_bound,
                position_factor: market.position_factor,
            };
            generate_curve(sqrt, CurveSide::Upper, commitment, base, market.to_asset_price(bound), &params)
        }
        None => Curve::empty_at(base),
    };

    (lower, upper)
}

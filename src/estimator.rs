// 4.0: closed form curve formulas.
// curve generation is built from these, and `estimate` composes them so a party can
// preview what a pool would look like before submitting it.
//
// all prices are in asset precision. positions at the bounds come back scaled by the
// position factor, matching what the pool reports as tradable volume.

use crate::curve::{generate_curve, CurveParams, CurveSide};
use crate::sqrt::Sqrter;
use crate::types::{Price, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// decimal places kept in estimator output
const ESTIMATE_DP: u32 = 5;

/// Lu = sqrt(upper) * sqrt(lower) / (sqrt(upper) - sqrt(lower))
pub fn liquidity_unit(sqrt: &Sqrter, upper: Price, lower: Price) -> Decimal {
    let su = sqrt.sqrt(upper);
    let sl = sqrt.sqrt(lower);
    su * sl / (su - sl)
}

/// Average price of a position built by trading the whole curve.
pub fn average_entry_price(sqrt: &Sqrter, liquidity_unit: Decimal, upper: Price) -> Decimal {
    let su = sqrt.sqrt(upper);
    liquidity_unit * su * (Decimal::ONE - liquidity_unit / (liquidity_unit + su))
}

/// Leverage the commitment can support at the bound, capped by the party's own choice.
pub fn risk_factor(
    leverage: Option<Decimal>,
    risk_factor: Decimal,
    linear_slippage: Decimal,
    initial_margin: Decimal,
) -> Decimal {
    let implied = Decimal::ONE / ((risk_factor + linear_slippage) * initial_margin);
    match leverage {
        Some(cap) => cap.min(implied),
        None => implied,
    }
}

pub fn position_at_lower_bound(
    risk_factor: Decimal,
    commitment: Decimal,
    lower: Decimal,
    average_entry: Decimal,
    position_factor: Decimal,
) -> Decimal {
    let pv = risk_factor * commitment / (lower * (Decimal::ONE - risk_factor) + risk_factor * average_entry);
    pv * position_factor
}

// negative: the pool is short at its upper bound
pub fn position_at_upper_bound(
    risk_factor: Decimal,
    commitment: Decimal,
    upper: Decimal,
    average_entry: Decimal,
    position_factor: Decimal,
) -> Decimal {
    let pv = risk_factor * commitment / (upper * (Decimal::ONE + risk_factor) - risk_factor * average_entry);
    -pv.abs() * position_factor
}

pub fn loss_on_commitment(average_entry: Decimal, bound: Decimal, position: Decimal) -> Decimal {
    position.abs() * (average_entry - bound).abs()
}

pub fn liquidation_price(
    commitment: Decimal,
    loss: Decimal,
    position: Decimal,
    bound: Decimal,
    linear_slippage: Decimal,
    risk_factor: Decimal,
) -> Decimal {
    (commitment - loss - position * bound) / (position.abs() * (linear_slippage + risk_factor) - position)
}

/// Inputs to `estimate`. Prices are in asset precision.
#[derive(Debug, Clone)]
pub struct EstimateInputs {
    pub lower: Option<Price>,
    pub base: Price,
    pub upper: Option<Price>,
    pub leverage_lower: Option<Decimal>,
    pub leverage_upper: Option<Decimal>,
    pub commitment: Quote,
    pub linear_slippage: Decimal,
    pub initial_margin: Decimal,
    pub risk_factor_short: Decimal,
    pub risk_factor_long: Decimal,
    pub position_factor: Decimal,
    pub one_tick: Price,
    pub allowed_empty_levels: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatedBounds {
    pub position_size_at_upper: Option<Decimal>,
    pub position_size_at_lower: Option<Decimal>,
    pub loss_on_commitment_at_upper: Option<Decimal>,
    pub loss_on_commitment_at_lower: Option<Decimal>,
    pub liquidation_price_at_upper: Option<Decimal>,
    pub liquidation_price_at_lower: Option<Decimal>,
    pub too_wide_upper: bool,
    pub too_wide_lower: bool,
}

/// Position, loss and liquidation price the pool would reach at each bound.
pub fn estimate(sqrt: &Sqrter, inputs: &EstimateInputs) -> EstimatedBounds {
    let mut bounds = EstimatedBounds::default();
    let commitment = inputs.commitment.value();

    if let Some(lower) = inputs.lower {
        let rf = risk_factor(
            inputs.leverage_lower,
            inputs.risk_factor_long,
            inputs.linear_slippage,
            inputs.initial_margin,
        );
        let lu = liquidity_unit(sqrt, inputs.base, lower);
        let pa = average_entry_price(sqrt, lu, inputs.base);
        let pv = position_at_lower_bound(rf, commitment, lower.value(), pa, inputs.position_factor);
        // loss and liquidation work in whole-unit positions
        let units = pv / inputs.position_factor;
        let loss = loss_on_commitment(pa, lower.value(), units);
        let liq = liquidation_price(
            commitment,
            loss,
            units,
            lower.value(),
            inputs.linear_slippage,
            inputs.risk_factor_long,
        );

        bounds.position_size_at_lower = Some(pv.trunc_with_scale(ESTIMATE_DP));
        bounds.loss_on_commitment_at_lower = Some(loss.trunc_with_scale(ESTIMATE_DP));
        bounds.liquidation_price_at_lower = Some(liq.trunc_with_scale(ESTIMATE_DP));
        bounds.too_wide_lower = too_wide(sqrt, inputs, CurveSide::Lower, lower, inputs.base);
    }

    if let Some(upper) = inputs.upper {
        let rf = risk_factor(
            inputs.leverage_upper,
            inputs.risk_factor_short,
            inputs.linear_slippage,
            inputs.initial_margin,
        );
        let lu = liquidity_unit(sqrt, upper, inputs.base);
        let pa = average_entry_price(sqrt, lu, upper);
        let pv = position_at_upper_bound(rf, commitment, upper.value(), pa, inputs.position_factor);
        let units = pv / inputs.position_factor;
        let loss = loss_on_commitment(pa, upper.value(), units);
        let liq = liquidation_price(
            commitment,
            loss,
            units,
            upper.value(),
            inputs.linear_slippage,
            inputs.risk_factor_short,
        );

        bounds.position_size_at_upper = Some(pv.trunc_with_scale(ESTIMATE_DP));
        bounds.loss_on_commitment_at_upper = Some(loss.trunc_with_scale(ESTIMATE_DP));
        bounds.liquidation_price_at_upper = Some(liq.trunc_with_scale(ESTIMATE_DP));
        bounds.too_wide_upper = too_wide(sqrt, inputs, CurveSide::Upper, inputs.base, upper);
    }

    bounds
}

// a curve too wide for its commitment cannot fill one lot near its outer bound
fn too_wide(sqrt: &Sqrter, inputs: &EstimateInputs, side: CurveSide, low: Price, high: Price) -> bool {
    let (risk, leverage) = match side {
        CurveSide::Lower => (inputs.risk_factor_long, inputs.leverage_lower),
        CurveSide::Upper => (inputs.risk_factor_short, inputs.leverage_upper),
    };
    let params = CurveParams {
        risk_factor: risk,
        margin_factor: inputs.initial_margin,
        linear_slippage: inputs.linear_slippage,
        leverage_cap: leverage,
        position_factor: inputs.position_factor,
    };
    let curve = generate_curve(sqrt, side, inputs.commitment, low, high, &params);
    curve
        .check(sqrt, side, inputs.one_tick, inputs.allowed_empty_levels)
        .is_err()
}

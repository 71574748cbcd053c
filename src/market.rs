//! Market context the AMM engine runs inside.
//!
//! The engine serves exactly one market. Everything it needs to know about that
//! market (identity, settlement asset, decimal scaling) lives here, along with
//! the risk model inputs that curve generation consumes.

use crate::types::{AssetId, MarketId, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("price factor must be a positive whole number, got {0}")]
    InvalidPriceFactor(Decimal),

    #[error("position factor must be positive, got {0}")]
    InvalidPositionFactor(Decimal),
}

/// Static market configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub id: MarketId,
    pub settlement_asset: AssetId,
    /// 10^(asset decimals - market decimals): market price -> asset price
    pub price_factor: Decimal,
    /// 10^(position decimals): theoretical volume -> tradable lots
    pub position_factor: Decimal,
}

impl MarketContext {
    pub fn new(
        id: MarketId,
        settlement_asset: AssetId,
        price_factor: Decimal,
        position_factor: Decimal,
    ) -> Result<Self, MarketError> {
        if price_factor < Decimal::ONE || !price_factor.fract().is_zero() {
            return Err(MarketError::InvalidPriceFactor(price_factor));
        }
        if position_factor <= Decimal::ZERO {
            return Err(MarketError::InvalidPositionFactor(position_factor));
        }
        Ok(Self {
            id,
            settlement_asset,
            price_factor,
            position_factor,
        })
    }

    /// Market where prices and positions need no scaling.
    pub fn unscaled(id: MarketId, settlement_asset: AssetId) -> Self {
        Self {
            id,
            settlement_asset,
            price_factor: Decimal::ONE,
            position_factor: Decimal::ONE,
        }
    }

    pub fn to_asset_price(&self, price: Price) -> Price {
        Price::new_unchecked(price.value() * self.price_factor)
    }

    /// One market tick expressed in asset precision.
    pub fn one_tick(&self) -> Price {
        Price::new_unchecked(self.price_factor.max(Decimal::ONE))
    }
}

/// Risk model outputs the curves are built from. Supplied per command since the
/// risk model may have moved between blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    pub risk_factor_long: Decimal,
    pub risk_factor_short: Decimal,
    pub initial_margin_scaling: Decimal,
    pub linear_slippage: Decimal,
}

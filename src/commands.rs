// 3.0: AMM commands as they arrive from the transaction layer.
// prices here are in market precision; the pool converts them to asset precision.

use crate::types::{PartyId, Price, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shape of the liquidity curve a party commits to.
///
/// At least one bound must be present. A missing bound leaves that side of the
/// pool empty, i.e. the pool only quotes on the other side of `base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentratedLiquidityParameters {
    pub base: Price,
    pub lower_bound: Option<Price>,
    pub upper_bound: Option<Price>,
    pub leverage_at_lower_bound: Option<Decimal>,
    pub leverage_at_upper_bound: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParametersError {
    #[error("base price must be positive")]
    ZeroBase,

    #[error("at least one of lower or upper bound must be set")]
    NoBounds,

    #[error("lower bound {lower} must be positive and below base {base}")]
    InvalidLowerBound { lower: Price, base: Price },

    #[error("upper bound {upper} must be above base {base}")]
    InvalidUpperBound { upper: Price, base: Price },

    #[error("leverage at bound must be positive")]
    InvalidLeverage,
}

impl ConcentratedLiquidityParameters {
    pub fn validate(&self) -> Result<(), ParametersError> {
        if self.base.is_zero() {
            return Err(ParametersError::ZeroBase);
        }
        if self.lower_bound.is_none() && self.upper_bound.is_none() {
            return Err(ParametersError::NoBounds);
        }
        if let Some(lower) = self.lower_bound {
            if lower.is_zero() || lower >= self.base {
                return Err(ParametersError::InvalidLowerBound { lower, base: self.base });
            }
        }
        if let Some(upper) = self.upper_bound {
            if upper <= self.base {
                return Err(ParametersError::InvalidUpperBound { upper, base: self.base });
            }
        }
        let positive = |l: &Option<Decimal>| l.map_or(true, |l| l > Decimal::ZERO);
        if !positive(&self.leverage_at_lower_bound) || !positive(&self.leverage_at_upper_bound) {
            return Err(ParametersError::InvalidLeverage);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAmm {
    pub party: PartyId,
    pub commitment: Quote,
    pub parameters: ConcentratedLiquidityParameters,
    pub proposed_fee: Decimal,
}

/// Sparse amendment. `None` keeps the pool's current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmendAmm {
    pub party: PartyId,
    pub commitment: Option<Quote>,
    pub parameters: Option<ConcentratedLiquidityParameters>,
    pub proposed_fee: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationMethod {
    /// release the commitment and drop the pool now
    Immediate,
    /// keep trading only towards a flat position, then drop the pool
    ReduceOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAmm {
    pub party: PartyId,
    pub method: CancellationMethod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params(lower: Option<u64>, base: u64, upper: Option<u64>) -> ConcentratedLiquidityParameters {
        ConcentratedLiquidityParameters {
            base: Price::from_u64(base),
            lower_bound: lower.map(Price::from_u64),
            upper_bound: upper.map(Price::from_u64),
            leverage_at_lower_bound: Some(dec!(50)),
            leverage_at_upper_bound: Some(dec!(50)),
        }
    }

    #[test]
    fn valid_two_sided_and_one_sided() {
        assert!(params(Some(1800), 2000, Some(2200)).validate().is_ok());
        assert!(params(None, 2000, Some(2200)).validate().is_ok());
        assert!(params(Some(1800), 2000, None).validate().is_ok());
    }

    #[test]
    fn submit_decodes_without_extra_fields() {
        let json = r#"{
            "party": "lp",
            "commitment": "100000",
            "parameters": {
                "base": "2000",
                "lower_bound": "1800",
                "upper_bound": null,
                "leverage_at_lower_bound": "50",
                "leverage_at_upper_bound": null
            },
            "proposed_fee": "0.001"
        }"#;
        let submit: SubmitAmm = serde_json::from_str(json).unwrap();
        assert_eq!(submit.parameters.base, Price::from_u64(2000));
        assert_eq!(submit.parameters.lower_bound, Some(Price::from_u64(1800)));
        assert!(submit.parameters.validate().is_ok());

        let fractional = json.replace(r#""base": "2000""#, r#""base": "1999.5""#);
        assert!(serde_json::from_str::<SubmitAmm>(&fractional).is_err());
    }

    #[test]
    fn rejects_bad_bounds() {
        assert_eq!(params(None, 2000, None).validate(), Err(ParametersError::NoBounds));
        assert!(matches!(
            params(Some(2000), 2000, Some(2200)).validate(),
            Err(ParametersError::InvalidLowerBound { .. })
        ));
        assert!(matches!(
            params(Some(1800), 2000, Some(1900)).validate(),
            Err(ParametersError::InvalidUpperBound { .. })
        ));
        assert!(matches!(
            params(Some(0), 2000, Some(2200)).validate(),
            Err(ParametersError::InvalidLowerBound { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_leverage() {
        let mut p = params(Some(1800), 2000, Some(2200));
        p.leverage_at_upper_bound = Some(dec!(0));
        assert_eq!(p.validate(), Err(ParametersError::InvalidLeverage));
    }
}

// 8.0.2: result types and errors for engine operations.

use crate::collateral::CollateralError;
use crate::commands::ParametersError;
use crate::events::StatusReason;
use crate::pool::PoolError;
use crate::types::{MarketId, Price, Quote};
use serde::{Deserialize, Serialize};

/// Best bid and ask across every pool, with the volume summed over pools quoting
/// the same price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BestPrices {
    pub bid: Option<(Price, u64)>,
    pub ask: Option<(Price, u64)>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("no pool matching party")]
    NoPoolMatchingParty,

    #[error("party already own a pool for market {0}")]
    PartyAlreadyOwnsAPool(MarketId),

    #[error("commitment amount too low")]
    CommitmentTooLow,

    #[error("not enough collateral in general account: required {required}, available {available}")]
    InsufficientFunds { required: Quote, available: Quote },

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Collateral error: {0}")]
    Collateral(#[from] CollateralError),

    #[error("Invalid parameters: {0}")]
    Parameters(#[from] ParametersError),
}

impl EngineError {
    /// Reason published with the rejection event.
    pub fn status_reason(&self) -> StatusReason {
        match self {
            EngineError::PartyAlreadyOwnsAPool(_) => StatusReason::PartyAlreadyOwnsAPool,
            EngineError::CommitmentTooLow => StatusReason::CommitmentTooLow,
            EngineError::InsufficientFunds { .. }
            | EngineError::Collateral(CollateralError::InsufficientBalance { .. })
            | EngineError::Pool(PoolError::InsufficientCommitment(_)) => StatusReason::CannotFillCommitment,
            _ => StatusReason::Unspecified,
        }
    }
}

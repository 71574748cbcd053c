// 7.0: a single party's AMM pool. two curves either side of the base price, plus
// everything matching needs to ask of them.
// 7.0 pool/core.rs: construction, amendment, accessors, order generation.
// 7.1 pool/pricing.rs: fair price, trade price, tradable volume, best prices.
// 7.2 pool/snapshot.rs: string-encoded state for snapshots.

mod core;
mod pricing;
mod snapshot;

pub use self::core::Pool;
pub use snapshot::{CurveSnapshot, ParametersSnapshot, PoolSnapshot};

use crate::commands::ParametersError;
use crate::curve::CurveSide;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("insufficient commitment - less than one volume at price levels on {0} curve")]
    InsufficientCommitment(CurveSide),

    #[error("invalid parameters: {0}")]
    InvalidParameters(#[from] ParametersError),

    #[error("malformed pool snapshot: {0}")]
    Snapshot(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolStatus {
    Active,
    /// only trades that move the position towards zero
    ReduceOnly,
    Rejected,
    Cancelled,
    Stopped,
}

/// Network-wide knobs every pool of the market shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    /// cap on the number of price levels a shape expands into
    pub max_calculation_levels: u64,
    /// ticks a best price may step past an empty level
    pub allowed_empty_levels: u64,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_calculation_levels: 1000,
            allowed_empty_levels: 0,
        }
    }
}

//! Engine configuration options.

use crate::pool::PoolLimits;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Engine configuration. The last three fields mirror network parameters and can
/// change at runtime through the engine's update hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Smallest commitment accepted, in multiples of the asset quantum.
    pub min_commitment_quantum: Decimal,
    /// Cap on price levels a single shape expands into.
    pub max_calculation_levels: u64,
    /// Empty ticks a pool's best price may skip.
    pub allowed_empty_levels: u64,
}

impl EngineConfig {
    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            max_calculation_levels: self.max_calculation_levels,
            allowed_empty_levels: self.allowed_empty_levels,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            min_commitment_quantum: Decimal::ZERO,
            max_calculation_levels: 1000,
            allowed_empty_levels: 0,
        }
    }
}

// 12.0: every state change the engine makes is published as an event. downstream
// consumers rebuild pool state and ledger history from these alone.

use crate::collateral::LedgerMovement;
use crate::commands::ConcentratedLiquidityParameters;
use crate::pool::{Pool, PoolStatus};
use crate::types::{MarketId, PartyId, PoolId, Quote, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    AmmPool(AmmPoolEvent),
    LedgerMovements(LedgerMovementsEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusReason {
    Unspecified,
    CancelledByParty,
    CannotFillCommitment,
    PartyAlreadyOwnsAPool,
    PartyClosedOut,
    MarketClosed,
    CommitmentTooLow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSummary {
    pub virtual_liquidity: Decimal,
    pub theoretical_position: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmmPoolEvent {
    pub party: PartyId,
    pub market: MarketId,
    pub sub_account: PartyId,
    pub pool_id: PoolId,
    pub commitment: Quote,
    pub parameters: ConcentratedLiquidityParameters,
    pub status: PoolStatus,
    pub reason: StatusReason,
    pub proposed_fee: Decimal,
    /// absent for a side with no bound, or when the pool never got built
    pub lower_curve: Option<CurveSummary>,
    pub upper_curve: Option<CurveSummary>,
}

impl AmmPoolEvent {
    pub fn from_pool(pool: &Pool, reason: StatusReason) -> Self {
        let summary = |c: &crate::curve::Curve| {
            (!c.is_empty()).then(|| CurveSummary {
                virtual_liquidity: c.virtual_liquidity(),
                theoretical_position: c.theoretical_position(),
            })
        };

        Self {
            party: pool.owner().clone(),
            market: pool.market().clone(),
            sub_account: pool.sub_account().clone(),
            pool_id: pool.id().clone(),
            commitment: pool.commitment(),
            parameters: pool.parameters().clone(),
            status: pool.status(),
            reason,
            proposed_fee: pool.proposed_fee(),
            lower_curve: summary(pool.lower_curve()),
            upper_curve: summary(pool.upper_curve()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerMovementsEvent {
    pub movements: Vec<LedgerMovement>,
}

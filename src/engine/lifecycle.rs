// 8.2 engine/lifecycle.rs: pool state machine.
// none -> Active -> (ReduceOnly) -> removed, with Rejected for a submission that
// fails. every transition publishes an AmmPool event.

use super::core::Engine;
use super::results::EngineError;
use crate::collateral::Collateral;
use crate::commands::{AmendAmm, CancelAmm, CancellationMethod, SubmitAmm};
use crate::events::{AmmPoolEvent, EventPayload, StatusReason};
use crate::idgen::{derive_amm_party, IdGenerator};
use crate::market::RiskInputs;
use crate::pool::{Pool, PoolStatus};
use crate::position::{MarketPosition, PositionProvider};
use crate::types::{PartyId, PoolId, Timestamp};
use rust_decimal::Decimal;
use std::rc::Rc;
use tracing::{error, info, warn};

// sub-account derivation index; one pool per party per market
const SUB_ACCOUNT_INDEX: u64 = 0;

impl<C: Collateral, P: PositionProvider> Engine<C, P> {
    /// Creates, funds and registers a pool. `deterministic_id` is the id of the
    /// transaction carrying the command; the pool id is derived from it.
    pub fn submit_amm(
        &mut self,
        submit: &SubmitAmm,
        deterministic_id: &str,
        risk: &RiskInputs,
    ) -> Result<PoolId, EngineError> {
        let pool_id = PoolId::new(IdGenerator::new(deterministic_id.as_bytes()).next_id());
        let sub_account = derive_amm_party(&submit.party, &self.market.id, SUB_ACCOUNT_INDEX);

        match self.create_pool(submit, pool_id.clone(), sub_account.clone(), risk) {
            Ok(()) => Ok(pool_id),
            Err(err) => {
                warn!(party = %submit.party, pool = %pool_id, error = %err, "amm submission rejected");
                let event = AmmPoolEvent {
                    party: submit.party.clone(),
                    market: self.market.id.clone(),
                    sub_account,
                    pool_id,
                    commitment: submit.commitment,
                    parameters: submit.parameters.clone(),
                    status: PoolStatus::Rejected,
                    reason: err.status_reason(),
                    proposed_fee: submit.proposed_fee,
                    lower_curve: None,
                    upper_curve: None,
                };
                self.emit_event(EventPayload::AmmPool(event));
                Err(err)
            }
        }
    }

    fn create_pool(
        &mut self,
        submit: &SubmitAmm,
        pool_id: PoolId,
        sub_account: PartyId,
        risk: &RiskInputs,
    ) -> Result<(), EngineError> {
        if self.pool(&submit.party).is_some() {
            return Err(EngineError::PartyAlreadyOwnsAPool(self.market.id.clone()));
        }
        submit.parameters.validate()?;
        self.ensure_commitment_amount(&submit.party, &sub_account, submit.commitment)?;

        let asset = self.market.settlement_asset.clone();
        self.collateral
            .create_party_amm_sub_accounts(&submit.party, &sub_account, &asset, &self.market.id)?;

        let pool = Pool::new(
            pool_id,
            sub_account,
            submit,
            &self.market,
            risk,
            Rc::clone(&self.sqrt),
            self.config.pool_limits(),
        )?;

        // a fresh pool holding a position means an earlier one left without unwinding
        let pos = self.position_of(pool.sub_account());
        if pos != 0 {
            panic!("AMM {} has position {} before existing", pool.sub_account(), pos);
        }

        self.update_sub_account_balance(&submit.party, pool.sub_account(), submit.commitment)?;

        info!(owner = %submit.party, pool = %pool.id(), market = %self.market.id, "amm created");
        self.emit_pool_event(&pool, StatusReason::Unspecified);
        self.add(pool);
        Ok(())
    }

    /// Rebuilds the party's pool with the amendment applied and refunds or tops up
    /// the sub-account to the new commitment. On failure the old pool stays as it was.
    pub fn amend_amm(&mut self, amend: &AmendAmm, risk: &RiskInputs) -> Result<(), EngineError> {
        match self.try_amend(amend, risk) {
            Ok(updated) => {
                info!(owner = %amend.party, pool = %updated.id(), "amm amended");
                self.emit_pool_event(&updated, StatusReason::Unspecified);
                if let Some(slot) = self.pool_mut(&amend.party) {
                    *slot = updated;
                }
                Ok(())
            }
            Err(err) => {
                warn!(owner = %amend.party, error = %err, "amm amendment rejected");
                if let Some(pool) = self.pool(&amend.party) {
                    let mut event = AmmPoolEvent::from_pool(pool, err.status_reason());
                    event.status = PoolStatus::Rejected;
                    self.emit_event(EventPayload::AmmPool(event));
                }
                Err(err)
            }
        }
    }

    fn try_amend(&mut self, amend: &AmendAmm, risk: &RiskInputs) -> Result<Pool, EngineError> {
        let sub_account = self.get_amm_party(&amend.party)?;

        if let Some(parameters) = &amend.parameters {
            parameters.validate()?;
        }
        if let Some(commitment) = amend.commitment {
            self.ensure_commitment_amount(&amend.party, &sub_account, commitment)?;
        }

        let updated = self
            .pool(&amend.party)
            .ok_or(EngineError::NoPoolMatchingParty)?
            .update(amend, risk)?;

        self.update_sub_account_balance(&amend.party, &sub_account, updated.commitment())?;
        Ok(updated)
    }

    pub fn cancel_amm(&mut self, cancel: &CancelAmm) -> Result<(), EngineError> {
        let pool = self
            .pool_mut(&cancel.party)
            .ok_or(EngineError::NoPoolMatchingParty)?;

        match cancel.method {
            CancellationMethod::ReduceOnly => {
                pool.set_status(PoolStatus::ReduceOnly);
                let event = AmmPoolEvent::from_pool(pool, StatusReason::CancelledByParty);
                info!(owner = %cancel.party, "amm reduce-only");
                self.emit_event(EventPayload::AmmPool(event));
            }
            CancellationMethod::Immediate => {
                let sub_account = pool.sub_account().clone();
                self.release_sub_accounts(&cancel.party, &sub_account, false)?;
                self.set_status(&cancel.party, PoolStatus::Cancelled);
                self.remove(&cancel.party, StatusReason::CancelledByParty);
                info!(owner = %cancel.party, "amm cancelled");
            }
        }
        Ok(())
    }

    /// Start of block: reseeds order ids, stops pools left with nothing to trade with
    /// and removes reduce-only pools that are back to flat.
    pub fn on_tick(&mut self, time: Timestamp, block_hash: &str) {
        self.current_time = time;
        self.idgen = IdGenerator::for_block(block_hash, &self.market.id);

        let empty: Vec<PartyId> = self
            .pools
            .iter()
            .filter(|p| self.sub_account_balance(p.sub_account()).is_zero())
            .map(|p| p.owner().clone())
            .collect();
        for owner in empty {
            warn!(owner = %owner, "amm stopped: sub-account balance is zero");
            self.set_status(&owner, PoolStatus::Stopped);
            self.remove(&owner, StatusReason::Unspecified);
        }

        self.sweep_reduce_only();
    }

    /// Mark-to-market happened; flat reduce-only pools can go.
    pub fn on_mtm(&mut self) {
        self.sweep_reduce_only();
    }

    fn sweep_reduce_only(&mut self) {
        let done: Vec<(PartyId, PartyId)> = self
            .pools
            .iter()
            .filter(|p| p.is_closing() && self.position_of(p.sub_account()) == 0)
            .map(|p| (p.owner().clone(), p.sub_account().clone()))
            .collect();

        for (owner, sub_account) in done {
            if let Err(err) = self.release_sub_accounts(&owner, &sub_account, false) {
                error!(owner = %owner, error = %err, "unable to release sub-account balance");
            }
            self.set_status(&owner, PoolStatus::Cancelled);
            self.remove(&owner, StatusReason::CancelledByParty);
            info!(owner = %owner, "reduce-only amm reached zero position");
        }
    }

    /// Stops the pools of any closed out sub-accounts.
    pub fn remove_distressed(&mut self, closed: &[MarketPosition]) {
        for position in closed {
            let owner = match self.amm_parties.get(&position.party) {
                Some(owner) => owner.clone(),
                None => continue,
            };
            if self.pool(&owner).is_none() {
                panic!("no pool for owner {} of sub-account {}", owner, position.party);
            }
            self.set_status(&owner, PoolStatus::Stopped);
            self.remove(&owner, StatusReason::PartyClosedOut);
            warn!(owner = %owner, "amm closed out");
        }
    }

    /// Administrative stop, keyed by sub-account.
    pub fn stop_pool(&mut self, sub_account: &PartyId) -> Result<(), EngineError> {
        let owner = self
            .amm_parties
            .get(sub_account)
            .cloned()
            .ok_or(EngineError::NoPoolMatchingParty)?;
        self.set_status(&owner, PoolStatus::Stopped);
        self.remove(&owner, StatusReason::Unspecified);
        Ok(())
    }

    /// Returns every sub-account balance to its owner and stops all pools.
    pub fn market_closing(&mut self) -> Result<(), EngineError> {
        let pools: Vec<(PartyId, PartyId)> = self
            .pools
            .iter()
            .map(|p| (p.owner().clone(), p.sub_account().clone()))
            .collect();

        for (owner, sub_account) in pools {
            self.release_sub_accounts(&owner, &sub_account, true)?;
            self.set_status(&owner, PoolStatus::Stopped);
            if let Some(pool) = self.pool(&owner) {
                let event = AmmPoolEvent::from_pool(pool, StatusReason::MarketClosed);
                self.emit_event(EventPayload::AmmPool(event));
            }
        }

        info!(market = %self.market.id, pools = self.pools.len(), "market closing, amms stopped");
        self.pools.clear();
        self.amm_parties.clear();
        Ok(())
    }

    pub fn on_min_commitment_quantum_update(&mut self, quantum: Decimal) {
        self.config.min_commitment_quantum = quantum;
    }

    pub fn on_max_calculation_levels_update(&mut self, levels: u64) {
        self.config.max_calculation_levels = levels;
        for pool in &mut self.pools {
            pool.set_max_calculation_levels(levels);
        }
    }

    pub fn update_allowed_empty_levels(&mut self, levels: u64) {
        self.config.allowed_empty_levels = levels;
        for pool in &mut self.pools {
            pool.set_allowed_empty_levels(levels);
        }
    }

    fn set_status(&mut self, owner: &PartyId, status: PoolStatus) {
        if let Some(pool) = self.pool_mut(owner) {
            pool.set_status(status);
        }
    }
}

// 8.3 engine/funding.rs: keeps a pool's sub-account balance in line with its
// commitment. one transfer per reconciliation, never more.

use super::core::Engine;
use super::results::EngineError;
use crate::collateral::{Collateral, LedgerMovement, TransferType};
use crate::events::{EventPayload, LedgerMovementsEvent};
use crate::position::{MarketPosition, PositionProvider};
use crate::types::{PartyId, Quote};
use tracing::debug;

impl<C: Collateral, P: PositionProvider> Engine<C, P> {
    /// Checks a commitment clears the quantum minimum and that the party, together
    /// with whatever the sub-account already holds, can fund it.
    pub(super) fn ensure_commitment_amount(
        &self,
        party: &PartyId,
        sub_account: &PartyId,
        commitment: Quote,
    ) -> Result<(), EngineError> {
        let asset = &self.market.settlement_asset;
        let quantum = self.collateral.asset_quantum(asset)?;
        if quantum.is_zero() || commitment.value() / quantum < self.config.min_commitment_quantum {
            return Err(EngineError::CommitmentTooLow);
        }

        // missing accounts simply hold nothing yet
        let available: Quote = [
            self.collateral.party_margin_account(&self.market.id, sub_account, asset),
            self.collateral.party_general_account(sub_account, asset),
            self.collateral.party_general_account(party, asset),
        ]
        .into_iter()
        .filter_map(Result::ok)
        .map(|a| a.balance)
        .sum();

        if available < commitment {
            return Err(EngineError::InsufficientFunds {
                required: commitment,
                available,
            });
        }
        Ok(())
    }

    /// Moves funds so the sub-account's margin plus general balance equals `target`.
    /// Returns the balance before the move.
    ///
    /// # Panics
    ///
    /// If the sub-accounts do not exist. They are created before any pool is funded.
    pub fn update_sub_account_balance(
        &mut self,
        party: &PartyId,
        sub_account: &PartyId,
        target: Quote,
    ) -> Result<Quote, EngineError> {
        let asset = self.market.settlement_asset.clone();
        let market = self.market.id.clone();

        let margin = self
            .collateral
            .party_margin_account(&market, sub_account, &asset)
            .unwrap_or_else(|e| panic!("no sub margin account for {}: {}", sub_account, e));
        let general = self
            .collateral
            .party_general_account(sub_account, &asset)
            .unwrap_or_else(|e| panic!("no sub general account for {}: {}", sub_account, e));

        let current = margin.balance.add(general.balance);
        let (transfer_type, amount) = if current < target {
            (TransferType::AmmLow, target.sub(current))
        } else if current > target {
            (TransferType::AmmHigh, current.sub(target))
        } else {
            return Ok(current);
        };

        let movement = self
            .collateral
            .sub_account_update(party, sub_account, &asset, &market, transfer_type, amount)?;
        debug!(party = %party, sub_account = %sub_account, ?transfer_type, amount = %amount, "sub-account rebalanced");
        self.emit_ledger_movements(vec![movement]);

        Ok(current)
    }

    /// Hands the sub-account's balance back to the owner. On market close margin goes
    /// too; otherwise it stays while the sub-account still holds a position.
    pub(super) fn release_sub_accounts(
        &mut self,
        owner: &PartyId,
        sub_account: &PartyId,
        market_closing: bool,
    ) -> Result<(), EngineError> {
        let asset = self.market.settlement_asset.clone();
        let market = self.market.id.clone();

        let movements = if market_closing {
            self.collateral
                .sub_account_closed(owner, sub_account, &asset, &market)?
        } else {
            // a pool cancelled right after creation has no position yet
            let position = self
                .market_position(sub_account)
                .unwrap_or_else(|| MarketPosition::flat(sub_account.clone()));
            self.collateral
                .sub_account_release(owner, sub_account, &asset, &market, Some(&position))?
        };

        self.emit_ledger_movements(movements);
        Ok(())
    }

    /// Sub-account margin plus general balance; zero if either account is missing.
    pub(super) fn sub_account_balance(&self, sub_account: &PartyId) -> Quote {
        let asset = &self.market.settlement_asset;
        let margin = self
            .collateral
            .party_margin_account(&self.market.id, sub_account, asset)
            .map_or(Quote::zero(), |a| a.balance);
        let general = self
            .collateral
            .party_general_account(sub_account, asset)
            .map_or(Quote::zero(), |a| a.balance);
        margin.add(general)
    }

    fn emit_ledger_movements(&mut self, movements: Vec<LedgerMovement>) {
        self.emit_event(EventPayload::LedgerMovements(LedgerMovementsEvent { movements }));
    }
}

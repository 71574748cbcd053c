//! Collateral accounts behind AMM sub-accounts.
//!
//! The engine never touches balances directly. It asks a [`Collateral`]
//! implementation to move funds between a party's general account and the
//! general account of the pool's sub-account, and publishes the resulting
//! ledger movements. [`Ledger`] is the in-memory implementation.

use crate::position::MarketPosition;
use crate::types::{AssetId, MarketId, PartyId, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    General,
    Margin,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::General => f.write_str("general"),
            AccountType::Margin => f.write_str("margin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub owner: PartyId,
    pub account_type: AccountType,
    pub asset: AssetId,
    /// margin accounts are per market, general accounts are not
    pub market: Option<MarketId>,
    pub balance: Quote,
}

impl Account {
    fn new(owner: PartyId, account_type: AccountType, asset: AssetId, market: Option<MarketId>) -> Self {
        Self {
            owner,
            account_type,
            asset,
            market,
            balance: Quote::zero(),
        }
    }

    fn credit(&mut self, amount: Quote) {
        self.balance = self.balance.add(amount);
    }

    fn debit(&mut self, amount: Quote) -> Result<(), CollateralError> {
        if amount > self.balance {
            return Err(CollateralError::InsufficientBalance {
                owner: self.owner.clone(),
                account_type: self.account_type,
                requested: amount,
                available: self.balance,
            });
        }
        self.balance = self.balance.sub(amount);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferType {
    /// party general -> sub-account general, the pool is below its commitment
    AmmLow,
    /// sub-account general -> party general, the pool is above its commitment
    AmmHigh,
    /// everything back to the party when a pool is cancelled
    AmmRelease,
    /// everything back to the party when the market closes
    AmmClose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub from: PartyId,
    pub from_account: AccountType,
    pub to: PartyId,
    pub to_account: AccountType,
    pub amount: Quote,
    pub transfer_type: TransferType,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LedgerMovement {
    pub entries: Vec<LedgerEntry>,
}

impl LedgerMovement {
    pub fn total(&self) -> Quote {
        self.entries.iter().map(|e| e.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollateralError {
    #[error("asset {0} is not enabled")]
    UnknownAsset(AssetId),

    #[error("no {account_type} account for {owner} in {asset}")]
    AccountNotFound {
        owner: PartyId,
        account_type: AccountType,
        asset: AssetId,
    },

    #[error("insufficient balance in {owner} {account_type} account: requested {requested}, available {available}")]
    InsufficientBalance {
        owner: PartyId,
        account_type: AccountType,
        requested: Quote,
        available: Quote,
    },
}

/// The collateral engine, as far as AMM pools need it.
pub trait Collateral {
    fn asset_quantum(&self, asset: &AssetId) -> Result<Decimal, CollateralError>;

    fn party_margin_account(&self, market: &MarketId, party: &PartyId, asset: &AssetId)
        -> Result<Account, CollateralError>;

    fn party_general_account(&self, party: &PartyId, asset: &AssetId) -> Result<Account, CollateralError>;

    /// Returns (general, margin). Existing accounts are returned as they are.
    fn create_party_amm_sub_accounts(
        &mut self,
        party: &PartyId,
        sub_account: &PartyId,
        asset: &AssetId,
        market: &MarketId,
    ) -> Result<(Account, Account), CollateralError>;

    fn sub_account_update(
        &mut self,
        party: &PartyId,
        sub_account: &PartyId,
        asset: &AssetId,
        market: &MarketId,
        transfer_type: TransferType,
        amount: Quote,
    ) -> Result<LedgerMovement, CollateralError>;

    /// Returns the sub-account's general balance to the party. Margin follows only
    /// once the sub-account holds no position.
    fn sub_account_release(
        &mut self,
        party: &PartyId,
        sub_account: &PartyId,
        asset: &AssetId,
        market: &MarketId,
        position: Option<&MarketPosition>,
    ) -> Result<Vec<LedgerMovement>, CollateralError>;

    /// Returns everything the sub-account holds to the party.
    fn sub_account_closed(
        &mut self,
        party: &PartyId,
        sub_account: &PartyId,
        asset: &AssetId,
        market: &MarketId,
    ) -> Result<Vec<LedgerMovement>, CollateralError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AccountKey {
    owner: PartyId,
    account_type: AccountType,
    asset: AssetId,
    market: Option<MarketId>,
}

impl AccountKey {
    fn general(owner: &PartyId, asset: &AssetId) -> Self {
        Self {
            owner: owner.clone(),
            account_type: AccountType::General,
            asset: asset.clone(),
            market: None,
        }
    }

    fn margin(owner: &PartyId, asset: &AssetId, market: &MarketId) -> Self {
        Self {
            owner: owner.clone(),
            account_type: AccountType::Margin,
            asset: asset.clone(),
            market: Some(market.clone()),
        }
    }
}

/// In-memory collateral engine.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    quantums: HashMap<AssetId, Decimal>,
    accounts: HashMap<AccountKey, Account>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_asset(&mut self, asset: AssetId, quantum: Decimal) {
        self.quantums.insert(asset, quantum);
    }

    pub fn deposit(&mut self, party: &PartyId, asset: &AssetId, amount: Quote) {
        self.account_mut_or_create(AccountKey::general(party, asset)).credit(amount);
    }

    /// Moves funds from a party's general account into its margin account.
    pub fn post_margin(
        &mut self,
        party: &PartyId,
        asset: &AssetId,
        market: &MarketId,
        amount: Quote,
    ) -> Result<(), CollateralError> {
        self.account_mut(&AccountKey::general(party, asset))?.debit(amount)?;
        self.account_mut_or_create(AccountKey::margin(party, asset, market)).credit(amount);
        Ok(())
    }

    pub fn general_balance(&self, party: &PartyId, asset: &AssetId) -> Quote {
        self.accounts
            .get(&AccountKey::general(party, asset))
            .map_or(Quote::zero(), |a| a.balance)
    }

    pub fn margin_balance(&self, party: &PartyId, asset: &AssetId, market: &MarketId) -> Quote {
        self.accounts
            .get(&AccountKey::margin(party, asset, market))
            .map_or(Quote::zero(), |a| a.balance)
    }

    fn account(&self, key: &AccountKey) -> Result<&Account, CollateralError> {
        self.accounts.get(key).ok_or_else(|| CollateralError::AccountNotFound {
            owner: key.owner.clone(),
            account_type: key.account_type,
            asset: key.asset.clone(),
        })
    }

    fn account_mut(&mut self, key: &AccountKey) -> Result<&mut Account, CollateralError> {
        self.accounts.get_mut(key).ok_or_else(|| CollateralError::AccountNotFound {
            owner: key.owner.clone(),
            account_type: key.account_type,
            asset: key.asset.clone(),
        })
    }

    fn account_mut_or_create(&mut self, key: AccountKey) -> &mut Account {
        self.accounts.entry(key.clone()).or_insert_with(|| {
            Account::new(key.owner, key.account_type, key.asset, key.market)
        })
    }

    fn transfer(
        &mut self,
        from: &AccountKey,
        to: &AccountKey,
        amount: Quote,
        transfer_type: TransferType,
    ) -> Result<LedgerEntry, CollateralError> {
        // both ends must exist before anything moves
        self.account(to)?;
        self.account_mut(from)?.debit(amount)?;
        self.account_mut(to)?.credit(amount);
        Ok(LedgerEntry {
            from: from.owner.clone(),
            from_account: from.account_type,
            to: to.owner.clone(),
            to_account: to.account_type,
            amount,
            transfer_type,
        })
    }

    // sweeps one sub-account account into the party's general account
    fn sweep(
        &mut self,
        from: &AccountKey,
        to: &AccountKey,
        transfer_type: TransferType,
    ) -> Result<Option<LedgerEntry>, CollateralError> {
        let balance = match self.accounts.get(from) {
            Some(account) => account.balance,
            None => return Ok(None),
        };
        if balance.is_zero() {
            return Ok(None);
        }
        self.transfer(from, to, balance, transfer_type).map(Some)
    }
}

impl Collateral for Ledger {
    fn asset_quantum(&self, asset: &AssetId) -> Result<Decimal, CollateralError> {
        self.quantums
            .get(asset)
            .copied()
            .ok_or_else(|| CollateralError::UnknownAsset(asset.clone()))
    }

    fn party_margin_account(
        &self,
        market: &MarketId,
        party: &PartyId,
        asset: &AssetId,
    ) -> Result<Account, CollateralError> {
        self.account(&AccountKey::margin(party, asset, market)).cloned()
    }

    fn party_general_account(&self, party: &PartyId, asset: &AssetId) -> Result<Account, CollateralError> {
        self.account(&AccountKey::general(party, asset)).cloned()
    }

    fn create_party_amm_sub_accounts(
        &mut self,
        _party: &PartyId,
        sub_account: &PartyId,
        asset: &AssetId,
        market: &MarketId,
    ) -> Result<(Account, Account), CollateralError> {
        self.asset_quantum(asset)?;
        let general = self.account_mut_or_create(AccountKey::general(sub_account, asset)).clone();
        let margin = self
            .account_mut_or_create(AccountKey::margin(sub_account, asset, market))
            .clone();
        Ok((general, margin))
    }

    fn sub_account_update(
        &mut self,
        party: &PartyId,
        sub_account: &PartyId,
        asset: &AssetId,
        _market: &MarketId,
        transfer_type: TransferType,
        amount: Quote,
    ) -> Result<LedgerMovement, CollateralError> {
        let owner = AccountKey::general(party, asset);
        let sub = AccountKey::general(sub_account, asset);

        let entry = match transfer_type {
            TransferType::AmmLow => self.transfer(&owner, &sub, amount, transfer_type)?,
            _ => self.transfer(&sub, &owner, amount, transfer_type)?,
        };
        Ok(LedgerMovement { entries: vec![entry] })
    }

    fn sub_account_release(
        &mut self,
        party: &PartyId,
        sub_account: &PartyId,
        asset: &AssetId,
        market: &MarketId,
        position: Option<&MarketPosition>,
    ) -> Result<Vec<LedgerMovement>, CollateralError> {
        let owner = AccountKey::general(party, asset);
        let mut movement = LedgerMovement::default();

        if let Some(entry) = self.sweep(&AccountKey::general(sub_account, asset), &owner, TransferType::AmmRelease)? {
            movement.entries.push(entry);
        }

        // an open position still needs its margin
        let flat = position.map_or(true, MarketPosition::is_empty);
        if flat {
            let margin = AccountKey::margin(sub_account, asset, market);
            if let Some(entry) = self.sweep(&margin, &owner, TransferType::AmmRelease)? {
                movement.entries.push(entry);
            }
        }

        Ok(vec![movement])
    }

    fn sub_account_closed(
        &mut self,
        party: &PartyId,
        sub_account: &PartyId,
        asset: &AssetId,
        market: &MarketId,
    ) -> Result<Vec<LedgerMovement>, CollateralError> {
        let owner = AccountKey::general(party, asset);
        let mut movement = LedgerMovement::default();
        for from in [
            AccountKey::general(sub_account, asset),
            AccountKey::margin(sub_account, asset, market),
        ] {
            if let Some(entry) = self.sweep(&from, &owner, TransferType::AmmClose)? {
                movement.entries.push(entry);
            }
        }
        Ok(vec![movement])
    }
}

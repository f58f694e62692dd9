// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Durable record of accounts and transactions.
//!
//! The [`Ledger`] owns the account map and the transaction log and exposes
//! the request-submission flow:
//!
//! - **Deposits** are recorded `pending` with no balance effect; funds are
//!   only credited when an administrator approves the transaction.
//! - **Withdrawals** debit the account at submission time. A pending
//!   withdrawal represents already-escrowed funds; rejecting it refunds
//!   the debit.
//! - **Investments** and **gains** are recorded already `completed` and
//!   mutate the balance through the same credit/debit primitive as
//!   settlement.
//!
//! # Thread Safety
//!
//! Accounts and transactions live in [`DashMap`]s, allowing submissions and
//! settlements to proceed in parallel across accounts. Duplicate transaction
//! IDs are rejected with an atomic check-and-insert.

use crate::account::{Account, Profile};
use crate::base::{AccountId, TransactionId};
use crate::error::SettlementError;
use crate::payment::PaymentDetails;
use crate::transaction::{Transaction, TransactionKind, TransactionStatus};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Account balances and the transaction log.
///
/// # Invariants
///
/// - Transaction IDs are globally unique across all transaction kinds.
/// - Account balances never go negative; every mutation goes through
///   [`Ledger::atomic_credit`] or [`Ledger::atomic_debit`].
/// - A recorded transaction is never removed.
pub struct Ledger {
    /// Accounts indexed by account ID.
    accounts: DashMap<AccountId, Account>,
    /// Transaction log, also used for duplicate-ID detection.
    transactions: DashMap<TransactionId, Arc<Transaction>>,
    /// Referral codes, each mapping back to the owning account.
    codes: DashMap<String, AccountId>,
    /// Next candidate ID for internally-created rows (commission audit).
    next_internal_id: AtomicU32,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            accounts: DashMap::new(),
            transactions: DashMap::new(),
            codes: DashMap::new(),
            next_internal_id: AtomicU32::new(1),
        }
    }

    /// Registers a new account with a zero balance.
    ///
    /// # Errors
    ///
    /// [`SettlementError::AccountExists`] if the ID is already registered.
    pub fn open_account(
        &self,
        account_id: AccountId,
        profile: Profile,
    ) -> Result<(), SettlementError> {
        match self.accounts.entry(account_id) {
            Entry::Occupied(_) => Err(SettlementError::AccountExists),
            Entry::Vacant(entry) => {
                entry.insert(Account::new(account_id, profile));
                Ok(())
            }
        }
    }

    /// Assigns a unique referral code to an account.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::AccountNotFound`] if the account does not exist.
    /// - [`SettlementError::CodeTaken`] if another account already owns the code.
    pub fn set_referral_code(
        &self,
        account_id: AccountId,
        code: impl Into<String>,
    ) -> Result<(), SettlementError> {
        let code = code.into();
        let account = self
            .accounts
            .get(&account_id)
            .ok_or(SettlementError::AccountNotFound)?;
        match self.codes.entry(code.clone()) {
            Entry::Occupied(entry) if *entry.get() != account_id => {
                Err(SettlementError::CodeTaken)
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(account_id);
                account.set_referral_code(code);
                Ok(())
            }
        }
    }

    /// Resolves a referral code to the owning account.
    pub fn account_by_code(&self, code: &str) -> Option<AccountId> {
        self.codes.get(code).map(|entry| *entry.value())
    }

    /// Atomically credits an account and returns the new balance.
    pub fn atomic_credit(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Decimal, SettlementError> {
        self.accounts
            .get(&account_id)
            .ok_or(SettlementError::AccountNotFound)?
            .credit(amount)
    }

    /// Atomically debits an account and returns the new balance.
    ///
    /// Fails with [`SettlementError::InsufficientFunds`] when the balance is
    /// below `amount`; the balance is left untouched.
    pub fn atomic_debit(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Decimal, SettlementError> {
        self.accounts
            .get(&account_id)
            .ok_or(SettlementError::AccountNotFound)?
            .debit(amount)
    }

    pub fn balance(&self, account_id: AccountId) -> Result<Decimal, SettlementError> {
        Ok(self
            .accounts
            .get(&account_id)
            .ok_or(SettlementError::AccountNotFound)?
            .balance())
    }

    pub fn profile(&self, account_id: AccountId) -> Result<Profile, SettlementError> {
        Ok(self
            .accounts
            .get(&account_id)
            .ok_or(SettlementError::AccountNotFound)?
            .profile())
    }

    /// Records a `pending` deposit request. No balance effect: deposits are
    /// uncommitted until an administrator approves them.
    pub fn submit_deposit(
        &self,
        transaction_id: TransactionId,
        account_id: AccountId,
        amount: Decimal,
        details: Option<PaymentDetails>,
    ) -> Result<(), SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount);
        }
        if !self.accounts.contains_key(&account_id) {
            return Err(SettlementError::AccountNotFound);
        }
        let description = match &details {
            Some(d) => format!("Deposit request via {d}"),
            None => "Deposit request".to_string(),
        };
        match self.transactions.entry(transaction_id) {
            Entry::Occupied(_) => Err(SettlementError::DuplicateTransaction),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Transaction::new(
                    transaction_id,
                    account_id,
                    TransactionKind::Deposit,
                    amount,
                    TransactionStatus::Pending,
                    description,
                    details,
                )));
                Ok(())
            }
        }
    }

    /// Records a `pending` withdrawal request, debiting the account at
    /// submission time so the pending row represents escrowed funds.
    ///
    /// # Errors
    ///
    /// [`SettlementError::InsufficientFunds`] if the balance cannot cover
    /// the escrow; nothing is recorded in that case.
    pub fn submit_withdrawal(
        &self,
        transaction_id: TransactionId,
        account_id: AccountId,
        amount: Decimal,
        details: Option<PaymentDetails>,
    ) -> Result<Decimal, SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount);
        }
        let description = match &details {
            Some(d) => format!("Withdrawal request via {d}"),
            None => "Withdrawal request".to_string(),
        };
        // Reserve the ID before touching the balance so a duplicate
        // submission cannot double-debit.
        match self.transactions.entry(transaction_id) {
            Entry::Occupied(_) => Err(SettlementError::DuplicateTransaction),
            Entry::Vacant(entry) => {
                let new_balance = self.atomic_debit(account_id, amount)?;
                entry.insert(Arc::new(Transaction::new(
                    transaction_id,
                    account_id,
                    TransactionKind::Withdrawal,
                    amount,
                    TransactionStatus::Pending,
                    description,
                    details,
                )));
                Ok(new_balance)
            }
        }
    }

    /// Debits an account and records a `completed` investment transaction.
    ///
    /// Investments never pass through settlement; the debit happens here,
    /// through the same primitive the settlement engine uses.
    pub fn record_investment(
        &self,
        transaction_id: TransactionId,
        account_id: AccountId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Decimal, SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount);
        }
        match self.transactions.entry(transaction_id) {
            Entry::Occupied(_) => Err(SettlementError::DuplicateTransaction),
            Entry::Vacant(entry) => {
                let new_balance = self.atomic_debit(account_id, amount)?;
                entry.insert(Arc::new(Transaction::new(
                    transaction_id,
                    account_id,
                    TransactionKind::Investment,
                    amount,
                    TransactionStatus::Completed,
                    description.into(),
                    None,
                )));
                Ok(new_balance)
            }
        }
    }

    /// Credits an account and records a `completed` gain transaction
    /// (plan maturity payouts).
    pub fn record_gain(
        &self,
        transaction_id: TransactionId,
        account_id: AccountId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Decimal, SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount);
        }
        match self.transactions.entry(transaction_id) {
            Entry::Occupied(_) => Err(SettlementError::DuplicateTransaction),
            Entry::Vacant(entry) => {
                let new_balance = self.atomic_credit(account_id, amount)?;
                entry.insert(Arc::new(Transaction::new(
                    transaction_id,
                    account_id,
                    TransactionKind::Gain,
                    amount,
                    TransactionStatus::Completed,
                    description.into(),
                    None,
                )));
                Ok(new_balance)
            }
        }
    }

    /// Records an already-settled row with an internally-allocated ID.
    ///
    /// Used for commission audit transactions. The candidate counter skips
    /// over caller-supplied IDs via the vacant-entry loop, so allocation
    /// can never collide.
    pub(crate) fn append_settled(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        description: String,
    ) -> TransactionId {
        loop {
            let candidate =
                TransactionId(self.next_internal_id.fetch_add(1, Ordering::Relaxed));
            match self.transactions.entry(candidate) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(Transaction::new(
                        candidate,
                        account_id,
                        kind,
                        amount,
                        TransactionStatus::Completed,
                        description,
                        None,
                    )));
                    return candidate;
                }
            }
        }
    }

    /// Retrieves a transaction by ID.
    pub fn transaction(&self, transaction_id: TransactionId) -> Option<Arc<Transaction>> {
        self.transactions
            .get(&transaction_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns an iterator over all accounts.
    ///
    /// Useful for generating output reports of account states.
    pub fn accounts(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, AccountId, Account>> {
        self.accounts.iter()
    }

    /// Returns an iterator over the full transaction log.
    pub fn transactions(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, TransactionId, Arc<Transaction>>>
    {
        self.transactions.iter()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn open_account_rejects_duplicate_id() {
        let ledger = Ledger::new();
        ledger.open_account(AccountId(1), Profile::default()).unwrap();
        assert_eq!(
            ledger.open_account(AccountId(1), Profile::default()),
            Err(SettlementError::AccountExists)
        );
    }

    #[test]
    fn referral_codes_are_unique() {
        let ledger = Ledger::new();
        ledger.open_account(AccountId(1), Profile::default()).unwrap();
        ledger.open_account(AccountId(2), Profile::default()).unwrap();

        ledger.set_referral_code(AccountId(1), "INV-AAA").unwrap();
        assert_eq!(
            ledger.set_referral_code(AccountId(2), "INV-AAA"),
            Err(SettlementError::CodeTaken)
        );
        assert_eq!(ledger.account_by_code("INV-AAA"), Some(AccountId(1)));
        assert_eq!(ledger.account_by_code("INV-ZZZ"), None);
    }

    #[test]
    fn deposit_submission_has_no_balance_effect() {
        let ledger = Ledger::new();
        ledger.open_account(AccountId(1), Profile::default()).unwrap();

        ledger
            .submit_deposit(TransactionId(1), AccountId(1), dec!(100.00), None)
            .unwrap();

        assert_eq!(ledger.balance(AccountId(1)), Ok(Decimal::ZERO));
        let tx = ledger.transaction(TransactionId(1)).unwrap();
        assert_eq!(tx.status(), TransactionStatus::Pending);
        assert_eq!(tx.kind(), TransactionKind::Deposit);
    }

    #[test]
    fn withdrawal_submission_escrows_funds() {
        let ledger = Ledger::new();
        ledger.open_account(AccountId(1), Profile::default()).unwrap();
        ledger.atomic_credit(AccountId(1), dec!(100.00)).unwrap();

        let new_balance = ledger
            .submit_withdrawal(TransactionId(1), AccountId(1), dec!(30.00), None)
            .unwrap();

        assert_eq!(new_balance, dec!(70.00));
        assert_eq!(ledger.balance(AccountId(1)), Ok(dec!(70.00)));
        let tx = ledger.transaction(TransactionId(1)).unwrap();
        assert_eq!(tx.status(), TransactionStatus::Pending);
    }

    #[test]
    fn withdrawal_submission_insufficient_records_nothing() {
        let ledger = Ledger::new();
        ledger.open_account(AccountId(1), Profile::default()).unwrap();
        ledger.atomic_credit(AccountId(1), dec!(20.00)).unwrap();

        let result =
            ledger.submit_withdrawal(TransactionId(1), AccountId(1), dec!(50.00), None);
        assert_eq!(result, Err(SettlementError::InsufficientFunds));
        assert_eq!(ledger.balance(AccountId(1)), Ok(dec!(20.00)));
        assert!(ledger.transaction(TransactionId(1)).is_none());
    }

    #[test]
    fn duplicate_transaction_id_rejected() {
        let ledger = Ledger::new();
        ledger.open_account(AccountId(1), Profile::default()).unwrap();

        ledger
            .submit_deposit(TransactionId(1), AccountId(1), dec!(10.00), None)
            .unwrap();
        assert_eq!(
            ledger.submit_deposit(TransactionId(1), AccountId(1), dec!(10.00), None),
            Err(SettlementError::DuplicateTransaction)
        );
    }

    #[test]
    fn investment_debits_and_records_completed() {
        let ledger = Ledger::new();
        ledger.open_account(AccountId(1), Profile::default()).unwrap();
        ledger.atomic_credit(AccountId(1), dec!(500.00)).unwrap();

        let new_balance = ledger
            .record_investment(TransactionId(1), AccountId(1), dec!(200.00), "Starter plan")
            .unwrap();
        assert_eq!(new_balance, dec!(300.00));

        let tx = ledger.transaction(TransactionId(1)).unwrap();
        assert_eq!(tx.kind(), TransactionKind::Investment);
        assert_eq!(tx.status(), TransactionStatus::Completed);
    }

    #[test]
    fn gain_credits_and_records_completed() {
        let ledger = Ledger::new();
        ledger.open_account(AccountId(1), Profile::default()).unwrap();

        let new_balance = ledger
            .record_gain(TransactionId(1), AccountId(1), dec!(42.50), "Starter plan payout")
            .unwrap();
        assert_eq!(new_balance, dec!(42.50));
        assert_eq!(
            ledger.transaction(TransactionId(1)).unwrap().kind(),
            TransactionKind::Gain
        );
    }

    #[test]
    fn internal_ids_skip_occupied_slots() {
        let ledger = Ledger::new();
        ledger.open_account(AccountId(1), Profile::default()).unwrap();
        // Caller takes IDs 1 and 2.
        ledger
            .submit_deposit(TransactionId(1), AccountId(1), dec!(10.00), None)
            .unwrap();
        ledger
            .submit_deposit(TransactionId(2), AccountId(1), dec!(10.00), None)
            .unwrap();

        let id = ledger.append_settled(
            AccountId(1),
            TransactionKind::Commission,
            dec!(1.00),
            "test".to_string(),
        );
        assert_eq!(id, TransactionId(3));
    }
}

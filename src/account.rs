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

//! Account management.
//!
//! The account balance is the single most contended shared resource in the
//! ledger. Every mutation path (deposit completion, withdrawal escrow and
//! refund, investment debit, gain and commission credit) funnels through
//! [`Account::credit`] and [`Account::debit`], which perform the
//! read-modify-write under one lock.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use settlement_rs::{Account, AccountId, Profile};
//!
//! let account = Account::new(AccountId(1), Profile::default());
//! assert_eq!(account.balance(), dec!(0.00));
//! ```

use crate::base::AccountId;
use crate::error::SettlementError;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Contact details used when emitting settlement notices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl Profile {
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            full_name: None,
        }
    }
}

#[derive(Debug)]
struct AccountData {
    account_id: AccountId,
    balance: Decimal,
    profile: Profile,
    referral_code: Option<String>,
}

impl AccountData {
    fn new(account_id: AccountId, profile: Profile) -> Self {
        Self {
            account_id,
            balance: Decimal::ZERO,
            profile,
            referral_code: None,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    /// Increases the balance.
    fn credit(&mut self, amount: Decimal) -> Result<Decimal, SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount);
        }
        self.balance += amount;
        self.assert_invariants();
        Ok(self.balance)
    }

    /// Decreases the balance, refusing to go below zero.
    fn debit(&mut self, amount: Decimal) -> Result<Decimal, SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount);
        }
        if self.balance < amount {
            return Err(SettlementError::InsufficientFunds);
        }
        self.balance -= amount;
        self.assert_invariants();
        Ok(self.balance)
    }
}

/// Ledger account.
///
/// The inner data is guarded by a [`parking_lot::Mutex`] so credits and
/// debits are atomic with respect to each other: two settlements racing on
/// the same account (a deposit completion and a commission credit, say)
/// cannot lose an update.
#[derive(Debug)]
pub struct Account {
    inner: Mutex<AccountData>,
}

impl Account {
    /// Minor-unit precision used when reporting balances.
    pub const DECIMAL_PRECISION: u32 = 2;

    pub fn new(account_id: AccountId, profile: Profile) -> Self {
        Self {
            inner: Mutex::new(AccountData::new(account_id, profile)),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.inner.lock().account_id
    }

    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    pub fn profile(&self) -> Profile {
        self.inner.lock().profile.clone()
    }

    pub fn referral_code(&self) -> Option<String> {
        self.inner.lock().referral_code.clone()
    }

    pub(crate) fn set_referral_code(&self, code: String) {
        self.inner.lock().referral_code = Some(code);
    }

    /// Atomically credits `amount` and returns the new balance.
    ///
    /// # Errors
    ///
    /// [`SettlementError::InvalidAmount`] if `amount` is not positive.
    pub fn credit(&self, amount: Decimal) -> Result<Decimal, SettlementError> {
        self.inner.lock().credit(amount)
    }

    /// Atomically debits `amount` and returns the new balance.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::InvalidAmount`] if `amount` is not positive.
    /// - [`SettlementError::InsufficientFunds`] if the balance is too low;
    ///   the balance is left untouched.
    pub fn debit(&self, amount: Decimal) -> Result<Decimal, SettlementError> {
        self.inner.lock().debit(amount)
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("Account", 3)?;
        state.serialize_field("account", &data.account_id)?;
        state.serialize_field("balance", &data.balance.round_dp(Account::DECIMAL_PRECISION))?;
        state.serialize_field("email", &data.profile.email)?;
        state.end()
    }
}

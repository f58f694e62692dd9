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

//! Transaction records.
//!
//! Transactions follow a one-way state machine:
//! - [`Pending`] → [`Completed`] (approve) or [`Rejected`] (reject)
//!
//! Only deposits and withdrawals are ever `Pending`; investment, gain, and
//! commission rows are created already `Completed` by their originators and
//! never pass through settlement. Once a status leaves `Pending` it is
//! immutable.
//!
//! [`Pending`]: TransactionStatus::Pending
//! [`Completed`]: TransactionStatus::Completed
//! [`Rejected`]: TransactionStatus::Rejected

use crate::base::{AccountId, TransactionId};
use crate::payment::PaymentDetails;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Business meaning of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Investment,
    Gain,
    Commission,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Investment => "investment",
            Self::Gain => "gain",
            Self::Commission => "commission",
        };
        write!(f, "{name}")
    }
}

/// Settlement state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        };
        write!(f, "{name}")
    }
}

/// A single ledger transaction.
///
/// All fields except `status` are immutable once recorded. The status sits
/// behind its own mutex: the settlement engine holds that lock across the
/// balance mutation and the status transition, which makes settlement of a
/// given transaction ID linearizable.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    account_id: AccountId,
    kind: TransactionKind,
    amount: Decimal,
    description: String,
    details: Option<PaymentDetails>,
    created_at: DateTime<Utc>,
    status: Mutex<TransactionStatus>,
}

impl Transaction {
    pub(crate) fn new(
        id: TransactionId,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        status: TransactionStatus,
        description: String,
        details: Option<PaymentDetails>,
    ) -> Self {
        Self {
            id,
            account_id,
            kind,
            amount,
            description,
            details,
            created_at: Utc::now(),
            status: Mutex::new(status),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn details(&self) -> Option<&PaymentDetails> {
        self.details.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> TransactionStatus {
        *self.status.lock()
    }

    /// Exclusive access to the status for the settlement critical section.
    pub(crate) fn lock_status(&self) -> MutexGuard<'_, TransactionStatus> {
        self.status.lock()
    }
}

impl serde::Serialize for Transaction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Transaction", 7)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("account", &self.account_id)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("amount", &self.amount)?;
        state.serialize_field("status", &self.status())?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("created_at", &self.created_at)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn status_transitions_are_observable() {
        let tx = Transaction::new(
            TransactionId(1),
            AccountId(1),
            TransactionKind::Deposit,
            dec!(50.00),
            TransactionStatus::Pending,
            "Deposit request".to_string(),
            None,
        );
        assert_eq!(tx.status(), TransactionStatus::Pending);

        *tx.lock_status() = TransactionStatus::Completed;
        assert_eq!(tx.status(), TransactionStatus::Completed);
    }

    #[test]
    fn kind_and_status_display_lowercase() {
        assert_eq!(TransactionKind::Withdrawal.to_string(), "withdrawal");
        assert_eq!(TransactionKind::Commission.to_string(), "commission");
        assert_eq!(TransactionStatus::Rejected.to_string(), "rejected");
    }

    #[test]
    fn serializes_with_current_status() {
        let tx = Transaction::new(
            TransactionId(9),
            AccountId(3),
            TransactionKind::Commission,
            dec!(10.00),
            TransactionStatus::Completed,
            "Referral commission (5% on deposit of 200)".to_string(),
            None,
        );
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["id"], 9);
        assert_eq!(json["kind"], "commission");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["amount"].as_str().unwrap(), "10.00");
    }
}

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

//! Error types for ledger operations and settlement.

use thiserror::Error;

/// Errors returned by the ledger and the settlement engine.
///
/// `InsufficientFunds` on a withdrawal refund indicates a prior integrity
/// violation and should be treated as alerting, not silently retried.
/// Commission and notification failures are not in this enum: they are
/// non-fatal and reported as [`SettlementWarning`](crate::SettlementWarning)
/// values on an otherwise-successful settlement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Debit would drive the balance below zero
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Referenced account does not exist
    #[error("account not found")]
    AccountNotFound,

    /// Account ID is already registered
    #[error("account already exists")]
    AccountExists,

    /// Referenced transaction ID does not exist
    #[error("transaction not found")]
    TransactionNotFound,

    /// Transaction has already left the pending state
    #[error("transaction already settled")]
    AlreadySettled,

    /// Duplicate transaction ID
    #[error("duplicate transaction ID")]
    DuplicateTransaction,

    /// Referral code is already taken by another account
    #[error("referral code already in use")]
    CodeTaken,

    /// Commission rate outside the 0-100 range
    #[error("commission rate must be between 0 and 100")]
    InvalidRate,

    /// An active referral link already exists for the referred account
    #[error("account already has an active referral link")]
    ReferralExists,

    /// An account cannot refer itself
    #[error("account cannot refer itself")]
    SelfReferral,
}

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

//! # Settlement Engine
//!
//! This library provides the transaction-settlement core of an investment
//! platform: pending deposits and withdrawals are approved or rejected,
//! balances are atomically adjusted exactly once, referral commissions are
//! paid on completed deposits, and a notification event is emitted per
//! settlement.
//!
//! ## Core Components
//!
//! - [`Engine`]: Settlement processor over accounts and transactions
//! - [`Ledger`]: Account balances, transaction log, and the atomic
//!   credit/debit primitive
//! - [`ReferralBook`]: Active referral links and commission terms
//! - [`Notifier`]: Outbound notification boundary (fire-and-forget)
//! - [`SettlementError`]: Error types for ledger and settlement failures
//!
//! ## Example
//!
//! ```
//! use settlement_rs::{
//!     AccountId, Engine, Profile, SettlementDecision, TransactionId, TransactionStatus,
//! };
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! engine.open_account(AccountId(1), Profile::default()).unwrap();
//!
//! // A deposit request is pending until an administrator approves it.
//! engine
//!     .submit_deposit(TransactionId(1), AccountId(1), dec!(100.00), None)
//!     .unwrap();
//! let outcome = engine
//!     .settle(TransactionId(1), SettlementDecision::Approve)
//!     .unwrap();
//!
//! assert_eq!(outcome.status, TransactionStatus::Completed);
//! assert_eq!(outcome.new_balance, dec!(100.00));
//! ```
//!
//! ## Thread Safety
//!
//! Settlements may be issued concurrently from multiple administrators or
//! automated jobs. Settlement of a given transaction ID is linearizable:
//! the first caller to transition it out of `pending` wins, all others
//! observe `AlreadySettled`.

pub mod account;
mod base;
pub mod commission;
mod engine;
pub mod error;
mod ledger;
pub mod notify;
mod payment;
pub mod referral;
mod transaction;

pub use account::{Account, Profile};
pub use base::{AccountId, ReferralId, TransactionId};
pub use commission::{CommissionReceipt, commission_amount};
pub use engine::{Engine, SettlementDecision, SettlementOutcome, SettlementWarning};
pub use error::SettlementError;
pub use ledger::Ledger;
pub use notify::{LogNotifier, Notifier, NullNotifier, SettlementNotice};
pub use payment::PaymentDetails;
pub use referral::{ReferralBook, ReferralLink, ReferralStatus};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};

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

//! Settlement engine.
//!
//! The [`Engine`] is the central component that settles pending
//! transactions and manages accounts. It validates a settlement request,
//! atomically applies the balance effect and the status transition, then
//! runs the best-effort commission and notification phases.
//!
//! # Settlement
//!
//! - **Approved deposits**: credit the amount to the owner's balance.
//! - **Approved withdrawals**: finalize only; the debit happened at
//!   submission time.
//! - **Rejected withdrawals**: refund the escrowed amount.
//! - **Rejected deposits**: no balance change.
//!
//! # Thread Safety
//!
//! Accounts are shared through [`dashmap::DashMap`] and every balance
//! mutation goes through a per-account lock, so settlements can run in
//! parallel across administrators. The first caller to take a transaction
//! out of `pending` wins; all others observe `AlreadySettled`.

use crate::account::Profile;
use crate::base::{AccountId, TransactionId};
use crate::commission::{CommissionReceipt, credit_commission};
use crate::error::SettlementError;
use crate::ledger::Ledger;
use crate::notify::{DEFAULT_RECIPIENT_NAME, Notifier, NullNotifier, SettlementNotice};
use crate::payment::PaymentDetails;
use crate::referral::{ReferralBook, ReferralLink};
use crate::transaction::{Transaction, TransactionKind, TransactionStatus};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Verdict issued by an administrator (or automated approver) on a pending
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementDecision {
    Approve,
    Reject,
}

impl SettlementDecision {
    fn target_status(self) -> TransactionStatus {
        match self {
            Self::Approve => TransactionStatus::Completed,
            Self::Reject => TransactionStatus::Rejected,
        }
    }
}

/// Non-fatal side-effect failures carried on a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementWarning {
    /// Commission credit failed; the deposit settlement stands.
    CommissionFailed(SettlementError),
    /// The notifier reported a delivery failure.
    NotificationFailed,
}

/// Result of a committed settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    /// Owner's balance after the settlement's balance effect.
    pub new_balance: Decimal,
    /// Commission paid to a referrer, when the settled transaction was a
    /// completed deposit of a referred account.
    pub commission: Option<CommissionReceipt>,
    pub warnings: Vec<SettlementWarning>,
    /// Whether a settlement notice was delivered.
    pub notified: bool,
}

/// Settlement engine over a [`Ledger`] and a [`ReferralBook`].
pub struct Engine {
    ledger: Ledger,
    referrals: ReferralBook,
    notifier: Box<dyn Notifier>,
}

impl Engine {
    /// Creates a new engine with no accounts and a no-op notifier.
    pub fn new() -> Self {
        Self::with_notifier(Box::new(NullNotifier))
    }

    pub fn with_notifier(notifier: Box<dyn Notifier>) -> Self {
        Engine {
            ledger: Ledger::new(),
            referrals: ReferralBook::new(),
            notifier,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn referrals(&self) -> &ReferralBook {
        &self.referrals
    }

    /// Settles a pending transaction.
    ///
    /// The balance effect and the status transition execute as one atomic
    /// unit under the transaction's status lock: either both commit or
    /// neither does, and concurrent or repeated calls on the same ID result
    /// in exactly one balance effect.
    ///
    /// After the settlement commits, two best-effort phases run outside the
    /// atomic unit: commission payout (approved deposits of referred
    /// accounts) and notification. Their failures become
    /// [`SettlementWarning`]s on the outcome and never unwind the
    /// settlement.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::TransactionNotFound`] - No such transaction.
    /// - [`SettlementError::AlreadySettled`] - Status is not `pending`;
    ///   safe to observe on retry, the balance is unchanged.
    /// - [`SettlementError::InsufficientFunds`] - Only reachable when a
    ///   withdrawal refund hits an inconsistent ledger; treat as a fatal
    ///   integrity error. The transaction stays `pending`.
    pub fn settle(
        &self,
        transaction_id: TransactionId,
        decision: SettlementDecision,
    ) -> Result<SettlementOutcome, SettlementError> {
        let tx = self
            .ledger
            .transaction(transaction_id)
            .ok_or(SettlementError::TransactionNotFound)?;
        let account_id = tx.account_id();
        let target = decision.target_status();

        let new_balance = {
            let mut status = tx.lock_status();
            if *status != TransactionStatus::Pending {
                return Err(SettlementError::AlreadySettled);
            }
            let new_balance = match (decision, tx.kind()) {
                (SettlementDecision::Approve, TransactionKind::Deposit) => {
                    self.ledger.atomic_credit(account_id, tx.amount())?
                }
                // The withdrawal debit happened at submission; approving
                // only finalizes the status.
                (SettlementDecision::Approve, TransactionKind::Withdrawal) => {
                    self.ledger.balance(account_id)?
                }
                // Reverse the escrow debit made at submission.
                (SettlementDecision::Reject, TransactionKind::Withdrawal) => {
                    self.ledger.atomic_credit(account_id, tx.amount())?
                }
                (SettlementDecision::Reject, TransactionKind::Deposit) => {
                    self.ledger.balance(account_id)?
                }
                // Investment, gain, and commission rows are born completed;
                // the pending check above already rejected them.
                _ => return Err(SettlementError::AlreadySettled),
            };
            *status = target;
            new_balance
        };

        tracing::debug!(
            transaction = %transaction_id,
            status = %target,
            balance = %new_balance,
            "transaction settled"
        );

        let mut warnings = Vec::new();
        let mut commission = None;

        if target == TransactionStatus::Completed && tx.kind() == TransactionKind::Deposit {
            if let Some(link) = self.referrals.active_link_for(account_id) {
                match credit_commission(&self.ledger, &link, &tx) {
                    Ok(receipt) => commission = receipt,
                    Err(error) => {
                        tracing::warn!(
                            transaction = %transaction_id,
                            referrer = %link.referrer(),
                            %error,
                            "commission credit failed"
                        );
                        warnings.push(SettlementWarning::CommissionFailed(error));
                    }
                }
            }
        }

        let notified = self.emit_notice(&tx, target, &mut warnings);

        Ok(SettlementOutcome {
            transaction_id,
            status: target,
            new_balance,
            commission,
            warnings,
            notified,
        })
    }

    fn emit_notice(
        &self,
        tx: &Arc<Transaction>,
        status: TransactionStatus,
        warnings: &mut Vec<SettlementWarning>,
    ) -> bool {
        let Ok(profile) = self.ledger.profile(tx.account_id()) else {
            return false;
        };
        let Some(email) = profile.email else {
            return false;
        };
        let notice = SettlementNotice {
            email,
            name: profile
                .full_name
                .unwrap_or_else(|| DEFAULT_RECIPIENT_NAME.to_string()),
            kind: tx.kind(),
            status,
            amount: tx.amount(),
        };
        if self.notifier.notify(&notice) {
            true
        } else {
            tracing::warn!(transaction = %tx.id(), "settlement notice delivery failed");
            warnings.push(SettlementWarning::NotificationFailed);
            false
        }
    }

    // === Request-submission and registration pass-throughs ===

    pub fn open_account(
        &self,
        account_id: AccountId,
        profile: Profile,
    ) -> Result<(), SettlementError> {
        self.ledger.open_account(account_id, profile)
    }

    pub fn submit_deposit(
        &self,
        transaction_id: TransactionId,
        account_id: AccountId,
        amount: Decimal,
        details: Option<PaymentDetails>,
    ) -> Result<(), SettlementError> {
        self.ledger
            .submit_deposit(transaction_id, account_id, amount, details)
    }

    pub fn submit_withdrawal(
        &self,
        transaction_id: TransactionId,
        account_id: AccountId,
        amount: Decimal,
        details: Option<PaymentDetails>,
    ) -> Result<Decimal, SettlementError> {
        self.ledger
            .submit_withdrawal(transaction_id, account_id, amount, details)
    }

    pub fn record_investment(
        &self,
        transaction_id: TransactionId,
        account_id: AccountId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Decimal, SettlementError> {
        self.ledger
            .record_investment(transaction_id, account_id, amount, description)
    }

    pub fn record_gain(
        &self,
        transaction_id: TransactionId,
        account_id: AccountId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Decimal, SettlementError> {
        self.ledger
            .record_gain(transaction_id, account_id, amount, description)
    }

    /// Creates an active referral link between two registered accounts.
    pub fn refer(
        &self,
        referrer: AccountId,
        referred: AccountId,
        rate: Decimal,
    ) -> Result<Arc<ReferralLink>, SettlementError> {
        self.ledger.balance(referrer)?;
        self.ledger.balance(referred)?;
        self.referrals.link(referrer, referred, rate)
    }

    /// Creates a referral link from the referrer's code, as done when a
    /// referred account registers with a valid code.
    pub fn refer_by_code(
        &self,
        code: &str,
        referred: AccountId,
        rate: Decimal,
    ) -> Result<Arc<ReferralLink>, SettlementError> {
        let referrer = self
            .ledger
            .account_by_code(code)
            .ok_or(SettlementError::AccountNotFound)?;
        self.refer(referrer, referred, rate)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

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

//! Settlement notification boundary.
//!
//! The engine emits one [`SettlementNotice`] per settlement when the owner
//! has an email on file. Delivery, retry, and formatting belong to the
//! implementer of [`Notifier`]; a failed notification never affects the
//! settlement or commission outcome.

use crate::transaction::{TransactionKind, TransactionStatus};
use rust_decimal::Decimal;
use serde::Serialize;

/// Fallback recipient name when the account profile has none.
pub const DEFAULT_RECIPIENT_NAME: &str = "Investor";

/// Event emitted after a settlement commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementNotice {
    pub email: String,
    pub name: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
}

/// Outbound message sink, fire-and-forget.
///
/// Returns whether delivery is believed to have succeeded; the result is
/// reported back to the caller for display purposes only.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &SettlementNotice) -> bool;
}

/// Discards notices. Used when no mail transport is configured.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notice: &SettlementNotice) -> bool {
        true
    }
}

/// Writes notices to the tracing log instead of delivering them.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &SettlementNotice) -> bool {
        tracing::info!(
            email = %notice.email,
            kind = %notice.kind,
            status = %notice.status,
            amount = %notice.amount,
            "settlement notice"
        );
        true
    }
}

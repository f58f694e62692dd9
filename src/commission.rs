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

//! Referral commission computation and payout.
//!
//! Runs after a deposit settles as completed, never inside the settlement's
//! atomic unit: a commission failure is reported as a warning and must not
//! unwind the deposit.
//!
//! # Rounding policy
//!
//! Commission amounts are rounded **half up** (away from zero) to two
//! decimal places. Fixing the policy here keeps payouts reproducible;
//! `Decimal`'s default banker's rounding would pay `0.005` as `0.00`.

use crate::base::{AccountId, TransactionId};
use crate::error::SettlementError;
use crate::ledger::Ledger;
use crate::referral::ReferralLink;
use crate::transaction::{Transaction, TransactionKind};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

/// Minor-unit precision of commission payouts.
pub const COMMISSION_PRECISION: u32 = 2;

/// Outcome of a paid commission, for display and audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommissionReceipt {
    pub referrer: AccountId,
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub rate: Decimal,
}

/// Computes `deposit_amount * rate / 100`, rounded half up to
/// [`COMMISSION_PRECISION`] decimal places.
pub fn commission_amount(deposit_amount: Decimal, rate: Decimal) -> Decimal {
    (deposit_amount * rate / dec!(100))
        .round_dp_with_strategy(COMMISSION_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

/// Credits the referrer for a completed deposit.
///
/// 1. Atomically credits the commission to the referrer's balance (the
///    same primitive deposit settlement uses, so concurrent mutations on
///    the referrer's account cannot lose updates).
/// 2. Appends a `completed` commission transaction naming the rate and the
///    source deposit amount.
/// 3. Increments the link's running `total_commission`.
///
/// Returns `None` when the computed amount rounds to zero (for example a
/// 0% rate): nothing is credited and no audit row is written.
///
/// # Errors
///
/// [`SettlementError::AccountNotFound`] if the referrer's account has
/// vanished. The caller treats this as a non-fatal warning.
pub fn credit_commission(
    ledger: &Ledger,
    link: &ReferralLink,
    deposit: &Transaction,
) -> Result<Option<CommissionReceipt>, SettlementError> {
    debug_assert_eq!(deposit.kind(), TransactionKind::Deposit);

    let rate = link.commission_rate();
    let amount = commission_amount(deposit.amount(), rate);
    if amount.is_zero() {
        return Ok(None);
    }

    let referrer = link.referrer();
    ledger.atomic_credit(referrer, amount)?;

    let transaction_id = ledger.append_settled(
        referrer,
        TransactionKind::Commission,
        amount,
        format!(
            "Referral commission ({rate}% on deposit of {})",
            deposit.amount()
        ),
    );
    link.add_commission(amount);

    Ok(Some(CommissionReceipt {
        referrer,
        transaction_id,
        amount,
        rate,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_percent_of_two_hundred_is_ten() {
        assert_eq!(commission_amount(dec!(200), dec!(5)), dec!(10.00));
    }

    #[test]
    fn rounds_half_up_not_bankers() {
        // 0.1% of 5 = 0.005: half up pays a cent, banker's would not.
        assert_eq!(commission_amount(dec!(5), dec!(0.1)), dec!(0.01));
        // 0.5% of 5 = 0.025: half up 0.03, banker's 0.02.
        assert_eq!(commission_amount(dec!(5), dec!(0.5)), dec!(0.03));
    }

    #[test]
    fn truncates_sub_cent_noise() {
        assert_eq!(commission_amount(dec!(33.33), dec!(3)), dec!(1.00));
        assert_eq!(commission_amount(dec!(0.01), dec!(1)), dec!(0.00));
    }

    #[test]
    fn zero_rate_yields_zero() {
        assert_eq!(commission_amount(dec!(1000), dec!(0)), Decimal::ZERO);
    }

    #[test]
    fn full_rate_pays_full_amount() {
        assert_eq!(commission_amount(dec!(123.45), dec!(100)), dec!(123.45));
    }
}

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

//! Referral links.
//!
//! A referral link grants a referrer a percentage commission on every
//! completed deposit of the referred account. The registry is keyed by the
//! referred account, which structurally enforces the invariant that at most
//! one active link exists per referred account.

use crate::base::{AccountId, ReferralId};
use crate::error::SettlementError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    Active,
    Inactive,
}

/// A referrer/referred relationship with its commission terms.
///
/// `total_commission` is a running sum incremented only by the commission
/// calculator; everything else is immutable after creation except `status`.
#[derive(Debug)]
pub struct ReferralLink {
    id: ReferralId,
    referrer: AccountId,
    referred: AccountId,
    commission_rate: Decimal,
    total_commission: Mutex<Decimal>,
    status: Mutex<ReferralStatus>,
}

impl PartialEq for ReferralLink {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.referrer == other.referrer
            && self.referred == other.referred
            && self.commission_rate == other.commission_rate
            && *self.total_commission.lock() == *other.total_commission.lock()
            && *self.status.lock() == *other.status.lock()
    }
}

impl ReferralLink {
    pub fn id(&self) -> ReferralId {
        self.id
    }

    pub fn referrer(&self) -> AccountId {
        self.referrer
    }

    pub fn referred(&self) -> AccountId {
        self.referred
    }

    /// Commission rate as a percentage in `0..=100`.
    pub fn commission_rate(&self) -> Decimal {
        self.commission_rate
    }

    pub fn total_commission(&self) -> Decimal {
        *self.total_commission.lock()
    }

    pub fn status(&self) -> ReferralStatus {
        *self.status.lock()
    }

    pub(crate) fn add_commission(&self, amount: Decimal) {
        *self.total_commission.lock() += amount;
    }
}

/// Registry of referral links, keyed by the referred account.
pub struct ReferralBook {
    links: DashMap<AccountId, Arc<ReferralLink>>,
    next_id: AtomicU32,
}

impl ReferralBook {
    pub fn new() -> Self {
        Self {
            links: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Creates an active referral link.
    ///
    /// An inactive link for the same referred account is replaced; an active
    /// one makes this fail with [`SettlementError::ReferralExists`].
    ///
    /// # Errors
    ///
    /// - [`SettlementError::InvalidRate`] if `rate` is outside `0..=100`.
    /// - [`SettlementError::SelfReferral`] if referrer and referred match.
    /// - [`SettlementError::ReferralExists`] as above.
    pub fn link(
        &self,
        referrer: AccountId,
        referred: AccountId,
        rate: Decimal,
    ) -> Result<Arc<ReferralLink>, SettlementError> {
        if rate < Decimal::ZERO || rate > dec!(100) {
            return Err(SettlementError::InvalidRate);
        }
        if referrer == referred {
            return Err(SettlementError::SelfReferral);
        }

        let make_link = |id: u32| {
            Arc::new(ReferralLink {
                id: ReferralId(id),
                referrer,
                referred,
                commission_rate: rate,
                total_commission: Mutex::new(Decimal::ZERO),
                status: Mutex::new(ReferralStatus::Active),
            })
        };

        match self.links.entry(referred) {
            Entry::Occupied(mut entry) => {
                if entry.get().status() == ReferralStatus::Active {
                    return Err(SettlementError::ReferralExists);
                }
                let link = make_link(self.next_id.fetch_add(1, Ordering::Relaxed));
                entry.insert(Arc::clone(&link));
                Ok(link)
            }
            Entry::Vacant(entry) => {
                let link = make_link(self.next_id.fetch_add(1, Ordering::Relaxed));
                entry.insert(Arc::clone(&link));
                Ok(link)
            }
        }
    }

    /// The active link whose referred side is `referred`, if any.
    pub fn active_link_for(&self, referred: AccountId) -> Option<Arc<ReferralLink>> {
        self.links
            .get(&referred)
            .filter(|entry| entry.value().status() == ReferralStatus::Active)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Deactivates the link for a referred account. Returns whether a link
    /// was active.
    pub fn deactivate(&self, referred: AccountId) -> bool {
        match self.links.get(&referred) {
            Some(entry) => {
                let mut status = entry.value().status.lock();
                let was_active = *status == ReferralStatus::Active;
                *status = ReferralStatus::Inactive;
                was_active
            }
            None => false,
        }
    }

    /// Sum of commissions earned by a referrer across all of their links.
    pub fn total_commission_of(&self, referrer: AccountId) -> Decimal {
        self.links
            .iter()
            .filter(|entry| entry.value().referrer() == referrer)
            .map(|entry| entry.value().total_commission())
            .sum()
    }
}

impl Default for ReferralBook {
    fn default() -> Self {
        Self::new()
    }
}

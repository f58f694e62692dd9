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

//! Payment-method details attached to deposit and withdrawal requests.
//!
//! One tagged variant per supported payment-method type, with named fields
//! instead of an open-ended key-value map.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination or source details of a deposit/withdrawal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentDetails {
    Bitcoin {
        address: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        network: Option<String>,
    },
    Paypal {
        email: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Bank {
        bank_name: String,
        account_holder: String,
        account_number: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        country: Option<String>,
    },
}

impl PaymentDetails {
    /// Human-readable method name used in transaction descriptions.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Bitcoin { .. } => "bitcoin",
            Self::Paypal { .. } => "paypal",
            Self::Bank { .. } => "bank",
        }
    }
}

impl fmt::Display for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_are_tagged_by_type() {
        let details = PaymentDetails::Bitcoin {
            address: "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh".to_string(),
            network: None,
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["type"], "bitcoin");
        assert!(json.get("network").is_none());
    }

    #[test]
    fn bank_details_round_trip() {
        let details = PaymentDetails::Bank {
            bank_name: "Ecobank".to_string(),
            account_holder: "A. Diallo".to_string(),
            account_number: "0123456789".to_string(),
            country: Some("SN".to_string()),
        };
        let json = serde_json::to_string(&details).unwrap();
        let parsed: PaymentDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, details);
    }

    #[test]
    fn method_names() {
        let paypal = PaymentDetails::Paypal {
            email: "user@example.com".to_string(),
            note: None,
        };
        assert_eq!(paypal.method_name(), "paypal");
        assert_eq!(paypal.to_string(), "paypal");
    }
}

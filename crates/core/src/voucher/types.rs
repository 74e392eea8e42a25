//! Voucher domain types.
//!
//! This module defines the vocabulary shared by the balance engine, the
//! redemption authorizer, and the reporting components.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of a voucher, with the product binding carried in the variant.
///
/// A regular voucher is spendable with any provider approved for its fund.
/// A product voucher is bound to exactly one product and may be redeemed at
/// most once; it is usually spawned from a regular parent voucher at
/// redemption time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VoucherKind {
    /// Spendable with any approved provider of the fund.
    Regular,
    /// Bound to one specific product, single-use.
    Product {
        /// The product this voucher is restricted to.
        product_id: Uuid,
    },
}

impl VoucherKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Product { .. } => "product",
        }
    }

    /// Returns true if this is a product voucher.
    #[must_use]
    pub const fn is_product(&self) -> bool {
        matches!(self, Self::Product { .. })
    }
}

impl fmt::Display for VoucherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a fund.
///
/// Vouchers may only be redeemed while the owning fund is `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundState {
    /// Fund is configured but not yet open for redemptions.
    Waiting,
    /// Fund is open; vouchers can be issued and redeemed.
    Active,
    /// Fund is temporarily suspended.
    Paused,
    /// Fund has ended.
    Closed,
}

impl FundState {
    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Closed => "closed",
        }
    }

    /// Parses a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Returns true if redemptions against this fund are allowed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for FundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement state of a ledger transaction.
///
/// A transaction is created `pending` and moves to `success` or `canceled`
/// as the external payment rail confirms or rejects it. The amount is spent
/// the moment the row exists; settlement state never affects balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Awaiting settlement on the payment rail.
    Pending,
    /// Payment confirmed.
    Success,
    /// Payment rejected or withdrawn.
    Canceled,
}

impl TransactionState {
    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Canceled => "canceled",
        }
    }

    /// Parses a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Returns true once the payment rail has finished with this transaction.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Canceled)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_as_str() {
        assert_eq!(VoucherKind::Regular.as_str(), "regular");
        assert_eq!(
            VoucherKind::Product {
                product_id: Uuid::nil()
            }
            .as_str(),
            "product"
        );
    }

    #[test]
    fn test_kind_is_product() {
        assert!(!VoucherKind::Regular.is_product());
        assert!(VoucherKind::Product {
            product_id: Uuid::nil()
        }
        .is_product());
    }

    #[test]
    fn test_kind_serializes_tagged() {
        let json = serde_json::to_value(VoucherKind::Regular).unwrap();
        assert_eq!(json["type"], "regular");

        let json = serde_json::to_value(VoucherKind::Product {
            product_id: Uuid::nil(),
        })
        .unwrap();
        assert_eq!(json["type"], "product");
        assert!(json["product_id"].is_string());
    }

    #[test]
    fn test_fund_state_parse() {
        assert_eq!(FundState::parse("active"), Some(FundState::Active));
        assert_eq!(FundState::parse("PAUSED"), Some(FundState::Paused));
        assert_eq!(FundState::parse("waiting"), Some(FundState::Waiting));
        assert_eq!(FundState::parse("closed"), Some(FundState::Closed));
        assert_eq!(FundState::parse("archived"), None);
    }

    #[test]
    fn test_fund_state_is_active() {
        assert!(FundState::Active.is_active());
        assert!(!FundState::Waiting.is_active());
        assert!(!FundState::Paused.is_active());
        assert!(!FundState::Closed.is_active());
    }

    #[test]
    fn test_transaction_state_roundtrip() {
        for state in [
            TransactionState::Pending,
            TransactionState::Success,
            TransactionState::Canceled,
        ] {
            assert_eq!(TransactionState::parse(state.as_str()), Some(state));
        }
        assert_eq!(TransactionState::parse("unknown"), None);
    }

    #[test]
    fn test_transaction_state_settled() {
        assert!(!TransactionState::Pending.is_settled());
        assert!(TransactionState::Success.is_settled());
        assert!(TransactionState::Canceled.is_settled());
    }
}

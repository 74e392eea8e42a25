//! Redemption decision types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::voucher::types::{FundState, VoucherKind};

/// Why a redemption attempt was denied.
///
/// Denials are expected, user-facing outcomes, not faults: the caller renders
/// them as structured responses. [`DenialReason::as_str`] is the stable code
/// exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The voucher's expiry instant has passed.
    #[error("Voucher has expired")]
    VoucherExpired,

    /// The voucher's fund is not in the active state.
    #[error("Fund is not active")]
    FundNotActive,

    /// The product voucher already has a recorded transaction.
    #[error("Product voucher has already been used")]
    ProductVoucherUsed,

    /// The identity controls no organization allowed to redeem this voucher.
    #[error("Identity is not permitted to redeem this voucher")]
    NotPermitted,
}

impl DenialReason {
    /// Returns the stable denial code for API responses.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VoucherExpired => "voucher_expired",
            Self::FundNotActive => "fund_not_active",
            Self::ProductVoucherUsed => "product_voucher_used",
            Self::NotPermitted => "not_permitted",
        }
    }
}

/// Snapshot of everything the authorizer needs to decide one redemption
/// attempt by one identity against one voucher.
///
/// The caller assembles this from current storage state; the authorizer
/// itself performs no I/O and reads no ambient state.
#[derive(Debug, Clone)]
pub struct RedemptionContext {
    /// The voucher's kind, including the product binding when present.
    pub kind: VoucherKind,
    /// The voucher's expiry instant.
    pub expire_at: DateTime<Utc>,
    /// Current state of the voucher's fund.
    pub fund_state: FundState,
    /// Number of transactions already recorded against the voucher.
    pub transaction_count: u64,
    /// Organizations approved as providers for the voucher's fund.
    pub approved_providers: HashSet<Uuid>,
    /// Organizations on which the acting identity holds `scan_vouchers`.
    pub scannable_organizations: HashSet<Uuid>,
    /// Owning organization of the bound product, for product vouchers.
    ///
    /// Must be supplied by the context builder whenever `kind` is a product;
    /// a product voucher with no resolvable owner is denied, never allowed.
    pub product_organization: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_codes() {
        assert_eq!(DenialReason::VoucherExpired.as_str(), "voucher_expired");
        assert_eq!(DenialReason::FundNotActive.as_str(), "fund_not_active");
        assert_eq!(
            DenialReason::ProductVoucherUsed.as_str(),
            "product_voucher_used"
        );
        assert_eq!(DenialReason::NotPermitted.as_str(), "not_permitted");
    }

    #[test]
    fn test_denial_serializes_as_snake_case() {
        let json = serde_json::to_value(DenialReason::VoucherExpired).unwrap();
        assert_eq!(json, "voucher_expired");
    }

    #[test]
    fn test_denial_display() {
        assert_eq!(
            DenialReason::ProductVoucherUsed.to_string(),
            "Product voucher has already been used"
        );
    }
}

//! Redemption authorization.
//!
//! Decides whether an identity may redeem a voucher at this moment. The
//! checks run in a fixed order and short-circuit on the first failure:
//! expiry, then fund activity, then the kind-specific eligibility rules.
//! Later checks assume the earlier ones passed.
//!
//! The authorizer certifies *eligibility* only. Sufficiency of funds is the
//! balance engine's concern and is re-checked by the caller inside the same
//! database transaction that writes the ledger entry.

use chrono::{DateTime, Utc};

use crate::redemption::types::{DenialReason, RedemptionContext};
use crate::voucher::balance::is_expired;
use crate::voucher::types::VoucherKind;

/// Stateless redemption decision function.
pub struct RedemptionAuthorizer;

impl RedemptionAuthorizer {
    /// Authorizes one redemption attempt against a context snapshot.
    ///
    /// Decision order:
    /// 1. expired voucher → `voucher_expired`
    /// 2. fund not active → `fund_not_active`
    /// 3. regular voucher: the identity must be able to scan for at least one
    ///    organization in the fund's approved-provider set
    /// 4. product voucher: at most one transaction ever
    ///    (`product_voucher_used`), then `scan_vouchers` on the product's
    ///    owning organization specifically
    ///
    /// # Errors
    ///
    /// Returns the first applicable [`DenialReason`]; side-effect free.
    pub fn authorize(
        context: &RedemptionContext,
        now: DateTime<Utc>,
    ) -> Result<(), DenialReason> {
        if is_expired(context.expire_at, now) {
            return Err(DenialReason::VoucherExpired);
        }

        if !context.fund_state.is_active() {
            return Err(DenialReason::FundNotActive);
        }

        match context.kind {
            VoucherKind::Regular => {
                let permitted = context
                    .scannable_organizations
                    .iter()
                    .any(|org| context.approved_providers.contains(org));

                if permitted {
                    Ok(())
                } else {
                    Err(DenialReason::NotPermitted)
                }
            }
            VoucherKind::Product { .. } => {
                if context.transaction_count > 0 {
                    return Err(DenialReason::ProductVoucherUsed);
                }

                match context.product_organization {
                    Some(owner) if context.scannable_organizations.contains(&owner) => Ok(()),
                    _ => Err(DenialReason::NotPermitted),
                }
            }
        }
    }
}

//! Property-based tests for the redemption authorizer.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

use crate::redemption::authorizer::RedemptionAuthorizer;
use crate::redemption::types::{DenialReason, RedemptionContext};
use crate::voucher::types::{FundState, VoucherKind};

fn arb_uuid() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

fn arb_uuid_set(max_len: usize) -> impl Strategy<Value = HashSet<Uuid>> {
    prop::collection::hash_set(arb_uuid(), 0..=max_len)
}

fn arb_fund_state() -> impl Strategy<Value = FundState> {
    prop_oneof![
        Just(FundState::Waiting),
        Just(FundState::Active),
        Just(FundState::Paused),
        Just(FundState::Closed),
    ]
}

fn arb_kind() -> impl Strategy<Value = VoucherKind> {
    prop_oneof![
        Just(VoucherKind::Regular),
        arb_uuid().prop_map(|product_id| VoucherKind::Product { product_id }),
    ]
}

fn arb_context() -> impl Strategy<Value = RedemptionContext> {
    (
        arb_kind(),
        -400i64..400i64,
        arb_fund_state(),
        0u64..3u64,
        arb_uuid_set(4),
        arb_uuid_set(4),
        prop::option::of(arb_uuid()),
    )
        .prop_map(
            |(kind, expire_days, fund_state, transaction_count, approved, scannable, owner)| {
                RedemptionContext {
                    kind,
                    expire_at: base_now() + Duration::days(expire_days),
                    fund_state,
                    transaction_count,
                    approved_providers: approved,
                    scannable_organizations: scannable,
                    product_organization: owner,
                }
            },
        )
}

fn base_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// An expired voucher is denied with `voucher_expired` no matter what
    /// the rest of the context looks like.
    #[test]
    fn prop_expiry_dominates(ctx in arb_context()) {
        let now = ctx.expire_at + Duration::seconds(1);
        prop_assert_eq!(
            RedemptionAuthorizer::authorize(&ctx, now),
            Err(DenialReason::VoucherExpired)
        );
    }

    /// A non-active fund is denied with `fund_not_active` whenever the
    /// voucher itself is still valid.
    #[test]
    fn prop_inactive_fund_dominates_kind_checks(ctx in arb_context()) {
        prop_assume!(!ctx.fund_state.is_active());
        let now = ctx.expire_at - Duration::seconds(1);
        prop_assert_eq!(
            RedemptionAuthorizer::authorize(&ctx, now),
            Err(DenialReason::FundNotActive)
        );
    }

    /// A regular voucher is allowed iff the identity's scannable set
    /// intersects the fund's approved-provider set.
    #[test]
    fn prop_regular_allowed_iff_intersection(mut ctx in arb_context()) {
        ctx.kind = VoucherKind::Regular;
        ctx.fund_state = FundState::Active;
        let now = ctx.expire_at - Duration::seconds(1);

        let intersects = ctx
            .scannable_organizations
            .intersection(&ctx.approved_providers)
            .next()
            .is_some();

        let result = RedemptionAuthorizer::authorize(&ctx, now);
        if intersects {
            prop_assert_eq!(result, Ok(()));
        } else {
            prop_assert_eq!(result, Err(DenialReason::NotPermitted));
        }
    }

    /// A product voucher with any prior transaction is always denied with
    /// `product_voucher_used`, even for the product's own organization.
    #[test]
    fn prop_used_product_voucher_always_denied(
        mut ctx in arb_context(),
        product_id in arb_uuid(),
        count in 1u64..100u64,
    ) {
        ctx.kind = VoucherKind::Product { product_id };
        ctx.fund_state = FundState::Active;
        ctx.transaction_count = count;
        let now = ctx.expire_at - Duration::seconds(1);

        prop_assert_eq!(
            RedemptionAuthorizer::authorize(&ctx, now),
            Err(DenialReason::ProductVoucherUsed)
        );
    }

    /// A fresh product voucher is allowed iff the identity can scan for the
    /// product's owning organization.
    #[test]
    fn prop_fresh_product_allowed_iff_owner_scannable(
        mut ctx in arb_context(),
        product_id in arb_uuid(),
    ) {
        ctx.kind = VoucherKind::Product { product_id };
        ctx.fund_state = FundState::Active;
        ctx.transaction_count = 0;
        let now = ctx.expire_at - Duration::seconds(1);

        let expected = match ctx.product_organization {
            Some(owner) => ctx.scannable_organizations.contains(&owner),
            None => false,
        };

        let result = RedemptionAuthorizer::authorize(&ctx, now);
        if expected {
            prop_assert_eq!(result, Ok(()));
        } else {
            prop_assert_eq!(result, Err(DenialReason::NotPermitted));
        }
    }

    /// The decision is a pure function of its inputs.
    #[test]
    fn prop_authorize_is_deterministic(ctx in arb_context(), offset in -500i64..500i64) {
        let now = base_now() + Duration::hours(offset);
        prop_assert_eq!(
            RedemptionAuthorizer::authorize(&ctx, now),
            RedemptionAuthorizer::authorize(&ctx, now)
        );
    }
}

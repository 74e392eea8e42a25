//! Property-based tests for balance derivation.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::voucher::balance::{is_expired, round_amount, BalanceBreakdown};

/// Strategy for money-like amounts with up to 4 decimal places.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|n| Decimal::new(n, 4))
}

/// Strategy for a list of transaction amounts.
fn arb_amounts(max_len: usize) -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(arb_amount(), 0..=max_len)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Cached-mode and live-mode derivation agree on any transaction set.
    #[test]
    fn prop_cached_equals_live(
        face in arb_amount(),
        own in arb_amounts(20),
        children in arb_amounts(20),
    ) {
        let cached = BalanceBreakdown::from_amounts(face, own.clone(), children.clone());
        let live = BalanceBreakdown::new(
            face,
            own.iter().copied().sum(),
            children.iter().copied().sum(),
        );

        prop_assert_eq!(cached.available(), live.available());
        prop_assert_eq!(cached.total_spent(), live.total_spent());
    }

    /// Appending a transaction can only move the available amount down.
    /// Not strictly: a sub-cent spend can vanish in the 2-decimal rounding.
    #[test]
    fn prop_spending_never_increases_available(
        face in arb_amount(),
        own in arb_amounts(20),
        extra in arb_amount(),
    ) {
        let before = BalanceBreakdown::from_amounts(face, own.clone(), std::iter::empty());
        let mut spent = own;
        spent.push(extra);
        let after = BalanceBreakdown::from_amounts(face, spent, std::iter::empty());

        prop_assert!(after.available() <= before.available());
    }

    /// Rounding to 2 decimals is idempotent.
    #[test]
    fn prop_rounding_idempotent(amount in arb_amount()) {
        let once = round_amount(amount);
        prop_assert_eq!(round_amount(once), once);
        prop_assert!(once.scale() <= 2);
    }

    /// Available amount is symmetric in where the spending happened: moving a
    /// transaction from the voucher to a child changes nothing.
    #[test]
    fn prop_own_and_child_spending_interchangeable(
        face in arb_amount(),
        amounts in arb_amounts(10),
    ) {
        let all_own = BalanceBreakdown::from_amounts(face, amounts.clone(), std::iter::empty());
        let all_child = BalanceBreakdown::from_amounts(face, std::iter::empty(), amounts);

        prop_assert_eq!(all_own.available(), all_child.available());
    }

    /// Once a voucher is expired it stays expired for every later instant:
    /// the outcome changes at most once along the timeline.
    #[test]
    fn prop_expiry_is_monotonic(
        expire_offset in 0i64..2_000_000i64,
        probe in 0i64..2_000_000i64,
        step in 1i64..1_000_000i64,
    ) {
        let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let expire_at = epoch + Duration::seconds(expire_offset);
        let now = epoch + Duration::seconds(probe);
        let later = now + Duration::seconds(step);

        if is_expired(expire_at, now) {
            prop_assert!(is_expired(expire_at, later));
        }
    }
}

//! Voucher balance derivation.
//!
//! Balances are never stored as a mutable counter. They are re-derived from
//! the append-only transaction ledger every time:
//!
//! ```text
//! available = round(face_amount - sum(own transactions) - sum(child voucher transactions), 2)
//! ```
//!
//! The child term covers product sub-vouchers spawned from a regular parent;
//! their spending counts against the parent. Linkage is one level deep
//! (children never have children), so the aggregation iterates direct
//! children only instead of recursing.
//!
//! Two callers feed this module: the repository layer with SQL `SUM`s (live
//! mode, authoritative, used under lock before a spend) and bulk reporting
//! with already-loaded transaction collections (cached mode). Both funnel
//! through [`BalanceBreakdown`] so they can never round differently.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places balances are rounded to.
pub const BALANCE_SCALE: u32 = 2;

/// Rounds an amount to balance precision, half away from zero.
#[must_use]
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(BALANCE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// The three terms a voucher balance is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBreakdown {
    /// The voucher's face amount.
    pub face_amount: Decimal,
    /// Total of the voucher's own ledger transactions.
    pub own_spent: Decimal,
    /// Total of ledger transactions on direct child vouchers.
    pub child_spent: Decimal,
}

impl BalanceBreakdown {
    /// Creates a breakdown from pre-summed terms (live mode: SQL sums).
    #[must_use]
    pub const fn new(face_amount: Decimal, own_spent: Decimal, child_spent: Decimal) -> Self {
        Self {
            face_amount,
            own_spent,
            child_spent,
        }
    }

    /// Creates a breakdown from in-memory transaction amounts (cached mode).
    #[must_use]
    pub fn from_amounts<I, J>(face_amount: Decimal, own: I, children: J) -> Self
    where
        I: IntoIterator<Item = Decimal>,
        J: IntoIterator<Item = Decimal>,
    {
        Self {
            face_amount,
            own_spent: own.into_iter().sum(),
            child_spent: children.into_iter().sum(),
        }
    }

    /// The spendable amount remaining on the voucher, rounded to 2 decimals.
    #[must_use]
    pub fn available(&self) -> Decimal {
        round_amount(self.face_amount - self.own_spent - self.child_spent)
    }

    /// Total spent against this voucher, own and child transactions combined.
    #[must_use]
    pub fn total_spent(&self) -> Decimal {
        round_amount(self.own_spent + self.child_spent)
    }
}

/// Returns true if the voucher is expired at `now`.
///
/// A voucher is expired from its expiry instant onwards; the instant itself
/// counts as expired.
#[must_use]
pub fn is_expired(expire_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expire_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_available_subtracts_own_and_child_spending() {
        let breakdown = BalanceBreakdown::new(dec!(100.00), dec!(12.50), dec!(7.25));
        assert_eq!(breakdown.available(), dec!(80.25));
        assert_eq!(breakdown.total_spent(), dec!(19.75));
    }

    #[test]
    fn test_available_rounds_half_away_from_zero() {
        // 100 - 0.005 = 99.995 -> 100.00 (midpoint rounds away from zero)
        let breakdown = BalanceBreakdown::new(dec!(100.00), dec!(0.005), Decimal::ZERO);
        assert_eq!(breakdown.available(), dec!(100.00));

        let breakdown = BalanceBreakdown::new(dec!(100.00), dec!(0.015), Decimal::ZERO);
        assert_eq!(breakdown.available(), dec!(99.99));
    }

    #[test]
    fn test_untouched_voucher_has_full_face_amount() {
        let breakdown = BalanceBreakdown::new(dec!(250.00), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(breakdown.available(), dec!(250.00));
    }

    #[test]
    fn test_cached_mode_sums_collections() {
        let breakdown = BalanceBreakdown::from_amounts(
            dec!(100.00),
            vec![dec!(10.00), dec!(20.00), dec!(5.00)],
            vec![dec!(2.50)],
        );
        assert_eq!(breakdown.own_spent, dec!(35.00));
        assert_eq!(breakdown.child_spent, dec!(2.50));
        assert_eq!(breakdown.available(), dec!(62.50));
    }

    #[test]
    fn test_cached_and_live_mode_agree() {
        let own = vec![dec!(10.00), dec!(20.00), dec!(5.00)];
        let children = vec![dec!(1.25), dec!(3.75)];

        let cached =
            BalanceBreakdown::from_amounts(dec!(100.00), own.clone(), children.clone());
        let live = BalanceBreakdown::new(
            dec!(100.00),
            own.iter().copied().sum(),
            children.iter().copied().sum(),
        );

        assert_eq!(cached.available(), live.available());
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let expire_at = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();

        let before = expire_at - chrono::Duration::seconds(1);
        let after = expire_at + chrono::Duration::seconds(1);

        assert!(!is_expired(expire_at, before));
        assert!(is_expired(expire_at, expire_at));
        assert!(is_expired(expire_at, after));
    }
}

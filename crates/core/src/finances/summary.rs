//! Finances summary assembly.
//!
//! The query layer sums transactions per bucket and hands the raw numbers
//! here; this module owns every derived figure so the rounding and zero-safe
//! division rules live in exactly one place.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::finances::types::{BucketValue, FinancesSummary};
use crate::voucher::balance::round_amount;

/// Raw per-window numbers produced by the transaction queries.
#[derive(Debug, Clone, Default)]
pub struct WindowTotals {
    /// Number of the provider's transactions within the window.
    pub transaction_count: u64,
    /// The whole fund's usage within the window (all providers).
    pub fund_usage_in_range: Decimal,
    /// This provider's all-time usage on the fund.
    pub provider_usage_total: Decimal,
    /// The whole fund's all-time usage.
    pub fund_usage_total: Decimal,
}

/// Assembles the finances report from boundary dates and bucket sums.
///
/// `bucket_sums` holds one value per bucket, i.e. one fewer than
/// `boundaries`; the first boundary anchors the window with value 0. The
/// provider's usage is the sum of the buckets, and both share ratios fall
/// back to 0 when their denominator is zero.
#[must_use]
pub fn summarize(
    boundaries: &[NaiveDate],
    bucket_sums: &[Decimal],
    totals: &WindowTotals,
) -> FinancesSummary {
    let mut dates = Vec::with_capacity(boundaries.len());
    if let Some(first) = boundaries.first() {
        dates.push(BucketValue {
            key: *first,
            value: Decimal::ZERO,
        });
    }
    for (boundary, sum) in boundaries.iter().skip(1).zip(bucket_sums) {
        dates.push(BucketValue {
            key: *boundary,
            value: round_amount(*sum),
        });
    }

    let usage = round_amount(bucket_sums.iter().copied().sum());

    let non_zero: Vec<Decimal> = bucket_sums
        .iter()
        .copied()
        .filter(|value| value.is_sign_positive() && !value.is_zero())
        .collect();
    let avg_transaction = if non_zero.is_empty() {
        Decimal::ZERO
    } else {
        ratio(non_zero.iter().copied().sum(), Decimal::from(non_zero.len()))
    };

    FinancesSummary {
        dates,
        usage,
        transactions: totals.transaction_count,
        avg_transaction,
        share_in_range: ratio(usage, totals.fund_usage_in_range),
        share_total: ratio(totals.provider_usage_total, totals.fund_usage_total),
    }
}

/// Division that reports 0 for a zero denominator instead of failing.
fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    numerator
        .checked_div(denominator)
        .map_or(Decimal::ZERO, round_amount)
}

/// Splits (timestamp, amount) rows into per-bucket sums.
///
/// Each range is half-open `[start, end)`; a row outside every range is
/// dropped, which is how boundary instants stay in exactly one bucket.
#[must_use]
pub fn sum_into_buckets(
    ranges: &[(DateTime<Utc>, DateTime<Utc>)],
    rows: &[(DateTime<Utc>, Decimal)],
) -> Vec<Decimal> {
    ranges
        .iter()
        .map(|(start, end)| {
            rows.iter()
                .filter(|(at, _)| at >= start && at < end)
                .map(|(_, amount)| *amount)
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_buckets_keyed_by_boundary_with_anchor_zero() {
        let boundaries = [date(2026, 1, 1), date(2026, 1, 15), date(2026, 1, 31)];
        let sums = [dec!(35.00), dec!(12.50)];

        let summary = summarize(&boundaries, &sums, &WindowTotals::default());

        assert_eq!(summary.dates.len(), 3);
        assert_eq!(summary.dates[0].key, date(2026, 1, 1));
        assert_eq!(summary.dates[0].value, Decimal::ZERO);
        assert_eq!(summary.dates[1].key, date(2026, 1, 15));
        assert_eq!(summary.dates[1].value, dec!(35.00));
        assert_eq!(summary.dates[2].value, dec!(12.50));
    }

    #[test]
    fn test_usage_sums_buckets() {
        // Three transactions of 10, 20 and 5 landing in one bucket.
        let boundaries = [date(2026, 1, 1), date(2026, 1, 15)];
        let summary = summarize(&boundaries, &[dec!(35.00)], &WindowTotals::default());

        assert_eq!(summary.usage, dec!(35.00));
        assert_eq!(summary.avg_transaction, dec!(35.00));
    }

    #[test]
    fn test_avg_skips_empty_buckets() {
        let boundaries = [
            date(2026, 1, 1),
            date(2026, 1, 8),
            date(2026, 1, 15),
            date(2026, 1, 22),
        ];
        let sums = [dec!(30.00), Decimal::ZERO, dec!(10.00)];

        let summary = summarize(&boundaries, &sums, &WindowTotals::default());

        assert_eq!(summary.usage, dec!(40.00));
        assert_eq!(summary.avg_transaction, dec!(20.00));
    }

    #[test]
    fn test_avg_zero_when_window_unused() {
        let boundaries = [date(2026, 1, 1), date(2026, 1, 15)];
        let summary = summarize(&boundaries, &[Decimal::ZERO], &WindowTotals::default());
        assert_eq!(summary.avg_transaction, Decimal::ZERO);
    }

    #[test]
    fn test_shares_divide_provider_by_fund() {
        let boundaries = [date(2026, 1, 1), date(2026, 1, 15)];
        let totals = WindowTotals {
            transaction_count: 4,
            fund_usage_in_range: dec!(100.00),
            provider_usage_total: dec!(60.00),
            fund_usage_total: dec!(240.00),
        };

        let summary = summarize(&boundaries, &[dec!(25.00)], &totals);

        assert_eq!(summary.transactions, 4);
        assert_eq!(summary.share_in_range, dec!(0.25));
        assert_eq!(summary.share_total, dec!(0.25));
    }

    #[test]
    fn test_shares_zero_safe_on_empty_fund() {
        let boundaries = [date(2026, 1, 1), date(2026, 1, 15)];
        let totals = WindowTotals {
            transaction_count: 0,
            fund_usage_in_range: Decimal::ZERO,
            provider_usage_total: Decimal::ZERO,
            fund_usage_total: Decimal::ZERO,
        };

        let summary = summarize(&boundaries, &[Decimal::ZERO], &totals);

        assert_eq!(summary.share_in_range, Decimal::ZERO);
        assert_eq!(summary.share_total, Decimal::ZERO);
    }

    #[test]
    fn test_share_rounds_to_two_decimals() {
        let boundaries = [date(2026, 1, 1), date(2026, 1, 15)];
        let totals = WindowTotals {
            transaction_count: 1,
            fund_usage_in_range: dec!(3.00),
            provider_usage_total: dec!(1.00),
            fund_usage_total: dec!(3.00),
        };

        let summary = summarize(&boundaries, &[dec!(1.00)], &totals);

        assert_eq!(summary.share_in_range, dec!(0.33));
        assert_eq!(summary.share_total, dec!(0.33));
    }

    #[test]
    fn test_empty_boundaries_produce_empty_report() {
        let summary = summarize(&[], &[], &WindowTotals::default());
        assert!(summary.dates.is_empty());
        assert_eq!(summary.usage, Decimal::ZERO);
    }

    fn instant(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        date(y, m, d).and_hms_opt(h, 0, 0).unwrap().and_utc()
    }

    #[test]
    fn test_sum_into_buckets_assigns_each_row_once() {
        let ranges = [
            (instant(2026, 1, 1, 0), instant(2026, 1, 8, 0)),
            (instant(2026, 1, 8, 0), instant(2026, 1, 15, 0)),
        ];
        let rows = [
            (instant(2026, 1, 2, 9), dec!(10.00)),
            // Exactly on the boundary: belongs to the second bucket only.
            (instant(2026, 1, 8, 0), dec!(20.00)),
            (instant(2026, 1, 14, 23), dec!(5.00)),
        ];

        let sums = sum_into_buckets(&ranges, &rows);

        assert_eq!(sums, vec![dec!(10.00), dec!(25.00)]);
        assert_eq!(sums.iter().copied().sum::<Decimal>(), dec!(35.00));
    }

    #[test]
    fn test_sum_into_buckets_drops_rows_outside_window() {
        let ranges = [(instant(2026, 1, 1, 0), instant(2026, 1, 8, 0))];
        let rows = [
            (instant(2025, 12, 31, 12), dec!(40.00)),
            (instant(2026, 1, 8, 0), dec!(7.00)),
        ];

        assert_eq!(sum_into_buckets(&ranges, &rows), vec![Decimal::ZERO]);
    }
}

//! Cross-cutting finances report tests: boundary layouts per window and the
//! report figures derived from them.

use chrono::NaiveDate;
use rstest::rstest;
use rust_decimal_macros::dec;

use crate::finances::buckets::{bucket_dates, bucket_ranges};
use crate::finances::summary::{summarize, WindowTotals};
use crate::finances::types::{BucketConfig, ReportWindow};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[rstest]
#[case::q1(1, date(2026, 1, 1), date(2026, 3, 31))]
#[case::q2(2, date(2026, 4, 1), date(2026, 6, 30))]
#[case::q3(3, date(2026, 7, 1), date(2026, 9, 30))]
#[case::q4(4, date(2026, 10, 1), date(2026, 12, 31))]
fn quarter_windows_cover_their_quarter(
    #[case] nth: u32,
    #[case] start: NaiveDate,
    #[case] end: NaiveDate,
) {
    let dates = bucket_dates(
        ReportWindow::Quarter,
        2026,
        nth,
        &BucketConfig::default(),
        date(2026, 6, 1),
        None,
    )
    .unwrap();

    assert_eq!(dates.len(), 7);
    assert_eq!(dates.first(), Some(&start));
    assert_eq!(dates.last(), Some(&end));
    assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
}

#[rstest]
#[case::january(1, 31)]
#[case::april(4, 30)]
#[case::december(12, 31)]
fn month_windows_end_on_last_day(#[case] month: u32, #[case] last_day: u32) {
    let dates = bucket_dates(
        ReportWindow::Month,
        2026,
        month,
        &BucketConfig::default(),
        date(2026, 6, 1),
        None,
    )
    .unwrap();

    assert_eq!(dates.len(), 7);
    assert_eq!(dates.first(), Some(&date(2026, month, 1)));
    assert_eq!(dates.last(), Some(&date(2026, month, last_day)));
}

#[rstest]
#[case::mid_year(25, date(2026, 6, 15), date(2026, 6, 21))]
#[case::year_straddling(1, date(2025, 12, 29), date(2026, 1, 4))]
fn week_windows_run_monday_to_sunday(
    #[case] nth: u32,
    #[case] monday: NaiveDate,
    #[case] sunday: NaiveDate,
) {
    let dates = bucket_dates(
        ReportWindow::Week,
        2026,
        nth,
        &BucketConfig::default(),
        date(2026, 6, 1),
        None,
    )
    .unwrap();

    assert_eq!(dates.len(), 7);
    assert_eq!(dates.first(), Some(&monday));
    assert_eq!(dates.last(), Some(&sunday));
}

#[rstest]
#[case::long_history(date(2025, 1, 1), 8)]
#[case::two_weeks(date(2026, 6, 2), 8)]
#[case::one_week(date(2026, 6, 10), 8)]
#[case::four_days(date(2026, 6, 13), 5)]
#[case::yesterday(date(2026, 6, 15), 3)]
fn all_window_bucket_count_tracks_span(#[case] earliest: NaiveDate, #[case] expected_len: usize) {
    let dates = bucket_dates(
        ReportWindow::All,
        0,
        0,
        &BucketConfig::default(),
        date(2026, 6, 16),
        Some(earliest),
    )
    .unwrap();

    assert_eq!(dates.len(), expected_len);
    assert!(dates.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn custom_bucket_config_changes_layout() {
    let config = BucketConfig {
        month_day_offsets: vec![0, 14],
        ..BucketConfig::default()
    };

    let dates = bucket_dates(
        ReportWindow::Month,
        2026,
        1,
        &config,
        date(2026, 6, 1),
        None,
    )
    .unwrap();

    assert_eq!(
        dates,
        vec![date(2026, 1, 1), date(2026, 1, 15), date(2026, 1, 31)]
    );
}

#[test]
fn report_pipeline_produces_consistent_figures() {
    // A month window with all spending falling into the first bucket.
    let boundaries = bucket_dates(
        ReportWindow::Month,
        2026,
        1,
        &BucketConfig::default(),
        date(2026, 6, 1),
        None,
    )
    .unwrap();
    let ranges = bucket_ranges(&boundaries, chrono_tz::UTC);
    assert_eq!(ranges.len(), boundaries.len() - 1);

    // 10 + 20 + 5 spent between Jan 1 and Jan 5, nothing afterwards.
    let mut sums = vec![dec!(0.00); ranges.len()];
    sums[0] = dec!(35.00);

    let totals = WindowTotals {
        transaction_count: 3,
        fund_usage_in_range: dec!(70.00),
        provider_usage_total: dec!(35.00),
        fund_usage_total: dec!(140.00),
    };
    let summary = summarize(&boundaries, &sums, &totals);

    assert_eq!(summary.dates[1].value, dec!(35.00));
    assert_eq!(summary.usage, dec!(35.00));
    assert_eq!(summary.transactions, 3);
    assert_eq!(summary.avg_transaction, dec!(35.00));
    assert_eq!(summary.share_in_range, dec!(0.50));
    assert_eq!(summary.share_total, dec!(0.25));
}

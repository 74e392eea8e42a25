//! Bucket boundary generation for the finances report.
//!
//! Every window produces an ascending list of boundary dates. The report has
//! one bucket per adjacent boundary pair: bucket `i` covers the half-open
//! instant range `(end of day boundaries[i-1], end of day boundaries[i]]`,
//! which [`bucket_ranges`] materializes as UTC instants for the query layer.
//! The first boundary anchors the window and carries no summed value.

use chrono::{DateTime, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::finances::error::FinancesError;
use crate::finances::types::{BucketConfig, ReportWindow};

/// Generates the boundary dates for a reporting window.
///
/// `year` and `nth` select the period for `quarter` (1-4), `month` (1-12)
/// and `week` (ISO week number); both are ignored for `all`, which spans
/// from the day before `earliest_transaction` (or `today` when the ledger is
/// empty) to `today` in at most `config.all_max_buckets` buckets.
///
/// # Errors
///
/// Returns `FinancesError::InvalidPeriod` if `year`/`nth` do not name a
/// valid period for the window.
pub fn bucket_dates(
    window: ReportWindow,
    year: i32,
    nth: u32,
    config: &BucketConfig,
    today: NaiveDate,
    earliest_transaction: Option<NaiveDate>,
) -> Result<Vec<NaiveDate>, FinancesError> {
    let invalid = || FinancesError::InvalidPeriod {
        window: window.as_str(),
        year,
        nth,
    };

    match window {
        ReportWindow::Quarter => {
            if !(1..=4).contains(&nth) {
                return Err(invalid());
            }
            let start = NaiveDate::from_ymd_opt(year, nth * 3 - 2, 1).ok_or_else(invalid)?;
            let mut dates = Vec::with_capacity(config.quarter_offsets.len() + 1);
            for offset in &config.quarter_offsets {
                let date = start
                    .checked_add_months(Months::new(offset.months))
                    .and_then(|d| d.checked_add_days(Days::new(offset.days)))
                    .ok_or_else(invalid)?;
                dates.push(date);
            }
            dates.push(last_day_after_months(start, 3).ok_or_else(invalid)?);
            Ok(dates)
        }
        ReportWindow::Month => {
            if !(1..=12).contains(&nth) {
                return Err(invalid());
            }
            let start = NaiveDate::from_ymd_opt(year, nth, 1).ok_or_else(invalid)?;
            let mut dates = Vec::with_capacity(config.month_day_offsets.len() + 1);
            for days in &config.month_day_offsets {
                let date = start
                    .checked_add_days(Days::new(*days))
                    .ok_or_else(invalid)?;
                dates.push(date);
            }
            dates.push(last_day_after_months(start, 1).ok_or_else(invalid)?);
            Ok(dates)
        }
        ReportWindow::Week => {
            let monday = NaiveDate::from_isoywd_opt(year, nth, Weekday::Mon).ok_or_else(invalid)?;
            (0..7)
                .map(|day| monday.checked_add_days(Days::new(day)).ok_or_else(invalid))
                .collect()
        }
        ReportWindow::All => {
            let start = match earliest_transaction {
                Some(earliest) => earliest.checked_sub_days(Days::new(1)).unwrap_or(earliest),
                None => today,
            };
            Ok(range_between(start, today.max(start), config.all_max_buckets))
        }
    }
}

/// Last day of the period that ends `months` months after `start`.
fn last_day_after_months(start: NaiveDate, months: u32) -> Option<NaiveDate> {
    start
        .checked_add_months(Months::new(months))
        .and_then(|d| d.pred_opt())
}

/// Splits `[start, end]` into at most `count` boundaries of whole-day steps.
///
/// The interior boundaries land on `start + i * (span / segments)` days; a
/// span of a single day (or none) collapses to just the two endpoints.
fn range_between(start: NaiveDate, end: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let span_days = (end - start).num_days().max(0);
    let segments = i64::try_from(count.saturating_sub(1))
        .unwrap_or(i64::MAX)
        .min(span_days)
        .max(1);
    let interval = span_days / segments;

    let mut dates = vec![start];
    if span_days > 1 {
        for i in 1..segments {
            let offset = u64::try_from(interval * i).unwrap_or_default();
            if let Some(date) = start.checked_add_days(Days::new(offset)) {
                dates.push(date);
            }
        }
    }
    dates.push(end);
    dates
}

/// Today's date in the report timezone.
#[must_use]
pub fn local_today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// The exclusive end instant of `date` in `tz`: the next local midnight.
///
/// A timestamp belongs to `date` iff it is `< day_end_utc(date, tz)`, so the
/// bucket covering `(end of day a, end of day b]` is exactly
/// `day_end_utc(a) <= t < day_end_utc(b)`.
#[must_use]
pub fn day_end_utc(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let next_midnight = date
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX)
        .and_time(NaiveTime::MIN);

    // Local midnight can be skipped or doubled around DST changes; take the
    // earliest valid instant, falling back to treating it as UTC.
    tz.from_local_datetime(&next_midnight)
        .earliest()
        .map_or_else(
            || Utc.from_utc_datetime(&next_midnight),
            |local| local.with_timezone(&Utc),
        )
}

/// UTC instant ranges for each bucket between adjacent boundary dates.
///
/// Returns one `[start, end)` pair per bucket, `boundaries.len() - 1` in
/// total.
#[must_use]
pub fn bucket_ranges(boundaries: &[NaiveDate], tz: Tz) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    boundaries
        .windows(2)
        .map(|pair| (day_end_utc(pair[0], tz), day_end_utc(pair[1], tz)))
        .collect()
}

/// The UTC instant range covered by the whole window, `[start, end)`.
#[must_use]
pub fn window_range(boundaries: &[NaiveDate], tz: Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    match (boundaries.first(), boundaries.last()) {
        (Some(first), Some(last)) if boundaries.len() >= 2 => {
            Some((day_end_utc(*first, tz), day_end_utc(*last, tz)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_quarter_boundaries() {
        let dates = bucket_dates(
            ReportWindow::Quarter,
            2026,
            1,
            &BucketConfig::default(),
            date(2026, 6, 1),
            None,
        )
        .unwrap();

        assert_eq!(
            dates,
            vec![
                date(2026, 1, 1),
                date(2026, 1, 15),
                date(2026, 2, 1),
                date(2026, 2, 15),
                date(2026, 3, 1),
                date(2026, 3, 15),
                date(2026, 3, 31),
            ]
        );
    }

    #[test]
    fn test_fourth_quarter_ends_at_year_end() {
        let dates = bucket_dates(
            ReportWindow::Quarter,
            2026,
            4,
            &BucketConfig::default(),
            date(2026, 12, 1),
            None,
        )
        .unwrap();

        assert_eq!(dates.first(), Some(&date(2026, 10, 1)));
        assert_eq!(dates.last(), Some(&date(2026, 12, 31)));
    }

    #[test]
    fn test_quarter_ordinal_out_of_range() {
        for nth in [0, 5] {
            let result = bucket_dates(
                ReportWindow::Quarter,
                2026,
                nth,
                &BucketConfig::default(),
                date(2026, 6, 1),
                None,
            );
            assert!(matches!(result, Err(FinancesError::InvalidPeriod { .. })));
        }
    }

    #[test]
    fn test_month_boundaries_clamp_to_month_end() {
        let dates = bucket_dates(
            ReportWindow::Month,
            2026,
            2,
            &BucketConfig::default(),
            date(2026, 6, 1),
            None,
        )
        .unwrap();

        assert_eq!(
            dates,
            vec![
                date(2026, 2, 1),
                date(2026, 2, 5),
                date(2026, 2, 10),
                date(2026, 2, 15),
                date(2026, 2, 20),
                date(2026, 2, 25),
                date(2026, 2, 28),
            ]
        );
    }

    #[test]
    fn test_leap_february_ends_on_29th() {
        let dates = bucket_dates(
            ReportWindow::Month,
            2024,
            2,
            &BucketConfig::default(),
            date(2026, 6, 1),
            None,
        )
        .unwrap();
        assert_eq!(dates.last(), Some(&date(2024, 2, 29)));
    }

    #[test]
    fn test_week_spans_iso_week_days() {
        // ISO week 1 of 2026 starts in the previous calendar year.
        let dates = bucket_dates(
            ReportWindow::Week,
            2026,
            1,
            &BucketConfig::default(),
            date(2026, 6, 1),
            None,
        )
        .unwrap();

        assert_eq!(dates.len(), 7);
        assert_eq!(dates.first(), Some(&date(2025, 12, 29)));
        assert_eq!(dates.last(), Some(&date(2026, 1, 4)));
    }

    #[test]
    fn test_week_53_rejected_for_short_iso_year() {
        // 2025 has 52 ISO weeks; 2026 has 53.
        let result = bucket_dates(
            ReportWindow::Week,
            2025,
            53,
            &BucketConfig::default(),
            date(2026, 6, 1),
            None,
        );
        assert!(matches!(result, Err(FinancesError::InvalidPeriod { .. })));

        assert!(bucket_dates(
            ReportWindow::Week,
            2026,
            53,
            &BucketConfig::default(),
            date(2026, 6, 1),
            None,
        )
        .is_ok());
    }

    #[test]
    fn test_all_window_spreads_evenly() {
        let today = date(2026, 6, 16);
        let earliest = date(2026, 6, 2);

        // Span runs from the day before the first transaction: 15 days.
        let dates = bucket_dates(
            ReportWindow::All,
            0,
            0,
            &BucketConfig::default(),
            today,
            Some(earliest),
        )
        .unwrap();

        assert_eq!(dates.len(), 8);
        assert_eq!(dates.first(), Some(&date(2026, 6, 1)));
        assert_eq!(dates[1], date(2026, 6, 3));
        assert_eq!(dates[6], date(2026, 6, 13));
        assert_eq!(dates.last(), Some(&today));
    }

    #[test]
    fn test_all_window_short_spans_collapse() {
        let today = date(2026, 6, 16);

        let dates = bucket_dates(
            ReportWindow::All,
            0,
            0,
            &BucketConfig::default(),
            today,
            Some(date(2026, 6, 15)),
        )
        .unwrap();
        assert_eq!(dates, vec![date(2026, 6, 14), date(2026, 6, 15), today]);
    }

    #[test]
    fn test_all_window_empty_ledger() {
        let today = date(2026, 6, 16);
        let dates = bucket_dates(
            ReportWindow::All,
            0,
            0,
            &BucketConfig::default(),
            today,
            None,
        )
        .unwrap();
        assert_eq!(dates, vec![today, today]);
    }

    #[test]
    fn test_bucket_ranges_are_half_open_day_ends() {
        let boundaries = [date(2026, 1, 1), date(2026, 1, 15)];
        let ranges = bucket_ranges(&boundaries, chrono_tz::UTC);

        assert_eq!(ranges.len(), 1);
        assert_eq!(
            ranges[0].0,
            Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(
            ranges[0].1,
            Utc.with_ymd_and_hms(2026, 1, 16, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_day_end_respects_timezone() {
        let amsterdam: Tz = "Europe/Amsterdam".parse().unwrap();
        // Midnight Jan 16 in Amsterdam (UTC+1 in winter) is 23:00 UTC Jan 15.
        assert_eq!(
            day_end_utc(date(2026, 1, 15), amsterdam),
            Utc.with_ymd_and_hms(2026, 1, 15, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_local_today_crosses_date_line() {
        let amsterdam: Tz = "Europe/Amsterdam".parse().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 23, 30, 0).unwrap();
        assert_eq!(local_today(now, amsterdam), date(2026, 3, 16));
        assert_eq!(local_today(now, chrono_tz::UTC), date(2026, 3, 15));
    }

    #[test]
    fn test_window_range_covers_all_buckets() {
        let boundaries = [date(2026, 1, 1), date(2026, 1, 15), date(2026, 1, 31)];
        let (start, end) = window_range(&boundaries, chrono_tz::UTC).unwrap();

        assert_eq!(start, day_end_utc(date(2026, 1, 1), chrono_tz::UTC));
        assert_eq!(end, day_end_utc(date(2026, 1, 31), chrono_tz::UTC));
        assert!(window_range(&boundaries[..1], chrono_tz::UTC).is_none());
    }
}

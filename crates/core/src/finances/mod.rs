//! Time-bucketed spending reports over the transaction ledger.
//!
//! # Modules
//!
//! - `types` - Window selectors, category filter, bucket configuration
//! - `error` - Caller errors, rejected before any I/O
//! - `buckets` - Boundary date generation and timezone handling
//! - `summary` - Derived report figures (usage, averages, shares)

pub mod buckets;
pub mod error;
pub mod summary;
pub mod types;

#[cfg(test)]
mod tests;

pub use buckets::{bucket_dates, bucket_ranges, day_end_utc, local_today, window_range};
pub use error::FinancesError;
pub use summary::{sum_into_buckets, summarize, WindowTotals};
pub use types::{
    BucketConfig, BucketOffset, BucketValue, CategoryFilter, FinancesSummary, ReportWindow,
    UNCATEGORIZED_SENTINEL,
};

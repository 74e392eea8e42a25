//! Finances report error types.

use thiserror::Error;

/// Errors for the finances report, all caller errors rejected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinancesError {
    /// Unknown reporting window selector.
    #[error("Unknown reporting window: {0}")]
    InvalidWindow(String),

    /// Year/ordinal pair does not name a valid period for the window.
    #[error("Invalid period: {window} {nth} of year {year}")]
    InvalidPeriod {
        /// The window the period was requested for.
        window: &'static str,
        /// The requested year.
        year: i32,
        /// The requested ordinal within the year.
        nth: u32,
    },

    /// Category filter is neither the sentinel nor a valid identifier.
    #[error("Invalid product category filter: {0}")]
    InvalidCategory(String),
}

impl FinancesError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidWindow(_) | Self::InvalidPeriod { .. } | Self::InvalidCategory(_) => 400,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidWindow(_) => "INVALID_WINDOW",
            Self::InvalidPeriod { .. } => "INVALID_PERIOD",
            Self::InvalidCategory(_) => "INVALID_CATEGORY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_window_error() {
        let err = FinancesError::InvalidWindow("decade".to_string());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "INVALID_WINDOW");
        assert!(err.to_string().contains("decade"));
    }

    #[test]
    fn test_invalid_period_error() {
        let err = FinancesError::InvalidPeriod {
            window: "quarter",
            year: 2026,
            nth: 5,
        };
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "INVALID_PERIOD");
        assert!(err.to_string().contains("quarter 5"));
    }

    #[test]
    fn test_invalid_category_error() {
        let err = FinancesError::InvalidCategory("not-a-uuid".to_string());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "INVALID_CATEGORY");
    }
}

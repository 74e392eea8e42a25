//! Fund provider approval types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Approval state of a provider organization for one fund.
///
/// A provider may only receive redemptions against a fund while `approved`.
/// The machine is not one-way: the sponsor may set any state at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundProviderState {
    /// Application received, awaiting a sponsor decision.
    Pending,
    /// Provider may receive redemptions for the fund.
    Approved,
    /// Provider was refused (or revoked) by the sponsor.
    Declined,
}

impl FundProviderState {
    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }

    /// Parses a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }

    /// Returns true if the provider may receive redemptions.
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl fmt::Display for FundProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event emitted by a state change, consumed asynchronously by the notifier.
///
/// Emission is decoupled from dispatch: the workflow only describes what
/// happened, and the caller hands events to the notification service after
/// the row update has committed. A failed dispatch never affects the
/// transition itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The provider was approved for the fund.
    Approved {
        /// When the sponsor issued the approval.
        approved_at: DateTime<Utc>,
    },
    /// The provider was declined for the fund.
    Declined {
        /// When the sponsor issued the decline.
        declined_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_as_str() {
        assert_eq!(FundProviderState::Pending.as_str(), "pending");
        assert_eq!(FundProviderState::Approved.as_str(), "approved");
        assert_eq!(FundProviderState::Declined.as_str(), "declined");
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(
            FundProviderState::parse("pending"),
            Some(FundProviderState::Pending)
        );
        assert_eq!(
            FundProviderState::parse("APPROVED"),
            Some(FundProviderState::Approved)
        );
        assert_eq!(
            FundProviderState::parse("Declined"),
            Some(FundProviderState::Declined)
        );
        assert_eq!(FundProviderState::parse("rejected"), None);
    }

    #[test]
    fn test_only_approved_state_permits_redemptions() {
        assert!(!FundProviderState::Pending.is_approved());
        assert!(FundProviderState::Approved.is_approved());
        assert!(!FundProviderState::Declined.is_approved());
    }
}

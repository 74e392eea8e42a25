//! Fund provider approval state machine.
//!
//! Only the fund's sponsor transitions a provider, and any target state is
//! legal from any current state. The interesting part is the side-effect
//! contract: a *change* into `approved` or `declined` emits an event for the
//! notifier, while setting the current state again is an idempotent no-op
//! that emits nothing, so no duplicate notification can ever be dispatched.

use chrono::{DateTime, Utc};

use crate::provider::types::{FundProviderState, ProviderEvent};

/// Result of applying a sponsor's state decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// The state before the decision.
    pub previous: FundProviderState,
    /// The state after the decision.
    pub current: FundProviderState,
    /// Events to hand to the notifier once the update has committed.
    pub events: Vec<ProviderEvent>,
}

impl StateChange {
    /// Returns true if the decision left the state untouched.
    ///
    /// No-op changes must not touch the row's `updated_at` either.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.previous == self.current
    }
}

/// Stateless approval workflow transition logic.
pub struct ApprovalWorkflow;

impl ApprovalWorkflow {
    /// Applies a sponsor's decision to set a provider to `target`.
    ///
    /// Never fails: every (current, target) pair is a legal transition. The
    /// actor check (sponsor-only) belongs to the caller, which knows who is
    /// asking; this function only decides the resulting state and events.
    #[must_use]
    pub fn set_state(
        current: FundProviderState,
        target: FundProviderState,
        now: DateTime<Utc>,
    ) -> StateChange {
        if current == target {
            return StateChange {
                previous: current,
                current,
                events: Vec::new(),
            };
        }

        let events = match target {
            FundProviderState::Approved => vec![ProviderEvent::Approved { approved_at: now }],
            FundProviderState::Declined => vec![ProviderEvent::Declined { declined_at: now }],
            // No side effect is defined for a reset to pending.
            FundProviderState::Pending => Vec::new(),
        };

        StateChange {
            previous: current,
            current: target,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_approving_pending_provider_emits_event() {
        let change = ApprovalWorkflow::set_state(
            FundProviderState::Pending,
            FundProviderState::Approved,
            now(),
        );

        assert_eq!(change.previous, FundProviderState::Pending);
        assert_eq!(change.current, FundProviderState::Approved);
        assert!(!change.is_noop());
        assert_eq!(
            change.events,
            vec![ProviderEvent::Approved { approved_at: now() }]
        );
    }

    #[test]
    fn test_declining_pending_provider_emits_event() {
        let change = ApprovalWorkflow::set_state(
            FundProviderState::Pending,
            FundProviderState::Declined,
            now(),
        );

        assert_eq!(change.current, FundProviderState::Declined);
        assert_eq!(
            change.events,
            vec![ProviderEvent::Declined { declined_at: now() }]
        );
    }

    #[test]
    fn test_same_state_is_noop_without_events() {
        for state in [
            FundProviderState::Pending,
            FundProviderState::Approved,
            FundProviderState::Declined,
        ] {
            let change = ApprovalWorkflow::set_state(state, state, now());
            assert!(change.is_noop());
            assert!(change.events.is_empty());
        }
    }

    #[test]
    fn test_sponsor_can_revoke_approval() {
        let change = ApprovalWorkflow::set_state(
            FundProviderState::Approved,
            FundProviderState::Declined,
            now(),
        );

        assert_eq!(change.current, FundProviderState::Declined);
        assert_eq!(
            change.events,
            vec![ProviderEvent::Declined { declined_at: now() }]
        );
    }

    #[test]
    fn test_sponsor_can_reset_to_pending_without_event() {
        let change = ApprovalWorkflow::set_state(
            FundProviderState::Approved,
            FundProviderState::Pending,
            now(),
        );

        assert_eq!(change.current, FundProviderState::Pending);
        assert!(!change.is_noop());
        assert!(change.events.is_empty());
    }

    #[test]
    fn test_declined_provider_can_be_approved_later() {
        let change = ApprovalWorkflow::set_state(
            FundProviderState::Declined,
            FundProviderState::Approved,
            now(),
        );

        assert_eq!(change.current, FundProviderState::Approved);
        assert_eq!(
            change.events,
            vec![ProviderEvent::Approved { approved_at: now() }]
        );
    }

    #[test]
    fn test_reapplying_a_decision_emits_nothing() {
        let first = ApprovalWorkflow::set_state(
            FundProviderState::Pending,
            FundProviderState::Approved,
            now(),
        );
        let second = ApprovalWorkflow::set_state(first.current, FundProviderState::Approved, now());

        assert!(second.is_noop());
        assert!(second.events.is_empty());
    }
}

//! Property-based tests for the approval workflow.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use crate::provider::types::{FundProviderState, ProviderEvent};
use crate::provider::workflow::ApprovalWorkflow;

fn arb_state() -> impl Strategy<Value = FundProviderState> {
    prop_oneof![
        Just(FundProviderState::Pending),
        Just(FundProviderState::Approved),
        Just(FundProviderState::Declined),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every (current, target) pair resolves to the target state.
    #[test]
    fn prop_target_state_always_reached(current in arb_state(), target in arb_state()) {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
        let change = ApprovalWorkflow::set_state(current, target, now);

        prop_assert_eq!(change.previous, current);
        prop_assert_eq!(change.current, target);
    }

    /// Events are emitted exactly when the state changes into a state with a
    /// defined side effect; pending resets and no-ops stay silent.
    #[test]
    fn prop_events_match_transition(current in arb_state(), target in arb_state()) {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
        let change = ApprovalWorkflow::set_state(current, target, now);

        match (current == target, target) {
            (true, _) | (false, FundProviderState::Pending) => {
                prop_assert!(change.events.is_empty());
            }
            (false, FundProviderState::Approved) => {
                prop_assert_eq!(
                    &change.events,
                    &vec![ProviderEvent::Approved { approved_at: now }]
                );
            }
            (false, FundProviderState::Declined) => {
                prop_assert_eq!(
                    &change.events,
                    &vec![ProviderEvent::Declined { declined_at: now }]
                );
            }
        }
    }

    /// Applying the same decision twice never produces a second event.
    #[test]
    fn prop_second_application_is_silent(current in arb_state(), target in arb_state()) {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
        let first = ApprovalWorkflow::set_state(current, target, now);
        let second = ApprovalWorkflow::set_state(first.current, target, now);

        prop_assert!(second.is_noop());
        prop_assert!(second.events.is_empty());
    }
}

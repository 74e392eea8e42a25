//! Fund provider approval: the state machine gating who may redeem.
//!
//! # Modules
//!
//! - `types` - Provider states and notification events
//! - `workflow` - Sponsor decisions and their event contract

pub mod types;
pub mod workflow;

#[cfg(test)]
mod workflow_props;

pub use types::{FundProviderState, ProviderEvent};
pub use workflow::{ApprovalWorkflow, StateChange};

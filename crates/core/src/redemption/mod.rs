//! Redemption authorization: who may redeem which voucher, and why not.
//!
//! # Modules
//!
//! - `types` - Context snapshot and typed denial reasons
//! - `authorizer` - The ordered decision function

pub mod authorizer;
pub mod types;

#[cfg(test)]
mod authorizer_props;

pub use authorizer::RedemptionAuthorizer;
pub use types::{DenialReason, RedemptionContext};

//! Voucher domain: kinds, fund and transaction states, balance derivation.
//!
//! # Modules
//!
//! - `types` - Voucher kinds and lifecycle state enums
//! - `balance` - Balance derivation from the transaction ledger

pub mod balance;
pub mod types;

#[cfg(test)]
mod balance_props;

pub use balance::{is_expired, round_amount, BalanceBreakdown, BALANCE_SCALE};
pub use types::{FundState, TransactionState, VoucherKind};

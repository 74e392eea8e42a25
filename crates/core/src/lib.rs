//! Core business logic for Tegoed.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `voucher` - Voucher kinds, balance derivation, and expiry
//! - `redemption` - Redemption authorization decisions
//! - `provider` - Fund provider application state machine
//! - `finances` - Time-bucketed spending reports

pub mod finances;
pub mod provider;
pub mod redemption;
pub mod voucher;

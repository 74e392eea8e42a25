//! Shared types, errors, and configuration for Tegoed.
//!
//! This crate provides common pieces used across all other crates:
//! - Pagination types for list endpoints
//! - Configuration management
//! - Identity bearer-token validation
//! - The notification dispatcher (email, fire-and-forget)

pub mod config;
pub mod jwt;
pub mod notifier;
pub mod types;

pub use config::AppConfig;
pub use jwt::{Claims, JwtConfig, JwtError, JwtService};
pub use notifier::{Notifier, NotifierError};

//! `SeaORM` active enums mapped to the Postgres enum types.
//!
//! These mirror the pure enums in `tegoed-core`; the `From` conversions at
//! the bottom keep the two worlds in sync so repositories can hand rows to
//! the domain logic without string round-trips.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a fund.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "fund_state")]
#[serde(rename_all = "lowercase")]
pub enum FundState {
    /// Announced but not yet open for redemptions.
    #[sea_orm(string_value = "waiting")]
    Waiting,
    /// Open: vouchers against this fund may be redeemed.
    #[sea_orm(string_value = "active")]
    Active,
    /// Temporarily suspended.
    #[sea_orm(string_value = "paused")]
    Paused,
    /// Permanently ended.
    #[sea_orm(string_value = "closed")]
    Closed,
}

/// Approval state of a fund-provider application.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "fund_provider_state")]
#[serde(rename_all = "lowercase")]
pub enum FundProviderState {
    /// Applied, awaiting the sponsor's decision.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Approved to redeem vouchers against the fund.
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Rejected by the sponsor.
    #[sea_orm(string_value = "declined")]
    Declined,
}

/// Settlement state of a voucher transaction.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "transaction_state")]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Recorded, payout not yet settled.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Payout completed.
    #[sea_orm(string_value = "success")]
    Success,
    /// Payout canceled.
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

impl From<FundState> for tegoed_core::voucher::FundState {
    fn from(state: FundState) -> Self {
        match state {
            FundState::Waiting => Self::Waiting,
            FundState::Active => Self::Active,
            FundState::Paused => Self::Paused,
            FundState::Closed => Self::Closed,
        }
    }
}

impl From<tegoed_core::voucher::FundState> for FundState {
    fn from(state: tegoed_core::voucher::FundState) -> Self {
        match state {
            tegoed_core::voucher::FundState::Waiting => Self::Waiting,
            tegoed_core::voucher::FundState::Active => Self::Active,
            tegoed_core::voucher::FundState::Paused => Self::Paused,
            tegoed_core::voucher::FundState::Closed => Self::Closed,
        }
    }
}

impl From<FundProviderState> for tegoed_core::provider::FundProviderState {
    fn from(state: FundProviderState) -> Self {
        match state {
            FundProviderState::Pending => Self::Pending,
            FundProviderState::Approved => Self::Approved,
            FundProviderState::Declined => Self::Declined,
        }
    }
}

impl From<tegoed_core::provider::FundProviderState> for FundProviderState {
    fn from(state: tegoed_core::provider::FundProviderState) -> Self {
        match state {
            tegoed_core::provider::FundProviderState::Pending => Self::Pending,
            tegoed_core::provider::FundProviderState::Approved => Self::Approved,
            tegoed_core::provider::FundProviderState::Declined => Self::Declined,
        }
    }
}

impl From<TransactionState> for tegoed_core::voucher::TransactionState {
    fn from(state: TransactionState) -> Self {
        match state {
            TransactionState::Pending => Self::Pending,
            TransactionState::Success => Self::Success,
            TransactionState::Canceled => Self::Canceled,
        }
    }
}

impl From<tegoed_core::voucher::TransactionState> for TransactionState {
    fn from(state: tegoed_core::voucher::TransactionState) -> Self {
        match state {
            tegoed_core::voucher::TransactionState::Pending => Self::Pending,
            tegoed_core::voucher::TransactionState::Success => Self::Success,
            tegoed_core::voucher::TransactionState::Canceled => Self::Canceled,
        }
    }
}

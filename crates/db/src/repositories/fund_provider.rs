//! Fund-provider repository: applications and the approval state machine.
//!
//! The transition logic itself lives in `tegoed_core::provider`; this
//! repository wraps it in a single-row atomic update and reports the
//! resulting events so the caller can notify *after* commit.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use tegoed_core::provider::{ApprovalWorkflow, StateChange};

use crate::entities::{
    fund_providers, funds, organizations, sea_orm_active_enums::FundProviderState,
};

/// Error types for fund-provider operations.
#[derive(Debug, thiserror::Error)]
pub enum FundProviderError {
    /// Fund-provider row not found.
    #[error("Fund provider not found: {0}")]
    NotFound(Uuid),

    /// The organization already applied to this fund.
    #[error("Organization {organization_id} already applied to fund {fund_id}")]
    AlreadyApplied {
        /// The fund applied to.
        fund_id: Uuid,
        /// The applying organization.
        organization_id: Uuid,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Fund-provider repository for application and approval operations.
#[derive(Debug, Clone)]
pub struct FundProviderRepository {
    db: DatabaseConnection,
}

impl FundProviderRepository {
    /// Creates a new fund-provider repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records a provider organization's application to a fund.
    ///
    /// The row starts in `pending`; `(fund, organization)` is unique.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyApplied` on a duplicate application, or a database
    /// error.
    pub async fn apply(
        &self,
        fund_id: Uuid,
        organization_id: Uuid,
    ) -> Result<fund_providers::Model, FundProviderError> {
        let existing = fund_providers::Entity::find()
            .filter(fund_providers::Column::FundId.eq(fund_id))
            .filter(fund_providers::Column::OrganizationId.eq(organization_id))
            .count(&self.db)
            .await?;

        if existing > 0 {
            return Err(FundProviderError::AlreadyApplied {
                fund_id,
                organization_id,
            });
        }

        let now = Utc::now().into();
        let row = fund_providers::ActiveModel {
            id: Set(Uuid::new_v4()),
            fund_id: Set(fund_id),
            organization_id: Set(organization_id),
            state: Set(FundProviderState::Pending),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(row.insert(&self.db).await?)
    }

    /// Finds a fund-provider row by ID, scoped to its fund.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_for_fund(
        &self,
        fund_id: Uuid,
        id: Uuid,
    ) -> Result<Option<fund_providers::Model>, FundProviderError> {
        Ok(fund_providers::Entity::find_by_id(id)
            .filter(fund_providers::Column::FundId.eq(fund_id))
            .one(&self.db)
            .await?)
    }

    /// Lists a fund's provider rows with their organizations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_fund(
        &self,
        fund_id: Uuid,
        state: Option<FundProviderState>,
    ) -> Result<Vec<(fund_providers::Model, organizations::Model)>, FundProviderError> {
        let mut query = fund_providers::Entity::find()
            .filter(fund_providers::Column::FundId.eq(fund_id));

        if let Some(state) = state {
            query = query.filter(fund_providers::Column::State.eq(state));
        }

        let rows = query
            .order_by_desc(fund_providers::Column::CreatedAt)
            .find_also_related(organizations::Entity)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(row, org)| org.map(|o| (row, o)))
            .collect())
    }

    /// Lists a provider organization's own applications with their funds.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_organization(
        &self,
        organization_id: Uuid,
        state: Option<FundProviderState>,
        fund_id: Option<Uuid>,
    ) -> Result<Vec<(fund_providers::Model, funds::Model)>, FundProviderError> {
        let mut query = fund_providers::Entity::find()
            .filter(fund_providers::Column::OrganizationId.eq(organization_id));

        if let Some(state) = state {
            query = query.filter(fund_providers::Column::State.eq(state));
        }
        if let Some(fund_id) = fund_id {
            query = query.filter(fund_providers::Column::FundId.eq(fund_id));
        }

        let rows = query
            .order_by_desc(fund_providers::Column::CreatedAt)
            .find_also_related(funds::Entity)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(row, fund)| fund.map(|f| (row, f)))
            .collect())
    }

    /// The organizations currently approved as providers for a fund.
    ///
    /// This is the approved-provider set the redemption authorizer consumes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn approved_organization_ids(
        &self,
        fund_id: Uuid,
    ) -> Result<HashSet<Uuid>, FundProviderError> {
        let ids: Vec<Uuid> = fund_providers::Entity::find()
            .filter(fund_providers::Column::FundId.eq(fund_id))
            .filter(fund_providers::Column::State.eq(FundProviderState::Approved))
            .select_only()
            .column(fund_providers::Column::OrganizationId)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(ids.into_iter().collect())
    }

    /// Applies a sponsor's state decision to a fund-provider row.
    ///
    /// Any target state is legal from any current state. A same-state
    /// decision performs no update at all: the row's `updated_at` stays
    /// untouched and the returned change carries no events, so the caller
    /// never double-notifies.
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not exist or the update fails.
    pub async fn set_state(
        &self,
        id: Uuid,
        target: tegoed_core::provider::FundProviderState,
        now: DateTime<Utc>,
    ) -> Result<(fund_providers::Model, StateChange), FundProviderError> {
        let row = fund_providers::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(FundProviderError::NotFound(id))?;

        let change = ApprovalWorkflow::set_state(row.state.clone().into(), target, now);

        if change.is_noop() {
            return Ok((row, change));
        }

        let mut active: fund_providers::ActiveModel = row.into();
        active.state = Set(change.current.into());
        active.updated_at = Set(now.into());
        let updated = active.update(&self.db).await?;

        Ok((updated, change))
    }
}

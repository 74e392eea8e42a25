//! Fund repository for database operations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::entities::{funds, sea_orm_active_enums::FundState};

/// Fund repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct FundRepository {
    db: DatabaseConnection,
}

impl FundRepository {
    /// Creates a new fund repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a fund by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<funds::Model>, DbErr> {
        funds::Entity::find_by_id(id).one(&self.db).await
    }

    /// Finds a fund by ID, scoped to its sponsor organization.
    ///
    /// Returns `None` when the fund exists but belongs to a different
    /// sponsor, so route handlers cannot leak cross-sponsor data.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_sponsor_fund(
        &self,
        organization_id: Uuid,
        fund_id: Uuid,
    ) -> Result<Option<funds::Model>, DbErr> {
        funds::Entity::find_by_id(fund_id)
            .filter(funds::Column::OrganizationId.eq(organization_id))
            .one(&self.db)
            .await
    }

    /// Creates a new fund in the `waiting` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(
        &self,
        organization_id: Uuid,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        allocation_amount: Decimal,
    ) -> Result<funds::Model, DbErr> {
        let now = chrono::Utc::now().into();

        let fund = funds::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            name: Set(name.to_string()),
            state: Set(FundState::Waiting),
            start_date: Set(start_date),
            end_date: Set(end_date),
            allocation_amount: Set(allocation_amount),
            created_at: Set(now),
            updated_at: Set(now),
        };

        fund.insert(&self.db).await
    }

    /// Sets a fund's lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns an error if the fund does not exist or the update fails.
    pub async fn set_state(&self, fund_id: Uuid, state: FundState) -> Result<funds::Model, DbErr> {
        let fund = funds::Entity::find_by_id(fund_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("fund {fund_id}")))?;

        let mut active: funds::ActiveModel = fund.into();
        active.state = Set(state);
        active.updated_at = Set(chrono::Utc::now().into());

        active.update(&self.db).await
    }
}

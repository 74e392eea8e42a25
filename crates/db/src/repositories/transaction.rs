//! Voucher-transaction repository: scoped search and export over the
//! ledger, payout settling, and the aggregate loaders behind the finances
//! report.
//!
//! Every read goes through one scoped base query so sponsor, provider and
//! holder views cannot drift apart in what they join or filter. Settling is
//! a one-way street: a `pending` row moves to `success` or `canceled`
//! exactly once, under a row lock.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Select, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use tegoed_core::finances::CategoryFilter;
use tegoed_shared::types::PageRequest;

use crate::entities::{
    funds, organizations, products, sea_orm_active_enums::TransactionState, voucher_transactions,
    vouchers,
};

/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    NotFound(Uuid),

    /// The transaction already left the pending state.
    #[error("Transaction already settled as {state}")]
    AlreadySettled {
        /// The terminal state the row holds.
        state: tegoed_core::voucher::TransactionState,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Which slice of the ledger a query may see.
///
/// Authorization happens before a scope is built; the scope then makes the
/// query structurally unable to return rows outside the caller's view.
#[derive(Debug, Clone)]
pub enum TransactionScope {
    /// All transactions on funds the sponsor organization owns.
    Sponsor {
        /// The sponsor organization.
        organization_id: Uuid,
        /// Narrow to one fund.
        fund_id: Option<Uuid>,
        /// Narrow to one receiving provider.
        provider_id: Option<Uuid>,
    },
    /// Transactions received by one provider organization.
    Provider {
        /// The provider organization.
        organization_id: Uuid,
    },
    /// Transactions of one voucher (the holder's view).
    Voucher {
        /// The voucher.
        voucher_id: Uuid,
    },
}

/// Optional filters over a scoped transaction query.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Free-text search over fund name, provider name, or exact id.
    pub q: Option<String>,
    /// Settlement state.
    pub state: Option<TransactionState>,
    /// Earliest creation day, inclusive.
    pub from: Option<NaiveDate>,
    /// Latest creation day, inclusive.
    pub to: Option<NaiveDate>,
    /// Minimum amount, inclusive.
    pub amount_min: Option<Decimal>,
    /// Maximum amount, inclusive.
    pub amount_max: Option<Decimal>,
}

/// One ledger row with the display names its consumers need.
#[derive(Debug, Clone, FromQueryResult, Serialize)]
pub struct TransactionRow {
    /// Transaction id.
    pub id: Uuid,
    /// The voucher that was charged.
    pub voucher_id: Uuid,
    /// The receiving provider organization.
    pub organization_id: Uuid,
    /// Product paid for, when any.
    pub product_id: Option<Uuid>,
    /// Deducted amount.
    pub amount: Decimal,
    /// Settlement state.
    pub state: TransactionState,
    /// When the redemption was recorded.
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
    /// The fund the charged voucher draws from.
    pub fund_id: Uuid,
    /// Fund display name.
    pub fund_name: String,
    /// Provider display name.
    pub provider_name: String,
}

/// Transaction repository over the redemption ledger.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    /// Creates a new transaction repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Searches the ledger within a scope, newest first, paginated.
    ///
    /// Returns the page of rows and the total match count.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search(
        &self,
        scope: &TransactionScope,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> Result<(Vec<TransactionRow>, u64), TransactionError> {
        let total = apply_filter(scoped_query(scope), filter)
            .count(&self.db)
            .await?;

        let rows = apply_filter(row_query(scope), filter)
            .order_by_desc(voucher_transactions::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .into_model::<TransactionRow>()
            .all(&self.db)
            .await?;

        Ok((rows, total))
    }

    /// Loads every matching row for a file export, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn export(
        &self,
        scope: &TransactionScope,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRow>, TransactionError> {
        Ok(apply_filter(row_query(scope), filter)
            .order_by_asc(voucher_transactions::Column::CreatedAt)
            .into_model::<TransactionRow>()
            .all(&self.db)
            .await?)
    }

    /// Records one payout attempt on a pending transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the row is missing, already settled, or the
    /// database fails.
    pub async fn record_attempt(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<voucher_transactions::Model, TransactionError> {
        let txn = self.db.begin().await?;
        let row = lock_pending(&txn, id).await?;

        let attempts = row.attempts;
        let mut active: voucher_transactions::ActiveModel = row.into();
        active.attempts = Set(attempts.saturating_add(1));
        active.last_attempt_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        Ok(updated)
    }

    /// Settles a pending transaction as paid out.
    ///
    /// # Errors
    ///
    /// Returns an error if the row is missing, already settled, or the
    /// database fails.
    pub async fn mark_success(
        &self,
        id: Uuid,
        payment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<voucher_transactions::Model, TransactionError> {
        self.settle(id, TransactionState::Success, Some(payment_id), now)
            .await
    }

    /// Settles a pending transaction as canceled.
    ///
    /// The amount stays spent; cancellation only ends the payout, it never
    /// refunds the voucher.
    ///
    /// # Errors
    ///
    /// Returns an error if the row is missing, already settled, or the
    /// database fails.
    pub async fn mark_canceled(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<voucher_transactions::Model, TransactionError> {
        self.settle(id, TransactionState::Canceled, None, now).await
    }

    async fn settle(
        &self,
        id: Uuid,
        state: TransactionState,
        payment_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<voucher_transactions::Model, TransactionError> {
        let txn = self.db.begin().await?;
        let row = lock_pending(&txn, id).await?;

        let mut active: voucher_transactions::ActiveModel = row.into();
        active.state = Set(state);
        if let Some(payment_id) = payment_id {
            active.payment_id = Set(Some(payment_id));
        }
        active.updated_at = Set(now.into());

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        Ok(updated)
    }

    /// Timestamp of the provider's oldest transaction on a fund.
    ///
    /// Anchors the `all` reporting window.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn earliest_provider_transaction(
        &self,
        fund_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, TransactionError> {
        let first: Option<chrono::DateTime<chrono::FixedOffset>> =
            provider_on_fund(fund_id, organization_id)
                .select_only()
                .column(voucher_transactions::Column::CreatedAt)
                .order_by_asc(voucher_transactions::Column::CreatedAt)
                .into_tuple()
                .one(&self.db)
                .await?;

        Ok(first.map(|at| at.with_timezone(&Utc)))
    }

    /// Loads the provider's (timestamp, amount) pairs on a fund within
    /// `[start, end)`, optionally narrowed to a product category.
    ///
    /// The caller splits the pairs into report buckets in memory; one fetch
    /// covers the whole window.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn provider_window_rows(
        &self,
        fund_id: Uuid,
        organization_id: Uuid,
        range: (DateTime<Utc>, DateTime<Utc>),
        category: Option<&CategoryFilter>,
    ) -> Result<Vec<(DateTime<Utc>, Decimal)>, TransactionError> {
        let mut query = provider_on_fund(fund_id, organization_id)
            .filter(voucher_transactions::Column::CreatedAt.gte(range.0))
            .filter(voucher_transactions::Column::CreatedAt.lt(range.1));

        match category {
            Some(CategoryFilter::Uncategorized) => {
                query = query.filter(voucher_transactions::Column::ProductId.is_null());
            }
            Some(CategoryFilter::Category(category_id)) => {
                query = query
                    .join(
                        JoinType::InnerJoin,
                        voucher_transactions::Relation::Products.def(),
                    )
                    .filter(products::Column::ProductCategoryId.eq(*category_id));
            }
            None => {}
        }

        let rows: Vec<(chrono::DateTime<chrono::FixedOffset>, Decimal)> = query
            .select_only()
            .column(voucher_transactions::Column::CreatedAt)
            .column(voucher_transactions::Column::Amount)
            .order_by_asc(voucher_transactions::Column::CreatedAt)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(at, amount)| (at.with_timezone(&Utc), amount))
            .collect())
    }

    /// The provider's all-time usage on a fund.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn provider_usage_total(
        &self,
        fund_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Decimal, TransactionError> {
        let amounts: Vec<Decimal> = provider_on_fund(fund_id, organization_id)
            .select_only()
            .column(voucher_transactions::Column::Amount)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(amounts.iter().sum())
    }

    /// The whole fund's usage across all providers, optionally limited to
    /// `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn fund_usage(
        &self,
        fund_id: Uuid,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Decimal, TransactionError> {
        let mut query = voucher_transactions::Entity::find()
            .join(
                JoinType::InnerJoin,
                voucher_transactions::Relation::Vouchers.def(),
            )
            .filter(vouchers::Column::FundId.eq(fund_id));

        if let Some((start, end)) = range {
            query = query
                .filter(voucher_transactions::Column::CreatedAt.gte(start))
                .filter(voucher_transactions::Column::CreatedAt.lt(end));
        }

        let amounts: Vec<Decimal> = query
            .select_only()
            .column(voucher_transactions::Column::Amount)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(amounts.iter().sum())
    }
}

/// The scoped base query: ledger rows joined to voucher, fund and provider.
fn scoped_query(scope: &TransactionScope) -> Select<voucher_transactions::Entity> {
    let query = voucher_transactions::Entity::find()
        .join(
            JoinType::InnerJoin,
            voucher_transactions::Relation::Vouchers.def(),
        )
        .join(JoinType::InnerJoin, vouchers::Relation::Funds.def())
        .join(
            JoinType::InnerJoin,
            voucher_transactions::Relation::Organizations.def(),
        );

    match scope {
        TransactionScope::Sponsor {
            organization_id,
            fund_id,
            provider_id,
        } => {
            let mut query = query.filter(funds::Column::OrganizationId.eq(*organization_id));
            if let Some(fund_id) = fund_id {
                query = query.filter(vouchers::Column::FundId.eq(*fund_id));
            }
            if let Some(provider_id) = provider_id {
                query =
                    query.filter(voucher_transactions::Column::OrganizationId.eq(*provider_id));
            }
            query
        }
        TransactionScope::Provider { organization_id } => {
            query.filter(voucher_transactions::Column::OrganizationId.eq(*organization_id))
        }
        TransactionScope::Voucher { voucher_id } => {
            query.filter(voucher_transactions::Column::VoucherId.eq(*voucher_id))
        }
    }
}

/// The scoped query with the display columns [`TransactionRow`] needs.
fn row_query(scope: &TransactionScope) -> Select<voucher_transactions::Entity> {
    scoped_query(scope)
        .column_as(vouchers::Column::FundId, "fund_id")
        .column_as(funds::Column::Name, "fund_name")
        .column_as(organizations::Column::Name, "provider_name")
}

/// Applies the optional filters to a scoped query.
fn apply_filter(
    mut query: Select<voucher_transactions::Entity>,
    filter: &TransactionFilter,
) -> Select<voucher_transactions::Entity> {
    if let Some(state) = &filter.state {
        query = query.filter(voucher_transactions::Column::State.eq(state.clone()));
    }
    if let Some(from) = filter.from {
        query = query.filter(voucher_transactions::Column::CreatedAt.gte(day_start_utc(from)));
    }
    if let Some(to) = filter.to {
        query = query.filter(voucher_transactions::Column::CreatedAt.lt(day_after_utc(to)));
    }
    if let Some(min) = filter.amount_min {
        query = query.filter(voucher_transactions::Column::Amount.gte(min));
    }
    if let Some(max) = filter.amount_max {
        query = query.filter(voucher_transactions::Column::Amount.lte(max));
    }
    if let Some(q) = &filter.q {
        let q = q.trim();
        if !q.is_empty() {
            let mut any = Condition::any()
                .add(funds::Column::Name.contains(q))
                .add(organizations::Column::Name.contains(q));
            if let Ok(id) = Uuid::parse_str(q) {
                any = any.add(voucher_transactions::Column::Id.eq(id));
            }
            query = query.filter(any);
        }
    }
    query
}

/// The provider's ledger rows on one fund, unfiltered.
fn provider_on_fund(fund_id: Uuid, organization_id: Uuid) -> Select<voucher_transactions::Entity> {
    voucher_transactions::Entity::find()
        .join(
            JoinType::InnerJoin,
            voucher_transactions::Relation::Vouchers.def(),
        )
        .filter(vouchers::Column::FundId.eq(fund_id))
        .filter(voucher_transactions::Column::OrganizationId.eq(organization_id))
}

/// Locks a transaction row and verifies it is still pending.
async fn lock_pending(
    txn: &sea_orm::DatabaseTransaction,
    id: Uuid,
) -> Result<voucher_transactions::Model, TransactionError> {
    let row = voucher_transactions::Entity::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(TransactionError::NotFound(id))?;

    if row.state != TransactionState::Pending {
        return Err(TransactionError::AlreadySettled {
            state: row.state.into(),
        });
    }

    Ok(row)
}

/// First UTC instant of `date`.
fn day_start_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// First UTC instant after `date`, making a `to` filter inclusive.
fn day_after_utc(date: NaiveDate) -> DateTime<Utc> {
    date.checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX)
        .and_time(NaiveTime::MIN)
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_bounds_cover_the_whole_day() {
        let from = day_start_utc(date(2026, 3, 5));
        let to = day_after_utc(date(2026, 3, 5));

        assert_eq!(from.to_rfc3339(), "2026-03-05T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2026-03-06T00:00:00+00:00");

        let noon = date(2026, 3, 5).and_hms_opt(12, 0, 0).unwrap().and_utc();
        assert!(noon >= from && noon < to);

        let next_midnight = date(2026, 3, 6).and_hms_opt(0, 0, 0).unwrap().and_utc();
        assert!(next_midnight >= to);
    }

    #[test]
    fn test_default_filter_is_empty() {
        let filter = TransactionFilter::default();
        assert!(filter.q.is_none());
        assert!(filter.state.is_none());
        assert!(filter.from.is_none() && filter.to.is_none());
        assert!(filter.amount_min.is_none() && filter.amount_max.is_none());
    }

    #[test]
    fn test_already_settled_names_the_state() {
        let err = TransactionError::AlreadySettled {
            state: tegoed_core::voucher::TransactionState::Success,
        };
        assert_eq!(err.to_string(), "Transaction already settled as success");
    }
}

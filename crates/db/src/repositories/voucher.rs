//! Voucher repository: issuance, token lookup, balance derivation, and the
//! atomic redemption write.
//!
//! Balances are always derived from the transaction ledger via
//! `tegoed_core::voucher::BalanceBreakdown`, never stored. The repository
//! feeds that computation in two modes: live (re-queried inside the
//! redemption transaction, under a row lock) and cached (bulk listing, all
//! rows loaded up front and folded in memory). Both modes read the same
//! rows, so they cannot disagree.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use tegoed_core::voucher::BalanceBreakdown;

use crate::entities::{
    funds, products, sea_orm_active_enums::TransactionState, voucher_tokens, voucher_transactions,
    vouchers,
};

/// Error types for voucher operations.
#[derive(Debug, thiserror::Error)]
pub enum VoucherError {
    /// Voucher not found.
    #[error("Voucher not found: {0}")]
    NotFound(Uuid),

    /// Fund not found at voucher creation.
    #[error("Fund not found: {0}")]
    FundNotFound(Uuid),

    /// Product not found at voucher creation.
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    /// The requested amount exceeds the spendable balance.
    #[error("Insufficient balance: {available} available")]
    InsufficientBalance {
        /// The spendable amount at the moment of the check.
        available: Decimal,
    },

    /// A product voucher already carries its one transaction.
    #[error("Product voucher has already been used")]
    ProductVoucherUsed,

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a voucher.
#[derive(Debug, Clone)]
pub struct CreateVoucherInput {
    /// Fund the voucher draws from.
    pub fund_id: Uuid,
    /// Identity address of the holder.
    pub identity_address: String,
    /// Product binding; set for product vouchers.
    pub product_id: Option<Uuid>,
    /// Parent voucher whose balance backs this one.
    pub parent_id: Option<Uuid>,
    /// Expiry override; defaults to the day after the fund's end date.
    pub expire_at: Option<DateTime<Utc>>,
}

/// Input for recording a redemption.
#[derive(Debug, Clone)]
pub struct RedeemInput {
    /// Voucher being redeemed.
    pub voucher_id: Uuid,
    /// Receiving provider organization.
    pub organization_id: Uuid,
    /// Product being paid for, when known.
    pub product_id: Option<Uuid>,
    /// Token address the voucher was presented with.
    pub token_address: String,
    /// Amount to deduct; must not exceed the available balance.
    pub amount: Decimal,
}

/// A freshly created voucher together with its token pair.
#[derive(Debug, Clone)]
pub struct VoucherWithTokens {
    /// The voucher row.
    pub voucher: vouchers::Model,
    /// Its two access tokens (one confirming, one share-safe).
    pub tokens: Vec<voucher_tokens::Model>,
}

/// A voucher row with its derived balance terms.
#[derive(Debug, Clone)]
pub struct VoucherWithBalance {
    /// The voucher row.
    pub voucher: vouchers::Model,
    /// The balance terms derived from the ledger.
    pub breakdown: BalanceBreakdown,
}

/// Voucher repository binding the balance engine to storage.
#[derive(Debug, Clone)]
pub struct VoucherRepository {
    db: DatabaseConnection,
}

impl VoucherRepository {
    /// Creates a new voucher repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a voucher by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<vouchers::Model>, VoucherError> {
        Ok(vouchers::Entity::find_by_id(id).one(&self.db).await?)
    }

    /// Resolves a token address to its token and voucher pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_token_address(
        &self,
        address: &str,
    ) -> Result<Option<(voucher_tokens::Model, vouchers::Model)>, VoucherError> {
        let pair = voucher_tokens::Entity::find()
            .filter(voucher_tokens::Column::Address.eq(address))
            .find_also_related(vouchers::Entity)
            .one(&self.db)
            .await?;

        Ok(pair.and_then(|(token, voucher)| voucher.map(|v| (token, v))))
    }

    /// Lists the token pair of a voucher.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn tokens_for_voucher(
        &self,
        voucher_id: Uuid,
    ) -> Result<Vec<voucher_tokens::Model>, VoucherError> {
        Ok(voucher_tokens::Entity::find()
            .filter(voucher_tokens::Column::VoucherId.eq(voucher_id))
            .all(&self.db)
            .await?)
    }

    /// Creates a voucher and its two tokens in one transaction.
    ///
    /// The face amount comes from the product price for product vouchers and
    /// from the fund's allocation amount otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the fund or product does not exist or the insert
    /// fails.
    pub async fn create(&self, input: CreateVoucherInput) -> Result<VoucherWithTokens, VoucherError> {
        let fund = funds::Entity::find_by_id(input.fund_id)
            .one(&self.db)
            .await?
            .ok_or(VoucherError::FundNotFound(input.fund_id))?;

        let amount = match input.product_id {
            Some(product_id) => {
                let product = products::Entity::find_by_id(product_id)
                    .one(&self.db)
                    .await?
                    .ok_or(VoucherError::ProductNotFound(product_id))?;
                product.price
            }
            None => fund.allocation_amount,
        };

        let expire_at = input
            .expire_at
            .unwrap_or_else(|| default_expire_at(fund.end_date));

        let txn = self.db.begin().await?;

        let now = Utc::now();
        let voucher_id = Uuid::new_v4();

        let voucher = vouchers::ActiveModel {
            id: Set(voucher_id),
            fund_id: Set(input.fund_id),
            identity_address: Set(input.identity_address.clone()),
            amount: Set(amount),
            product_id: Set(input.product_id),
            parent_id: Set(input.parent_id),
            expire_at: Set(expire_at.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let voucher = voucher.insert(&txn).await?;

        let mut tokens = Vec::with_capacity(2);
        for need_confirmation in [true, false] {
            let token = voucher_tokens::ActiveModel {
                id: Set(Uuid::new_v4()),
                voucher_id: Set(voucher_id),
                address: Set(mint_address()),
                need_confirmation: Set(need_confirmation),
                created_at: Set(now.into()),
            };
            tokens.push(token.insert(&txn).await?);
        }

        txn.commit().await?;

        Ok(VoucherWithTokens { voucher, tokens })
    }

    /// Derives a voucher's balance live from the ledger (authoritative).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn balance(&self, voucher: &vouchers::Model) -> Result<BalanceBreakdown, VoucherError> {
        Ok(balance_terms(&self.db, voucher).await?)
    }

    /// Lists an identity's vouchers with balances, in bulk (cached mode).
    ///
    /// Loads the vouchers, their direct children, and all ledger rows in
    /// three queries, then folds the balances in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_identity(
        &self,
        identity_address: &str,
    ) -> Result<Vec<VoucherWithBalance>, VoucherError> {
        let voucher_rows = vouchers::Entity::find()
            .filter(vouchers::Column::IdentityAddress.eq(identity_address))
            .order_by_desc(vouchers::Column::CreatedAt)
            .all(&self.db)
            .await?;

        if voucher_rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = voucher_rows.iter().map(|v| v.id).collect();

        // Direct children only; linkage is one level deep.
        let child_links: Vec<(Uuid, Option<Uuid>)> = vouchers::Entity::find()
            .filter(vouchers::Column::ParentId.is_in(ids.clone()))
            .select_only()
            .column(vouchers::Column::Id)
            .column(vouchers::Column::ParentId)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut ledger_ids = ids.clone();
        ledger_ids.extend(child_links.iter().map(|(child_id, _)| *child_id));

        let ledger_rows: Vec<(Uuid, Decimal)> = voucher_transactions::Entity::find()
            .filter(voucher_transactions::Column::VoucherId.is_in(ledger_ids))
            .select_only()
            .column(voucher_transactions::Column::VoucherId)
            .column(voucher_transactions::Column::Amount)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut spent: HashMap<Uuid, Decimal> = HashMap::new();
        for (voucher_id, amount) in &ledger_rows {
            *spent.entry(*voucher_id).or_default() += *amount;
        }

        let mut child_spent: HashMap<Uuid, Decimal> = HashMap::new();
        for (child_id, parent_id) in &child_links {
            if let (Some(parent_id), Some(sum)) = (parent_id, spent.get(child_id)) {
                *child_spent.entry(*parent_id).or_default() += *sum;
            }
        }

        Ok(voucher_rows
            .into_iter()
            .map(|voucher| {
                let breakdown = BalanceBreakdown::new(
                    voucher.amount,
                    spent.get(&voucher.id).copied().unwrap_or_default(),
                    child_spent.get(&voucher.id).copied().unwrap_or_default(),
                );
                VoucherWithBalance { voucher, breakdown }
            })
            .collect())
    }

    /// Records a redemption atomically.
    ///
    /// Locks the voucher row (parent first when one exists, so parent-spend
    /// and child-spend serialize in a consistent order), re-derives the
    /// balance under the lock, enforces the product single-use rule, and
    /// appends the pending ledger row. Any failure rolls the whole unit
    /// back.
    ///
    /// # Errors
    ///
    /// Returns an error if the voucher vanished, the balance is
    /// insufficient, a product voucher is already used, or the database
    /// fails.
    pub async fn redeem(
        &self,
        input: RedeemInput,
    ) -> Result<voucher_transactions::Model, VoucherError> {
        let txn = self.db.begin().await?;

        // parent_id is immutable after insert, so this unlocked probe is
        // safe to base the lock order on.
        let probe = vouchers::Entity::find_by_id(input.voucher_id)
            .one(&txn)
            .await?
            .ok_or(VoucherError::NotFound(input.voucher_id))?;

        let parent = match probe.parent_id {
            Some(parent_id) => Some(lock_voucher(&txn, parent_id).await?),
            None => None,
        };
        let voucher = lock_voucher(&txn, input.voucher_id).await?;

        if voucher.product_id.is_some() {
            let used = voucher_transactions::Entity::find()
                .filter(voucher_transactions::Column::VoucherId.eq(voucher.id))
                .count(&txn)
                .await?;
            if used > 0 {
                return Err(VoucherError::ProductVoucherUsed);
            }
        }

        let available = balance_terms(&txn, &voucher).await?.available();
        if input.amount > available {
            return Err(VoucherError::InsufficientBalance { available });
        }

        // A child spends its parent's money too; the parent must cover it.
        if let Some(parent) = &parent {
            let parent_available = balance_terms(&txn, parent).await?.available();
            if input.amount > parent_available {
                return Err(VoucherError::InsufficientBalance {
                    available: parent_available,
                });
            }
        }

        let now = Utc::now();
        let row = voucher_transactions::ActiveModel {
            id: Set(Uuid::new_v4()),
            voucher_id: Set(voucher.id),
            organization_id: Set(input.organization_id),
            product_id: Set(input.product_id.or(voucher.product_id)),
            address: Set(input.token_address.clone()),
            amount: Set(input.amount),
            state: Set(TransactionState::Pending),
            attempts: Set(0),
            last_attempt_at: Set(None),
            payment_id: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let inserted = row.insert(&txn).await?;
        txn.commit().await?;

        Ok(inserted)
    }

    /// Counts the transactions recorded against a voucher.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn transaction_count(&self, voucher_id: Uuid) -> Result<u64, VoucherError> {
        Ok(voucher_transactions::Entity::find()
            .filter(voucher_transactions::Column::VoucherId.eq(voucher_id))
            .count(&self.db)
            .await?)
    }

    /// Lists regular vouchers whose expiry falls inside `[from, to)`.
    ///
    /// Feeds the expiry-reminder task; callers filter on remaining balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn expiring_regular_vouchers(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<vouchers::Model>, VoucherError> {
        Ok(vouchers::Entity::find()
            .filter(vouchers::Column::ProductId.is_null())
            .filter(vouchers::Column::ExpireAt.gte(from))
            .filter(vouchers::Column::ExpireAt.lt(to))
            .all(&self.db)
            .await?)
    }
}

/// Locks a voucher row for the rest of the transaction.
async fn lock_voucher(txn: &DatabaseTransaction, id: Uuid) -> Result<vouchers::Model, VoucherError> {
    vouchers::Entity::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(VoucherError::NotFound(id))
}

/// Loads the two ledger sums a balance derives from.
async fn balance_terms<C: ConnectionTrait>(
    conn: &C,
    voucher: &vouchers::Model,
) -> Result<BalanceBreakdown, DbErr> {
    let own: Vec<Decimal> = voucher_transactions::Entity::find()
        .filter(voucher_transactions::Column::VoucherId.eq(voucher.id))
        .select_only()
        .column(voucher_transactions::Column::Amount)
        .into_tuple()
        .all(conn)
        .await?;

    let child_ids: Vec<Uuid> = vouchers::Entity::find()
        .filter(vouchers::Column::ParentId.eq(voucher.id))
        .select_only()
        .column(vouchers::Column::Id)
        .into_tuple()
        .all(conn)
        .await?;

    let children: Vec<Decimal> = if child_ids.is_empty() {
        Vec::new()
    } else {
        voucher_transactions::Entity::find()
            .filter(voucher_transactions::Column::VoucherId.is_in(child_ids))
            .select_only()
            .column(voucher_transactions::Column::Amount)
            .into_tuple()
            .all(conn)
            .await?
    };

    Ok(BalanceBreakdown::from_amounts(voucher.amount, own, children))
}

/// Mints an opaque URL-safe token address.
fn mint_address() -> String {
    let bytes: [u8; 32] = rand::random();
    base64_url::encode(&bytes)
}

/// Expiry default: the voucher stays valid through the fund's end date.
fn default_expire_at(end_date: NaiveDate) -> DateTime<Utc> {
    let day_after = end_date.checked_add_days(Days::new(1)).unwrap_or(end_date);
    day_after.and_time(NaiveTime::MIN).and_utc()
}

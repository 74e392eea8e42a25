//! Payout tracking migration.
//!
//! Adds the settling columns to the transaction ledger: attempt counting
//! for the payout worker and the bank payment reference recorded on
//! success. Also adds the provider-by-date index the reporting queries
//! lean on.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ADD_PAYOUT_COLUMNS_SQL).await?;
        db.execute_unprepared(PROVIDER_CREATED_INDEX_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_PAYOUT_COLUMNS_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ADD_PAYOUT_COLUMNS_SQL: &str = r"
ALTER TABLE voucher_transactions
    ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0,
    ADD COLUMN last_attempt_at TIMESTAMPTZ,
    ADD COLUMN payment_id BIGINT;
";

const PROVIDER_CREATED_INDEX_SQL: &str = r"
CREATE INDEX idx_voucher_transactions_org_created
    ON voucher_transactions(organization_id, created_at);
";

const DROP_PAYOUT_COLUMNS_SQL: &str = r"
DROP INDEX IF EXISTS idx_voucher_transactions_org_created;

ALTER TABLE voucher_transactions
    DROP COLUMN IF EXISTS payment_id,
    DROP COLUMN IF EXISTS last_attempt_at,
    DROP COLUMN IF EXISTS attempts;
";

//! Initial database migration.
//!
//! Creates the enums, tables and indexes for the voucher platform:
//! organizations and their employees, funds and provider applications,
//! products, vouchers with their access tokens, and the transaction ledger.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: ORGANIZATIONS & EMPLOYEES
        // ============================================================
        db.execute_unprepared(ORGANIZATIONS_SQL).await?;
        db.execute_unprepared(EMPLOYEES_SQL).await?;
        db.execute_unprepared(EMPLOYEE_PERMISSIONS_SQL).await?;

        // ============================================================
        // PART 3: FUNDS & PROVIDER APPLICATIONS
        // ============================================================
        db.execute_unprepared(FUNDS_SQL).await?;
        db.execute_unprepared(FUND_PROVIDERS_SQL).await?;

        // ============================================================
        // PART 4: PRODUCTS
        // ============================================================
        db.execute_unprepared(PRODUCT_CATEGORIES_SQL).await?;
        db.execute_unprepared(PRODUCTS_SQL).await?;

        // ============================================================
        // PART 5: VOUCHERS & TOKENS
        // ============================================================
        db.execute_unprepared(VOUCHERS_SQL).await?;
        db.execute_unprepared(VOUCHER_TOKENS_SQL).await?;

        // ============================================================
        // PART 6: TRANSACTION LEDGER
        // ============================================================
        db.execute_unprepared(VOUCHER_TRANSACTIONS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- Fund lifecycle
CREATE TYPE fund_state AS ENUM (
    'waiting',
    'active',
    'paused',
    'closed'
);

-- Fund-provider application lifecycle
CREATE TYPE fund_provider_state AS ENUM (
    'pending',
    'approved',
    'declined'
);

-- Voucher transaction settlement
CREATE TYPE transaction_state AS ENUM (
    'pending',
    'success',
    'canceled'
);
";

const ORGANIZATIONS_SQL: &str = r"
CREATE TABLE organizations (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    identity_address VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL,
    phone VARCHAR(50),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- One identity may own several organizations
CREATE INDEX idx_organizations_identity ON organizations(identity_address);
";

const EMPLOYEES_SQL: &str = r"
CREATE TABLE employees (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    identity_address VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (organization_id, identity_address)
);

CREATE INDEX idx_employees_identity ON employees(identity_address);
";

const EMPLOYEE_PERMISSIONS_SQL: &str = r"
CREATE TABLE employee_permissions (
    employee_id UUID NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
    permission VARCHAR(100) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (employee_id, permission)
);
";

const FUNDS_SQL: &str = r"
CREATE TABLE funds (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    state fund_state NOT NULL DEFAULT 'waiting',
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    allocation_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (end_date >= start_date)
);

CREATE INDEX idx_funds_organization ON funds(organization_id);
";

const FUND_PROVIDERS_SQL: &str = r"
CREATE TABLE fund_providers (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    fund_id UUID NOT NULL REFERENCES funds(id) ON DELETE CASCADE,
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    state fund_provider_state NOT NULL DEFAULT 'pending',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    -- One application per provider per fund
    UNIQUE (fund_id, organization_id)
);

CREATE INDEX idx_fund_providers_organization ON fund_providers(organization_id);
CREATE INDEX idx_fund_providers_fund_state ON fund_providers(fund_id, state);
";

const PRODUCT_CATEGORIES_SQL: &str = r"
CREATE TABLE product_categories (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    key VARCHAR(100) NOT NULL UNIQUE,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const PRODUCTS_SQL: &str = r"
CREATE TABLE products (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    product_category_id UUID REFERENCES product_categories(id) ON DELETE SET NULL,
    name VARCHAR(255) NOT NULL,
    price NUMERIC(12, 2) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (price >= 0)
);

CREATE INDEX idx_products_organization ON products(organization_id);
CREATE INDEX idx_products_category ON products(product_category_id);
";

const VOUCHERS_SQL: &str = r"
CREATE TABLE vouchers (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    fund_id UUID NOT NULL REFERENCES funds(id) ON DELETE CASCADE,
    identity_address VARCHAR(255) NOT NULL,
    amount NUMERIC(12, 2) NOT NULL,
    product_id UUID REFERENCES products(id) ON DELETE RESTRICT,
    parent_id UUID REFERENCES vouchers(id) ON DELETE CASCADE,
    expire_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (amount >= 0)
);

CREATE INDEX idx_vouchers_fund ON vouchers(fund_id);
CREATE INDEX idx_vouchers_identity ON vouchers(identity_address);
CREATE INDEX idx_vouchers_parent ON vouchers(parent_id);
";

const VOUCHER_TOKENS_SQL: &str = r"
CREATE TABLE voucher_tokens (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    voucher_id UUID NOT NULL REFERENCES vouchers(id) ON DELETE CASCADE,
    address VARCHAR(255) NOT NULL UNIQUE,
    need_confirmation BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_voucher_tokens_voucher ON voucher_tokens(voucher_id);
";

const VOUCHER_TRANSACTIONS_SQL: &str = r"
CREATE TABLE voucher_transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    voucher_id UUID NOT NULL REFERENCES vouchers(id) ON DELETE CASCADE,
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE RESTRICT,
    product_id UUID REFERENCES products(id) ON DELETE SET NULL,
    address VARCHAR(255) NOT NULL,
    amount NUMERIC(12, 2) NOT NULL,
    state transaction_state NOT NULL DEFAULT 'pending',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (amount > 0)
);

CREATE INDEX idx_voucher_transactions_voucher ON voucher_transactions(voucher_id);
CREATE INDEX idx_voucher_transactions_organization ON voucher_transactions(organization_id);
CREATE INDEX idx_voucher_transactions_created ON voucher_transactions(created_at);
";

const DROP_ALL_SQL: &str = r"
-- Order matters due to foreign key constraints
DROP TABLE IF EXISTS voucher_transactions CASCADE;
DROP TABLE IF EXISTS voucher_tokens CASCADE;
DROP TABLE IF EXISTS vouchers CASCADE;
DROP TABLE IF EXISTS products CASCADE;
DROP TABLE IF EXISTS product_categories CASCADE;
DROP TABLE IF EXISTS fund_providers CASCADE;
DROP TABLE IF EXISTS funds CASCADE;
DROP TABLE IF EXISTS employee_permissions CASCADE;
DROP TABLE IF EXISTS employees CASCADE;
DROP TABLE IF EXISTS organizations CASCADE;

DROP TYPE IF EXISTS transaction_state;
DROP TYPE IF EXISTS fund_provider_state;
DROP TYPE IF EXISTS fund_state;
";

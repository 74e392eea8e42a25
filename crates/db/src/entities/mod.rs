//! `SeaORM` entity definitions for the Tegoed schema.

pub mod employee_permissions;
pub mod employees;
pub mod fund_providers;
pub mod funds;
pub mod organizations;
pub mod product_categories;
pub mod products;
pub mod sea_orm_active_enums;
pub mod voucher_tokens;
pub mod voucher_transactions;
pub mod vouchers;

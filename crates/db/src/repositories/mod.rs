//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the
//! application. The domain rules themselves live in `tegoed-core`; the
//! repositories feed them rows and persist their outcomes.

pub mod fund;
pub mod fund_provider;
pub mod organization;
pub mod product;
pub mod transaction;
pub mod voucher;

pub use fund::FundRepository;
pub use fund_provider::{FundProviderError, FundProviderRepository};
pub use organization::{
    OrganizationRepository, PERM_MANAGE_PROVIDERS, PERM_SCAN_VOUCHERS, PERM_VIEW_FINANCES,
};
pub use product::ProductRepository;
pub use transaction::{
    TransactionError, TransactionFilter, TransactionRepository, TransactionRow, TransactionScope,
};
pub use voucher::{
    CreateVoucherInput, RedeemInput, VoucherError, VoucherRepository, VoucherWithBalance,
    VoucherWithTokens,
};

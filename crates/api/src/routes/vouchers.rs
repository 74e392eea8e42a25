//! Voucher routes: holder listing and lookup, and the provider redemption
//! flow.
//!
//! Lookup is by token address, not voucher id: possession of an address is
//! the capability. The redemption handler assembles the authorization
//! context, runs the pure authorizer, and only then hands the write to the
//! repository, which re-checks sufficiency under a row lock.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{AppState, middleware::Identity};
use tegoed_core::redemption::{DenialReason, RedemptionAuthorizer, RedemptionContext};
use tegoed_core::voucher::{BalanceBreakdown, VoucherKind, is_expired, round_amount};
use tegoed_db::{
    FundProviderRepository, FundRepository, OrganizationRepository, ProductRepository,
    TransactionRepository, VoucherRepository,
    entities::{funds, vouchers},
    repositories::{PERM_SCAN_VOUCHERS, RedeemInput, TransactionFilter, TransactionScope, VoucherError},
};
use tegoed_shared::types::{PageRequest, PageResponse};

/// Creates the voucher routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/identity/vouchers", get(list_my_vouchers))
        .route("/identity/vouchers/{address}", get(get_voucher))
        .route(
            "/identity/vouchers/{address}/transactions",
            get(list_voucher_transactions),
        )
        .route(
            "/provider/vouchers/{address}/transactions",
            post(record_redemption),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for a voucher's transaction listing.
#[derive(Debug, Deserialize)]
pub struct ListVoucherTransactionsQuery {
    /// Filter by settlement state.
    pub state: Option<String>,
    /// Creation date lower bound (YYYY-MM-DD, inclusive).
    pub from: Option<NaiveDate>,
    /// Creation date upper bound (YYYY-MM-DD, inclusive).
    pub to: Option<NaiveDate>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
}

/// Request body for recording a redemption.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// The receiving provider organization.
    pub organization_id: Uuid,
    /// Amount to deduct; defaults to the face amount for product vouchers.
    pub amount: Option<Decimal>,
    /// Product being paid for, when known.
    pub product_id: Option<Uuid>,
}

/// A voucher with its derived balance terms.
#[derive(Debug, Serialize)]
pub struct VoucherResponse {
    /// Voucher ID.
    pub id: Uuid,
    /// Fund the voucher draws from.
    pub fund_id: Uuid,
    /// Voucher kind (`regular` or `product`).
    pub kind: &'static str,
    /// Product binding, for product vouchers.
    pub product_id: Option<Uuid>,
    /// Parent voucher whose balance backs this one.
    pub parent_id: Option<Uuid>,
    /// Face amount.
    pub amount: Decimal,
    /// Total spent, own and child transactions combined.
    pub spent: Decimal,
    /// Spendable amount remaining.
    pub available: Decimal,
    /// Expiry instant.
    pub expire_at: String,
    /// Whether the voucher is expired right now.
    pub expired: bool,
    /// Created at timestamp.
    pub created_at: String,
}

/// The presented token's metadata.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// The token address.
    pub address: String,
    /// Whether redemptions via this token need holder confirmation.
    pub need_confirmation: bool,
}

/// Response for a single voucher lookup.
#[derive(Debug, Serialize)]
pub struct VoucherDetailResponse {
    /// The voucher with its balance.
    pub voucher: VoucherResponse,
    /// The token the voucher was resolved through.
    pub token: TokenResponse,
}

/// Response for a recorded redemption.
#[derive(Debug, Serialize)]
pub struct RedemptionResponse {
    /// Transaction ID.
    pub id: Uuid,
    /// The redeemed voucher.
    pub voucher_id: Uuid,
    /// The receiving provider organization.
    pub organization_id: Uuid,
    /// Product paid for, when known.
    pub product_id: Option<Uuid>,
    /// Deducted amount.
    pub amount: Decimal,
    /// Settlement state (always `pending` at creation).
    pub state: String,
    /// Created at timestamp.
    pub created_at: String,
}

fn voucher_response(
    voucher: &vouchers::Model,
    breakdown: &BalanceBreakdown,
    now: DateTime<Utc>,
) -> VoucherResponse {
    let expire_at = voucher.expire_at.with_timezone(&Utc);

    VoucherResponse {
        id: voucher.id,
        fund_id: voucher.fund_id,
        kind: match voucher.product_id {
            Some(_) => "product",
            None => "regular",
        },
        product_id: voucher.product_id,
        parent_id: voucher.parent_id,
        amount: voucher.amount,
        spent: breakdown.total_spent(),
        available: breakdown.available(),
        expire_at: expire_at.to_rfc3339(),
        expired: is_expired(expire_at, now),
        created_at: voucher.created_at.to_rfc3339(),
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/identity/vouchers` - List the identity's vouchers with balances.
async fn list_my_vouchers(State(state): State<AppState>, identity: Identity) -> impl IntoResponse {
    let repo = VoucherRepository::new((*state.db).clone());

    match repo.list_for_identity(identity.address()).await {
        Ok(rows) => {
            let now = Utc::now();
            let items: Vec<VoucherResponse> = rows
                .iter()
                .map(|row| voucher_response(&row.voucher, &row.breakdown, now))
                .collect();

            (StatusCode::OK, Json(json!({ "vouchers": items }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to list vouchers");
            internal_error()
        }
    }
}

/// GET `/identity/vouchers/{address}` - One voucher by token address, with a
/// live balance.
async fn get_voucher(
    State(state): State<AppState>,
    _identity: Identity,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let repo = VoucherRepository::new((*state.db).clone());

    let (token, voucher) = match repo.find_by_token_address(&address).await {
        Ok(Some(pair)) => pair,
        Ok(None) => return voucher_not_found(),
        Err(e) => {
            error!(error = %e, "Failed to resolve voucher token");
            return internal_error();
        }
    };

    match repo.balance(&voucher).await {
        Ok(breakdown) => {
            let response = VoucherDetailResponse {
                voucher: voucher_response(&voucher, &breakdown, Utc::now()),
                token: TokenResponse {
                    address: token.address,
                    need_confirmation: token.need_confirmation,
                },
            };

            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to derive voucher balance");
            internal_error()
        }
    }
}

/// GET `/identity/vouchers/{address}/transactions` - The voucher's ledger.
async fn list_voucher_transactions(
    State(state): State<AppState>,
    _identity: Identity,
    Path(address): Path<String>,
    Query(query): Query<ListVoucherTransactionsQuery>,
) -> impl IntoResponse {
    let state_filter = match parse_state_filter(query.state.as_deref()) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let voucher_repo = VoucherRepository::new((*state.db).clone());
    let voucher = match voucher_repo.find_by_token_address(&address).await {
        Ok(Some((_, voucher))) => voucher,
        Ok(None) => return voucher_not_found(),
        Err(e) => {
            error!(error = %e, "Failed to resolve voucher token");
            return internal_error();
        }
    };

    let filter = TransactionFilter {
        state: state_filter.map(Into::into),
        from: query.from,
        to: query.to,
        ..TransactionFilter::default()
    };
    let page = PageRequest {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };

    let tx_repo = TransactionRepository::new((*state.db).clone());
    let scope = TransactionScope::Voucher {
        voucher_id: voucher.id,
    };

    match tx_repo.search(&scope, &filter, &page).await {
        Ok((rows, total)) => (
            StatusCode::OK,
            Json(PageResponse::new(rows, page.page, page.per_page, total)),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list voucher transactions");
            internal_error()
        }
    }
}

/// POST `/provider/vouchers/{address}/transactions` - Authorize and record a
/// redemption.
async fn record_redemption(
    State(state): State<AppState>,
    identity: Identity,
    Path(address): Path<String>,
    Json(payload): Json<RedeemRequest>,
) -> impl IntoResponse {
    let voucher_repo = VoucherRepository::new((*state.db).clone());

    let (token, voucher) = match voucher_repo.find_by_token_address(&address).await {
        Ok(Some(pair)) => pair,
        Ok(None) => return voucher_not_found(),
        Err(e) => {
            error!(error = %e, "Failed to resolve voucher token");
            return internal_error();
        }
    };

    let fund = match FundRepository::new((*state.db).clone())
        .find_by_id(voucher.fund_id)
        .await
    {
        Ok(Some(fund)) => fund,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "fund_not_found",
                    "message": "The voucher's fund no longer exists"
                })),
            )
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "Failed to load fund");
            return internal_error();
        }
    };

    let context = match build_context(&state, &identity, &voucher, &fund).await {
        Ok(context) => context,
        Err(response) => return response,
    };

    if let Err(denial) = RedemptionAuthorizer::authorize(&context, Utc::now()) {
        info!(
            voucher_id = %voucher.id,
            identity = identity.address(),
            reason = denial.as_str(),
            "Redemption denied"
        );
        return denial_response(denial);
    }

    // The authorizer certifies the identity may redeem somewhere; the posted
    // organization must itself be a permitted receiver.
    if !organization_permitted(&context, payload.organization_id) {
        return denial_response(DenialReason::NotPermitted);
    }

    let amount = match payload.amount {
        Some(amount) => amount,
        None if voucher.product_id.is_some() => voucher.amount,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "missing_amount",
                    "message": "Amount is required for regular vouchers"
                })),
            )
                .into_response();
        }
    };

    // Normalize to ledger precision before the sign check so a sub-cent
    // amount cannot slip through as a zero row.
    let amount = round_amount(amount);
    if amount <= Decimal::ZERO {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_amount",
                "message": "Amount must be positive"
            })),
        )
            .into_response();
    }

    if let Some(product_id) = payload.product_id {
        match ProductRepository::new((*state.db).clone())
            .find_by_id(product_id)
            .await
        {
            Ok(Some(product)) if product.organization_id == payload.organization_id => {}
            Ok(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "invalid_product",
                        "message": "Product does not belong to the receiving organization"
                    })),
                )
                    .into_response();
            }
            Err(e) => {
                error!(error = %e, "Failed to load product");
                return internal_error();
            }
        }
    }

    let input = RedeemInput {
        voucher_id: voucher.id,
        organization_id: payload.organization_id,
        product_id: payload.product_id,
        token_address: token.address,
        amount,
    };

    match voucher_repo.redeem(input).await {
        Ok(row) => {
            info!(
                transaction_id = %row.id,
                voucher_id = %voucher.id,
                organization_id = %row.organization_id,
                amount = %row.amount,
                "Redemption recorded"
            );

            (
                StatusCode::CREATED,
                Json(RedemptionResponse {
                    id: row.id,
                    voucher_id: row.voucher_id,
                    organization_id: row.organization_id,
                    product_id: row.product_id,
                    amount: row.amount,
                    state: tegoed_core::voucher::TransactionState::from(row.state).to_string(),
                    created_at: row.created_at.to_rfc3339(),
                }),
            )
                .into_response()
        }
        Err(VoucherError::InsufficientBalance { available }) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "insufficient_balance",
                "message": format!("Insufficient balance: {available} available")
            })),
        )
            .into_response(),
        Err(VoucherError::ProductVoucherUsed) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "product_voucher_used",
                "message": "Product voucher has already been used"
            })),
        )
            .into_response(),
        Err(VoucherError::NotFound(_)) => voucher_not_found(),
        Err(e) => {
            error!(error = %e, "Failed to record redemption");
            internal_error()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Assembles the authorization context snapshot for one redemption attempt.
async fn build_context(
    state: &AppState,
    identity: &Identity,
    voucher: &vouchers::Model,
    fund: &funds::Model,
) -> Result<RedemptionContext, Response> {
    let kind = match voucher.product_id {
        Some(product_id) => VoucherKind::Product { product_id },
        None => VoucherKind::Regular,
    };

    let transaction_count = VoucherRepository::new((*state.db).clone())
        .transaction_count(voucher.id)
        .await
        .map_err(context_error)?;

    let approved_providers = FundProviderRepository::new((*state.db).clone())
        .approved_organization_ids(fund.id)
        .await
        .map_err(context_error)?;

    let scannable = OrganizationRepository::new((*state.db).clone())
        .organizations_with_permission(identity.address(), PERM_SCAN_VOUCHERS)
        .await
        .map_err(context_error)?;

    let product_organization = match voucher.product_id {
        Some(product_id) => ProductRepository::new((*state.db).clone())
            .find_by_id(product_id)
            .await
            .map_err(context_error)?
            .map(|product| product.organization_id),
        None => None,
    };

    Ok(RedemptionContext {
        kind,
        expire_at: voucher.expire_at.with_timezone(&Utc),
        fund_state: fund.state.clone().into(),
        transaction_count,
        approved_providers,
        scannable_organizations: scannable.into_iter().collect(),
        product_organization,
    })
}

fn context_error<E: std::fmt::Display>(e: E) -> Response {
    error!(error = %e, "Failed to assemble redemption context");
    internal_error()
}

/// Whether the posted receiving organization is permitted for this voucher.
fn organization_permitted(context: &RedemptionContext, organization_id: Uuid) -> bool {
    if !context.scannable_organizations.contains(&organization_id) {
        return false;
    }

    match context.kind {
        VoucherKind::Regular => context.approved_providers.contains(&organization_id),
        VoucherKind::Product { .. } => context.product_organization == Some(organization_id),
    }
}

fn parse_state_filter(
    state: Option<&str>,
) -> Result<Option<tegoed_core::voucher::TransactionState>, Response> {
    match state {
        None => Ok(None),
        Some(raw) => match tegoed_core::voucher::TransactionState::parse(raw) {
            Some(parsed) => Ok(Some(parsed)),
            None => Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_state",
                    "message": format!("Unknown transaction state: {raw}")
                })),
            )
                .into_response()),
        },
    }
}

fn denial_response(denial: DenialReason) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": denial.as_str(),
            "message": denial.to_string()
        })),
    )
        .into_response()
}

fn voucher_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "voucher_not_found",
            "message": "No voucher matches this address"
        })),
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "internal_error",
            "message": "An error occurred"
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashSet;
    use tegoed_core::voucher::FundState;

    fn context(kind: VoucherKind) -> RedemptionContext {
        RedemptionContext {
            kind,
            expire_at: Utc::now() + Duration::days(30),
            fund_state: FundState::Active,
            transaction_count: 0,
            approved_providers: HashSet::new(),
            scannable_organizations: HashSet::new(),
            product_organization: None,
        }
    }

    #[test]
    fn test_regular_receiver_needs_approval_and_scan_grant() {
        let org = Uuid::new_v4();
        let mut ctx = context(VoucherKind::Regular);

        assert!(!organization_permitted(&ctx, org));

        ctx.scannable_organizations.insert(org);
        assert!(!organization_permitted(&ctx, org));

        ctx.approved_providers.insert(org);
        assert!(organization_permitted(&ctx, org));
    }

    #[test]
    fn test_product_receiver_must_own_the_product() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut ctx = context(VoucherKind::Product {
            product_id: Uuid::new_v4(),
        });
        ctx.scannable_organizations.insert(owner);
        ctx.scannable_organizations.insert(other);
        ctx.product_organization = Some(owner);

        assert!(organization_permitted(&ctx, owner));
        assert!(!organization_permitted(&ctx, other));
    }

    #[test]
    fn test_state_filter_parses_known_states_only() {
        assert!(matches!(parse_state_filter(None), Ok(None)));
        assert!(matches!(
            parse_state_filter(Some("pending")),
            Ok(Some(tegoed_core::voucher::TransactionState::Pending))
        ));
        assert!(parse_state_filter(Some("refunded")).is_err());
    }
}

#[cfg(test)]
mod router_tests {
    use super::*;
    use axum::{body::Body, http::Request, middleware::from_fn_with_state};
    use http_body_util::BodyExt;
    use sea_orm::DatabaseConnection;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::middleware::auth::auth_middleware;
    use tegoed_shared::config::{
        AppConfig, AuthConfig, DatabaseConfig, FrontendConfig, NotificationConfig, ReportConfig,
        ServerConfig,
    };
    use tegoed_shared::{JwtConfig, JwtService, Notifier};

    /// State with a disconnected pool; enough for routing and auth checks.
    fn create_test_state() -> AppState {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                min_connections: 1,
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
            },
            frontend: FrontendConfig::default(),
            notifications: NotificationConfig::default(),
            report: ReportConfig::default(),
        };

        AppState {
            db: Arc::new(DatabaseConnection::Disconnected),
            jwt_service: Arc::new(JwtService::new(JwtConfig::default())),
            notifier: Arc::new(Notifier::new(
                NotificationConfig::default(),
                FrontendConfig::default(),
            )),
            config: Arc::new(config),
        }
    }

    fn test_app(state: AppState) -> Router {
        Router::new()
            .merge(routes())
            .layer(from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_list_vouchers_without_token_is_unauthorized() {
        let app = test_app(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/identity/vouchers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "missing_token");
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let app = test_app(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/identity/vouchers")
                    .header("Authorization", "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid_token");
    }

    #[tokio::test]
    async fn test_invalid_state_filter_is_rejected_before_lookup() {
        let state = create_test_state();
        let token = state
            .jwt_service
            .generate_token("identity-test")
            .expect("should generate token");
        let app = test_app(state);

        // The disconnected pool would fail any query; a 400 here proves the
        // filter is rejected before the token lookup runs.
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/identity/vouchers/some-address/transactions?state=refunded")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid_state");
    }
}

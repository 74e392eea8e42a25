//! Transaction routes: scoped ledger queries for sponsors and providers,
//! paginated or flattened for spreadsheet export.
//!
//! Handlers only pick the scope; the repository's scoped query decides what
//! a caller can see, so the sponsor, provider and per-provider views share
//! one set of filters.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::{AppState, middleware::Identity};
use tegoed_db::{
    FundProviderRepository, FundRepository, OrganizationRepository, TransactionRepository,
    repositories::{PERM_VIEW_FINANCES, TransactionFilter, TransactionRow, TransactionScope},
};
use tegoed_shared::types::{PageRequest, PageResponse};

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations/{org_id}/sponsor/transactions",
            get(sponsor_transactions),
        )
        .route(
            "/organizations/{org_id}/sponsor/transactions/export",
            get(sponsor_transactions_export),
        )
        .route(
            "/organizations/{org_id}/provider/transactions",
            get(provider_transactions),
        )
        .route(
            "/organizations/{org_id}/provider/transactions/export",
            get(provider_transactions_export),
        )
        .route(
            "/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}/transactions",
            get(fund_provider_transactions),
        )
        .route(
            "/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}/transactions/export",
            get(fund_provider_transactions_export),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the transaction listings.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Free text matched against fund name, provider name, or exact id.
    pub q: Option<String>,
    /// Filter by settlement state.
    pub state: Option<String>,
    /// Creation date lower bound (YYYY-MM-DD, inclusive).
    pub from: Option<NaiveDate>,
    /// Creation date upper bound (YYYY-MM-DD, inclusive).
    pub to: Option<NaiveDate>,
    /// Minimum amount, inclusive.
    pub amount_min: Option<Decimal>,
    /// Maximum amount, inclusive.
    pub amount_max: Option<Decimal>,
    /// Narrow the sponsor view to one fund.
    pub fund_id: Option<Uuid>,
    /// Narrow the sponsor view to one receiving provider.
    pub provider_id: Option<Uuid>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
}

/// One flat row of the spreadsheet export.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    /// Deducted amount.
    pub amount: Decimal,
    /// Redemption day.
    pub date: NaiveDate,
    /// Fund display name.
    pub fund: String,
    /// Provider display name.
    pub provider: String,
    /// Settlement state.
    pub state: String,
}

fn export_row(row: TransactionRow) -> ExportRow {
    ExportRow {
        amount: row.amount,
        date: row.created_at.date_naive(),
        fund: row.fund_name,
        provider: row.provider_name,
        state: tegoed_core::voucher::TransactionState::from(row.state).to_string(),
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/organizations/{org_id}/sponsor/transactions` - Ledger rows on the
/// sponsor's funds.
async fn sponsor_transactions(
    State(state): State<AppState>,
    identity: Identity,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListTransactionsQuery>,
) -> impl IntoResponse {
    let filter = match build_filter(&query) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    if let Err(response) = check_view_finances(&state, org_id, identity.address()).await {
        return response;
    }

    let scope = TransactionScope::Sponsor {
        organization_id: org_id,
        fund_id: query.fund_id,
        provider_id: query.provider_id,
    };
    search_response(&state, &scope, &filter, &query).await
}

/// GET `/organizations/{org_id}/sponsor/transactions/export` - Same view as
/// flat rows, oldest first.
async fn sponsor_transactions_export(
    State(state): State<AppState>,
    identity: Identity,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListTransactionsQuery>,
) -> impl IntoResponse {
    let filter = match build_filter(&query) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    if let Err(response) = check_view_finances(&state, org_id, identity.address()).await {
        return response;
    }

    let scope = TransactionScope::Sponsor {
        organization_id: org_id,
        fund_id: query.fund_id,
        provider_id: query.provider_id,
    };
    export_response(&state, &scope, &filter).await
}

/// GET `/organizations/{org_id}/provider/transactions` - Ledger rows the
/// provider organization received.
async fn provider_transactions(
    State(state): State<AppState>,
    identity: Identity,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListTransactionsQuery>,
) -> impl IntoResponse {
    let filter = match build_filter(&query) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    if let Err(response) = check_view_finances(&state, org_id, identity.address()).await {
        return response;
    }

    let scope = TransactionScope::Provider {
        organization_id: org_id,
    };
    search_response(&state, &scope, &filter, &query).await
}

/// GET `/organizations/{org_id}/provider/transactions/export` - Same view as
/// flat rows, oldest first.
async fn provider_transactions_export(
    State(state): State<AppState>,
    identity: Identity,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListTransactionsQuery>,
) -> impl IntoResponse {
    let filter = match build_filter(&query) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    if let Err(response) = check_view_finances(&state, org_id, identity.address()).await {
        return response;
    }

    let scope = TransactionScope::Provider {
        organization_id: org_id,
    };
    export_response(&state, &scope, &filter).await
}

/// GET `/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}/transactions` -
/// One provider's rows on one sponsor fund.
async fn fund_provider_transactions(
    State(state): State<AppState>,
    identity: Identity,
    Path((org_id, fund_id, provider_id)): Path<(Uuid, Uuid, Uuid)>,
    Query(query): Query<ListTransactionsQuery>,
) -> impl IntoResponse {
    let filter = match build_filter(&query) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    if let Err(response) = check_view_finances(&state, org_id, identity.address()).await {
        return response;
    }
    let provider_org =
        match resolve_provider_organization(&state, org_id, fund_id, provider_id).await {
            Ok(id) => id,
            Err(response) => return response,
        };

    let scope = TransactionScope::Sponsor {
        organization_id: org_id,
        fund_id: Some(fund_id),
        provider_id: Some(provider_org),
    };
    search_response(&state, &scope, &filter, &query).await
}

/// GET `…/providers/{provider_id}/transactions/export` - Same view as flat
/// rows, oldest first.
async fn fund_provider_transactions_export(
    State(state): State<AppState>,
    identity: Identity,
    Path((org_id, fund_id, provider_id)): Path<(Uuid, Uuid, Uuid)>,
    Query(query): Query<ListTransactionsQuery>,
) -> impl IntoResponse {
    let filter = match build_filter(&query) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    if let Err(response) = check_view_finances(&state, org_id, identity.address()).await {
        return response;
    }
    let provider_org =
        match resolve_provider_organization(&state, org_id, fund_id, provider_id).await {
            Ok(id) => id,
            Err(response) => return response,
        };

    let scope = TransactionScope::Sponsor {
        organization_id: org_id,
        fund_id: Some(fund_id),
        provider_id: Some(provider_org),
    };
    export_response(&state, &scope, &filter).await
}

// ============================================================================
// Helpers
// ============================================================================

async fn search_response(
    state: &AppState,
    scope: &TransactionScope,
    filter: &TransactionFilter,
    query: &ListTransactionsQuery,
) -> Response {
    let page = PageRequest {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };

    match TransactionRepository::new((*state.db).clone())
        .search(scope, filter, &page)
        .await
    {
        Ok((rows, total)) => (
            StatusCode::OK,
            Json(PageResponse::new(rows, page.page, page.per_page, total)),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list transactions");
            internal_error()
        }
    }
}

async fn export_response(
    state: &AppState,
    scope: &TransactionScope,
    filter: &TransactionFilter,
) -> Response {
    match TransactionRepository::new((*state.db).clone())
        .export(scope, filter)
        .await
    {
        Ok(rows) => {
            let rows: Vec<ExportRow> = rows.into_iter().map(export_row).collect();
            (StatusCode::OK, Json(json!({ "transactions": rows }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to export transactions");
            internal_error()
        }
    }
}

fn build_filter(query: &ListTransactionsQuery) -> Result<TransactionFilter, Response> {
    let state = match query.state.as_deref() {
        None => None,
        Some(raw) => match tegoed_core::voucher::TransactionState::parse(raw) {
            Some(parsed) => Some(parsed),
            None => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "invalid_state",
                        "message": format!("Unknown transaction state: {raw}")
                    })),
                )
                    .into_response());
            }
        },
    };

    Ok(TransactionFilter {
        q: query.q.clone(),
        state: state.map(Into::into),
        from: query.from,
        to: query.to,
        amount_min: query.amount_min,
        amount_max: query.amount_max,
    })
}

async fn check_view_finances(
    state: &AppState,
    org_id: Uuid,
    identity_address: &str,
) -> Result<(), Response> {
    match OrganizationRepository::new((*state.db).clone())
        .identity_can(org_id, identity_address, PERM_VIEW_FINANCES)
        .await
    {
        Ok(true) => Ok(()),
        Ok(false) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "forbidden",
                "message": "The view_finances permission is required"
            })),
        )
            .into_response()),
        Err(e) => {
            error!(error = %e, "Failed to check permission");
            Err(internal_error())
        }
    }
}

/// Resolves the provider organization behind a fund-provider row, scoped to
/// the sponsor's fund.
async fn resolve_provider_organization(
    state: &AppState,
    org_id: Uuid,
    fund_id: Uuid,
    provider_id: Uuid,
) -> Result<Uuid, Response> {
    match FundRepository::new((*state.db).clone())
        .find_sponsor_fund(org_id, fund_id)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "fund_not_found",
                    "message": "Fund not found"
                })),
            )
                .into_response());
        }
        Err(e) => {
            error!(error = %e, "Failed to load fund");
            return Err(internal_error());
        }
    }

    match FundProviderRepository::new((*state.db).clone())
        .find_for_fund(fund_id, provider_id)
        .await
    {
        Ok(Some(row)) => Ok(row.organization_id),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "provider_not_found",
                "message": "Fund provider not found"
            })),
        )
            .into_response()),
        Err(e) => {
            error!(error = %e, "Failed to load fund provider");
            Err(internal_error())
        }
    }
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
    async fn test_sponsor_transactions_without_token_is_unauthorized() {
        let app = test_app(create_test_state());
        let org_id = Uuid::new_v4();

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/organizations/{org_id}/sponsor/transactions"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_state_filter_is_rejected_before_io() {
        let state = create_test_state();
        let token = state
            .jwt_service
            .generate_token("identity-test")
            .expect("should generate token");
        let app = test_app(state);
        let org_id = Uuid::new_v4();

        // The disconnected pool would fail any query; a 400 here proves the
        // filter is rejected before the permission check runs.
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!(
                        "/organizations/{org_id}/provider/transactions?state=refunded"
                    ))
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

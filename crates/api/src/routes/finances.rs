//! Finances route: the bucketed usage report for one provider on one fund.
//!
//! The handler owns parameter parsing and data loading; every derived
//! figure comes from `tegoed_core::finances`. Caller errors (window,
//! period, category) are settled on the parsed parameters alone, before
//! any database work.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::json;
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{AppState, middleware::Identity};
use tegoed_core::finances::{
    BucketConfig, CategoryFilter, FinancesError, ReportWindow, WindowTotals, bucket_dates,
    bucket_ranges, local_today, sum_into_buckets, summarize, window_range,
};
use tegoed_db::{
    FundProviderRepository, FundRepository, OrganizationRepository, TransactionRepository,
    repositories::PERM_VIEW_FINANCES,
};

/// Creates the finances routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}/finances",
        get(provider_finances),
    )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters selecting the reporting window.
#[derive(Debug, Deserialize)]
pub struct FinancesQuery {
    /// Window selector: `quarter`, `month`, `week` or `all`.
    pub window: Option<String>,
    /// Calendar year the period lies in; ignored for `all`.
    pub year: Option<i32>,
    /// Ordinal within the year (quarter 1-4, month 1-12, ISO week).
    pub nth: Option<u32>,
    /// Product category restriction: `none` or a category id.
    pub category: Option<String>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}/finances` -
/// Bucketed usage summary for one provider on one fund.
async fn provider_finances(
    State(state): State<AppState>,
    identity: Identity,
    Path((org_id, fund_id, provider_id)): Path<(Uuid, Uuid, Uuid)>,
    Query(query): Query<FinancesQuery>,
) -> impl IntoResponse {
    let window_raw = query.window.unwrap_or_default();
    let Some(window) = ReportWindow::parse(&window_raw) else {
        return finances_error(&FinancesError::InvalidWindow(window_raw));
    };

    let (year, nth) = if window == ReportWindow::All {
        (0, 0)
    } else {
        match (query.year, query.nth) {
            (Some(year), Some(nth)) => (year, nth),
            _ => {
                return finances_error(&FinancesError::InvalidPeriod {
                    window: window.as_str(),
                    year: query.year.unwrap_or_default(),
                    nth: query.nth.unwrap_or_default(),
                });
            }
        }
    };

    let category = match query.category.as_deref() {
        None => None,
        Some(raw) => match CategoryFilter::parse(raw) {
            Ok(filter) => Some(filter),
            Err(e) => return finances_error(&e),
        },
    };

    let org_repo = OrganizationRepository::new((*state.db).clone());
    match org_repo
        .identity_can(org_id, identity.address(), PERM_VIEW_FINANCES)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "forbidden",
                    "message": "The view_finances permission is required"
                })),
            )
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "Failed to check permission");
            return internal_error();
        }
    }

    match FundRepository::new((*state.db).clone())
        .find_sponsor_fund(org_id, fund_id)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "fund_not_found",
                    "message": "Fund not found"
                })),
            )
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "Failed to load fund");
            return internal_error();
        }
    }

    let provider = match FundProviderRepository::new((*state.db).clone())
        .find_for_fund(fund_id, provider_id)
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "provider_not_found",
                    "message": "Fund provider not found"
                })),
            )
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "Failed to load fund provider");
            return internal_error();
        }
    };

    let tz = report_timezone(&state);
    let now = Utc::now();
    let today = local_today(now, tz);

    let tx_repo = TransactionRepository::new((*state.db).clone());

    let earliest = if window == ReportWindow::All {
        match tx_repo
            .earliest_provider_transaction(fund_id, provider.organization_id)
            .await
        {
            Ok(first) => first.map(|at| at.with_timezone(&tz).date_naive()),
            Err(e) => {
                error!(error = %e, "Failed to anchor the all window");
                return internal_error();
            }
        }
    } else {
        None
    };

    let boundaries = match bucket_dates(window, year, nth, &BucketConfig::default(), today, earliest)
    {
        Ok(dates) => dates,
        Err(e) => return finances_error(&e),
    };
    let ranges = bucket_ranges(&boundaries, tz);
    let range = window_range(&boundaries, tz).unwrap_or((now, now));

    let rows = match tx_repo
        .provider_window_rows(fund_id, provider.organization_id, range, category.as_ref())
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "Failed to load window transactions");
            return internal_error();
        }
    };
    let bucket_sums = sum_into_buckets(&ranges, &rows);

    let fund_usage_in_range = match tx_repo.fund_usage(fund_id, Some(range)).await {
        Ok(total) => total,
        Err(e) => {
            error!(error = %e, "Failed to load fund usage in range");
            return internal_error();
        }
    };
    let provider_usage_total = match tx_repo
        .provider_usage_total(fund_id, provider.organization_id)
        .await
    {
        Ok(total) => total,
        Err(e) => {
            error!(error = %e, "Failed to load provider usage");
            return internal_error();
        }
    };
    let fund_usage_total = match tx_repo.fund_usage(fund_id, None).await {
        Ok(total) => total,
        Err(e) => {
            error!(error = %e, "Failed to load fund usage");
            return internal_error();
        }
    };

    let totals = WindowTotals {
        transaction_count: rows.len() as u64,
        fund_usage_in_range,
        provider_usage_total,
        fund_usage_total,
    };

    (
        StatusCode::OK,
        Json(summarize(&boundaries, &bucket_sums, &totals)),
    )
        .into_response()
}

// ============================================================================
// Helpers
// ============================================================================

/// The configured reporting timezone, falling back to UTC when unparseable.
fn report_timezone(state: &AppState) -> Tz {
    match state.config.report.timezone.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(
                timezone = state.config.report.timezone,
                "Unknown report timezone, falling back to UTC"
            );
            chrono_tz::UTC
        }
    }
}

fn finances_error(error: &FinancesError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        Json(json!({
            "error": error.error_code(),
            "message": error.to_string()
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
mod router_tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, middleware::from_fn_with_state};
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

    async fn get_finances(query: &str) -> (StatusCode, serde_json::Value) {
        let state = create_test_state();
        let token = state
            .jwt_service
            .generate_token("identity-test")
            .expect("should generate token");
        let app = test_app(state);

        let org_id = Uuid::new_v4();
        let fund_id = Uuid::new_v4();
        let provider_id = Uuid::new_v4();

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!(
                        "/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}/finances{query}"
                    ))
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    // The disconnected pool would fail any query; a 400 from these proves
    // the parameters are rejected before any lookup runs.

    #[tokio::test]
    async fn test_unknown_window_is_rejected_before_io() {
        let (status, json) = get_finances("?window=decade").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "INVALID_WINDOW");
    }

    #[tokio::test]
    async fn test_missing_window_is_rejected() {
        let (status, json) = get_finances("").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "INVALID_WINDOW");
    }

    #[tokio::test]
    async fn test_quarter_without_period_is_rejected_before_io() {
        let (status, json) = get_finances("?window=quarter&year=2026").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "INVALID_PERIOD");
    }

    #[tokio::test]
    async fn test_bad_category_is_rejected_before_io() {
        let (status, json) = get_finances("?window=all&category=groceries").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "INVALID_CATEGORY");
    }
}

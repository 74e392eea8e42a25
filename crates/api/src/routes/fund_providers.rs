//! Fund-provider routes: applications and the sponsor's approval decisions.
//!
//! The PATCH handler is the only writer. It commits the single-row state
//! update first and hands the emitted events to the notifier in a spawned
//! task, so a slow SMTP peer never delays the response and a dispatch
//! failure never rolls back a decision.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{AppState, middleware::Identity};
use tegoed_core::provider::{FundProviderState, ProviderEvent};
use tegoed_db::{
    FundProviderRepository, FundRepository, OrganizationRepository,
    repositories::{FundProviderError, PERM_MANAGE_PROVIDERS},
};

/// Creates the fund-provider routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations/{org_id}/provider/applications",
            get(list_my_applications),
        )
        .route(
            "/organizations/{org_id}/provider/applications",
            post(apply),
        )
        .route(
            "/organizations/{org_id}/funds/{fund_id}/providers",
            get(list_fund_providers),
        )
        .route(
            "/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}",
            get(get_fund_provider),
        )
        .route(
            "/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}",
            patch(set_provider_state),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing a provider organization's own applications.
#[derive(Debug, Deserialize)]
pub struct ListApplicationsQuery {
    /// Filter by approval state.
    pub state: Option<String>,
    /// Filter by fund.
    pub fund_id: Option<Uuid>,
}

/// Query parameters for listing a fund's providers.
#[derive(Debug, Deserialize)]
pub struct ListProvidersQuery {
    /// Filter by approval state.
    pub state: Option<String>,
}

/// Request body for applying to a fund.
#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    /// The fund to apply to.
    pub fund_id: Uuid,
}

/// Request body for a sponsor's state decision.
#[derive(Debug, Deserialize)]
pub struct SetProviderStateRequest {
    /// Target approval state.
    pub state: String,
}

/// A provider organization's own application, with its fund.
#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    /// Fund-provider row ID.
    pub id: Uuid,
    /// The fund applied to.
    pub fund_id: Uuid,
    /// The fund's name.
    pub fund_name: String,
    /// The fund's lifecycle state.
    pub fund_state: String,
    /// Approval state of the application.
    pub state: String,
    /// Created at timestamp.
    pub created_at: String,
    /// Updated at timestamp.
    pub updated_at: String,
}

/// A fund's provider row, with the provider organization.
#[derive(Debug, Serialize)]
pub struct ProviderResponse {
    /// Fund-provider row ID.
    pub id: Uuid,
    /// The fund.
    pub fund_id: Uuid,
    /// The provider organization.
    pub organization_id: Uuid,
    /// The provider organization's name.
    pub organization_name: String,
    /// Approval state.
    pub state: String,
    /// Created at timestamp.
    pub created_at: String,
    /// Updated at timestamp.
    pub updated_at: String,
}

/// Response for a sponsor's state decision.
#[derive(Debug, Serialize)]
pub struct StateChangeResponse {
    /// Fund-provider row ID.
    pub id: Uuid,
    /// The fund.
    pub fund_id: Uuid,
    /// The provider organization.
    pub organization_id: Uuid,
    /// State before the decision.
    pub previous_state: String,
    /// State after the decision.
    pub state: String,
    /// Updated at timestamp.
    pub updated_at: String,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/organizations/{org_id}/provider/applications` - A provider
/// organization's own applications.
async fn list_my_applications(
    State(state): State<AppState>,
    identity: Identity,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListApplicationsQuery>,
) -> impl IntoResponse {
    let state_filter = match parse_provider_state_filter(query.state.as_deref()) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let org_repo = OrganizationRepository::new((*state.db).clone());
    if let Err(response) = check_membership(&org_repo, org_id, identity.address()).await {
        return response;
    }

    let repo = FundProviderRepository::new((*state.db).clone());
    match repo
        .list_for_organization(org_id, state_filter.map(Into::into), query.fund_id)
        .await
    {
        Ok(rows) => {
            let items: Vec<ApplicationResponse> = rows
                .into_iter()
                .map(|(row, fund)| ApplicationResponse {
                    id: row.id,
                    fund_id: fund.id,
                    fund_name: fund.name,
                    fund_state: tegoed_core::voucher::FundState::from(fund.state).to_string(),
                    state: FundProviderState::from(row.state).to_string(),
                    created_at: row.created_at.to_rfc3339(),
                    updated_at: row.updated_at.to_rfc3339(),
                })
                .collect();

            (StatusCode::OK, Json(json!({ "applications": items }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to list applications");
            internal_error()
        }
    }
}

/// POST `/organizations/{org_id}/provider/applications` - Apply to a fund.
async fn apply(
    State(state): State<AppState>,
    identity: Identity,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<ApplyRequest>,
) -> impl IntoResponse {
    let org_repo = OrganizationRepository::new((*state.db).clone());
    if let Err(response) = check_membership(&org_repo, org_id, identity.address()).await {
        return response;
    }

    let fund = match FundRepository::new((*state.db).clone())
        .find_by_id(payload.fund_id)
        .await
    {
        Ok(Some(fund)) => fund,
        Ok(None) => return fund_not_found(),
        Err(e) => {
            error!(error = %e, "Failed to load fund");
            return internal_error();
        }
    };

    let repo = FundProviderRepository::new((*state.db).clone());
    match repo.apply(fund.id, org_id).await {
        Ok(row) => {
            info!(
                fund_id = %fund.id,
                organization_id = %org_id,
                "Provider applied to fund"
            );

            (
                StatusCode::CREATED,
                Json(ApplicationResponse {
                    id: row.id,
                    fund_id: fund.id,
                    fund_name: fund.name,
                    fund_state: tegoed_core::voucher::FundState::from(fund.state).to_string(),
                    state: FundProviderState::from(row.state).to_string(),
                    created_at: row.created_at.to_rfc3339(),
                    updated_at: row.updated_at.to_rfc3339(),
                }),
            )
                .into_response()
        }
        Err(FundProviderError::AlreadyApplied { .. }) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "already_applied",
                "message": "This organization has already applied to the fund"
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to record application");
            internal_error()
        }
    }
}

/// GET `/organizations/{org_id}/funds/{fund_id}/providers` - A sponsor
/// fund's provider rows.
async fn list_fund_providers(
    State(state): State<AppState>,
    identity: Identity,
    Path((org_id, fund_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<ListProvidersQuery>,
) -> impl IntoResponse {
    let state_filter = match parse_provider_state_filter(query.state.as_deref()) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let org_repo = OrganizationRepository::new((*state.db).clone());
    if let Err(response) = check_membership(&org_repo, org_id, identity.address()).await {
        return response;
    }

    if let Err(response) = resolve_sponsor_fund(&state, org_id, fund_id).await {
        return response;
    }

    let repo = FundProviderRepository::new((*state.db).clone());
    match repo
        .list_for_fund(fund_id, state_filter.map(Into::into))
        .await
    {
        Ok(rows) => {
            let items: Vec<ProviderResponse> = rows
                .into_iter()
                .map(|(row, org)| ProviderResponse {
                    id: row.id,
                    fund_id: row.fund_id,
                    organization_id: org.id,
                    organization_name: org.name,
                    state: FundProviderState::from(row.state).to_string(),
                    created_at: row.created_at.to_rfc3339(),
                    updated_at: row.updated_at.to_rfc3339(),
                })
                .collect();

            (StatusCode::OK, Json(json!({ "providers": items }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to list fund providers");
            internal_error()
        }
    }
}

/// GET `/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}` -
/// One provider row.
async fn get_fund_provider(
    State(state): State<AppState>,
    identity: Identity,
    Path((org_id, fund_id, provider_id)): Path<(Uuid, Uuid, Uuid)>,
) -> impl IntoResponse {
    let org_repo = OrganizationRepository::new((*state.db).clone());
    if let Err(response) = check_membership(&org_repo, org_id, identity.address()).await {
        return response;
    }

    if let Err(response) = resolve_sponsor_fund(&state, org_id, fund_id).await {
        return response;
    }

    let repo = FundProviderRepository::new((*state.db).clone());
    let row = match repo.find_for_fund(fund_id, provider_id).await {
        Ok(Some(row)) => row,
        Ok(None) => return provider_not_found(),
        Err(e) => {
            error!(error = %e, "Failed to load fund provider");
            return internal_error();
        }
    };

    let organization = match org_repo.find_by_id(row.organization_id).await {
        Ok(Some(org)) => org,
        Ok(None) => {
            error!(organization_id = %row.organization_id, "Provider organization missing");
            return internal_error();
        }
        Err(e) => {
            error!(error = %e, "Failed to load provider organization");
            return internal_error();
        }
    };

    (
        StatusCode::OK,
        Json(ProviderResponse {
            id: row.id,
            fund_id: row.fund_id,
            organization_id: organization.id,
            organization_name: organization.name,
            state: FundProviderState::from(row.state).to_string(),
            created_at: row.created_at.to_rfc3339(),
            updated_at: row.updated_at.to_rfc3339(),
        }),
    )
        .into_response()
}

/// PATCH `/organizations/{org_id}/funds/{fund_id}/providers/{provider_id}` -
/// Apply a sponsor's state decision.
async fn set_provider_state(
    State(state): State<AppState>,
    identity: Identity,
    Path((org_id, fund_id, provider_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<SetProviderStateRequest>,
) -> impl IntoResponse {
    let Some(target) = FundProviderState::parse(&payload.state) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_state",
                "message": format!("Unknown provider state: {}", payload.state)
            })),
        )
            .into_response();
    };

    let org_repo = OrganizationRepository::new((*state.db).clone());
    match org_repo
        .identity_can(org_id, identity.address(), PERM_MANAGE_PROVIDERS)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "forbidden",
                    "message": "The manage_providers permission is required"
                })),
            )
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "Failed to check permission");
            return internal_error();
        }
    }

    let fund = match resolve_sponsor_fund(&state, org_id, fund_id).await {
        Ok(fund) => fund,
        Err(response) => return response,
    };

    // set_state looks the row up by ID alone; this check pins it to the
    // fund in the path so a decision can never land on another fund's row.
    let repo = FundProviderRepository::new((*state.db).clone());
    match repo.find_for_fund(fund_id, provider_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return provider_not_found(),
        Err(e) => {
            error!(error = %e, "Failed to load fund provider");
            return internal_error();
        }
    }

    match repo.set_state(provider_id, target, Utc::now()).await {
        Ok((row, change)) => {
            info!(
                provider_id = %row.id,
                fund_id = %fund_id,
                previous = change.previous.as_str(),
                state = change.current.as_str(),
                "Provider state decision applied"
            );

            if !change.events.is_empty() {
                dispatch_events(
                    state.clone(),
                    change.events.clone(),
                    row.organization_id,
                    org_id,
                    fund.name,
                );
            }

            (
                StatusCode::OK,
                Json(StateChangeResponse {
                    id: row.id,
                    fund_id: row.fund_id,
                    organization_id: row.organization_id,
                    previous_state: change.previous.to_string(),
                    state: change.current.to_string(),
                    updated_at: row.updated_at.to_rfc3339(),
                }),
            )
                .into_response()
        }
        Err(FundProviderError::NotFound(_)) => provider_not_found(),
        Err(e) => {
            error!(error = %e, "Failed to apply state decision");
            internal_error()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Hands post-commit events to the notifier without blocking the response.
fn dispatch_events(
    state: AppState,
    events: Vec<ProviderEvent>,
    provider_org_id: Uuid,
    sponsor_org_id: Uuid,
    fund_name: String,
) {
    tokio::spawn(async move {
        let org_repo = OrganizationRepository::new((*state.db).clone());

        let provider = match org_repo.find_by_id(provider_org_id).await {
            Ok(Some(org)) => org,
            _ => {
                warn!(organization_id = %provider_org_id, "Skipping notification: provider organization not found");
                return;
            }
        };
        let sponsor = match org_repo.find_by_id(sponsor_org_id).await {
            Ok(Some(org)) => org,
            _ => {
                warn!(organization_id = %sponsor_org_id, "Skipping notification: sponsor organization not found");
                return;
            }
        };

        for event in events {
            let result = match event {
                ProviderEvent::Approved { .. } => {
                    state
                        .notifier
                        .provider_approved(&provider.email, &provider.name, &fund_name, &sponsor.name)
                        .await
                }
                ProviderEvent::Declined { .. } => {
                    state
                        .notifier
                        .provider_declined(&provider.email, &provider.name, &fund_name, &sponsor.name)
                        .await
                }
            };

            if let Err(e) = result {
                warn!(error = %e, fund = fund_name, "Failed to dispatch provider notification");
            }
        }
    });
}

/// Loads a fund scoped to its sponsor organization, or the 404 response.
async fn resolve_sponsor_fund(
    state: &AppState,
    org_id: Uuid,
    fund_id: Uuid,
) -> Result<tegoed_db::entities::funds::Model, Response> {
    match FundRepository::new((*state.db).clone())
        .find_sponsor_fund(org_id, fund_id)
        .await
    {
        Ok(Some(fund)) => Ok(fund),
        Ok(None) => Err(fund_not_found()),
        Err(e) => {
            error!(error = %e, "Failed to load fund");
            Err(internal_error())
        }
    }
}

async fn check_membership(
    org_repo: &OrganizationRepository,
    org_id: Uuid,
    identity_address: &str,
) -> Result<(), Response> {
    match org_repo.is_member(org_id, identity_address).await {
        Ok(true) => Ok(()),
        Ok(false) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "forbidden",
                "message": "You are not a member of this organization"
            })),
        )
            .into_response()),
        Err(e) => {
            error!(error = %e, "Failed to check membership");
            Err(internal_error())
        }
    }
}

fn parse_provider_state_filter(
    state: Option<&str>,
) -> Result<Option<FundProviderState>, Response> {
    match state {
        None => Ok(None),
        Some(raw) => match FundProviderState::parse(raw) {
            Some(parsed) => Ok(Some(parsed)),
            None => Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_state",
                    "message": format!("Unknown provider state: {raw}")
                })),
            )
                .into_response()),
        },
    }
}

fn fund_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "fund_not_found",
            "message": "Fund not found"
        })),
    )
        .into_response()
}

fn provider_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "provider_not_found",
            "message": "Fund provider not found"
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

//! Tegoed API Server
//!
//! Main entry point for the Tegoed backend service.

use std::sync::Arc;

use chrono::{Days, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tegoed_api::{AppState, create_router};
use tegoed_db::{FundRepository, OrganizationRepository, VoucherRepository, connect};
use tegoed_shared::{AppConfig, JwtConfig, JwtService, Notifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tegoed=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // Identity tokens are issued elsewhere; we only hold the validation key.
    let jwt_service = JwtService::new(JwtConfig {
        secret: config.auth.jwt_secret.clone(),
        ..JwtConfig::default()
    });

    let notifier = Notifier::new(config.notifications.clone(), config.frontend.clone());
    info!(
        enabled = config.notifications.enabled,
        smtp_host = %config.notifications.smtp_host,
        smtp_port = %config.notifications.smtp_port,
        "Notifier configured"
    );

    let config = Arc::new(config);

    // Create application state
    let state = AppState {
        db: Arc::new(db),
        jwt_service: Arc::new(jwt_service),
        notifier: Arc::new(notifier),
        config: config.clone(),
    };

    if config.notifications.expiry_reminders {
        spawn_expiry_reminders(state.clone());
        info!(
            reminder_weeks = config.notifications.reminder_weeks,
            "Expiry reminder task started"
        );
    }

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Runs one reminder pass per day; a failed pass is logged and retried on
/// the next tick.
fn spawn_expiry_reminders(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60 * 60 * 24));
        loop {
            ticker.tick().await;
            if let Err(e) = expiry_reminder_pass(&state).await {
                warn!(error = %e, "Expiry reminder pass failed");
            }
        }
    });
}

/// Reminds holders of regular vouchers expiring exactly `reminder_weeks`
/// from today with balance left to spend.
async fn expiry_reminder_pass(state: &AppState) -> anyhow::Result<()> {
    let weeks = state.config.notifications.reminder_weeks;
    let today = Utc::now().date_naive();
    let Some(target_day) = today.checked_add_days(Days::new(u64::from(weeks) * 7)) else {
        return Ok(());
    };
    let Some(day_after) = target_day.checked_add_days(Days::new(1)) else {
        return Ok(());
    };
    let window_start = target_day.and_time(NaiveTime::MIN).and_utc();
    let window_end = day_after.and_time(NaiveTime::MIN).and_utc();

    let voucher_repo = VoucherRepository::new((*state.db).clone());
    let fund_repo = FundRepository::new((*state.db).clone());
    let org_repo = OrganizationRepository::new((*state.db).clone());

    let expiring = voucher_repo
        .expiring_regular_vouchers(window_start, window_end)
        .await?;
    info!(
        count = expiring.len(),
        target_day = %target_day,
        "Expiry reminder pass"
    );

    for voucher in expiring {
        let breakdown = voucher_repo.balance(&voucher).await?;
        if breakdown.available() <= Decimal::ZERO {
            continue;
        }

        let Some(fund) = fund_repo.find_by_id(voucher.fund_id).await? else {
            continue;
        };
        let Some(sponsor) = org_repo.find_by_id(fund.organization_id).await? else {
            continue;
        };

        let expires_on = voucher.expire_at.with_timezone(&Utc).date_naive().to_string();
        if let Err(e) = state
            .notifier
            .voucher_expiry_reminder(
                &voucher.identity_address,
                &fund.name,
                &sponsor.name,
                &breakdown.available().to_string(),
                &expires_on,
            )
            .await
        {
            warn!(
                error = %e,
                voucher_id = %voucher.id,
                "Failed to send expiry reminder"
            );
        }
    }

    Ok(())
}

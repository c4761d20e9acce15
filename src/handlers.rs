use crate::circuit_breaker::VisionBreaker;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::payment_client::PaymentClient;
use crate::services::BookingNotifier;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Client for the payment gateway's checkout API (optional).
    pub payment_client: Option<PaymentClient>,
    /// Vision analysis response cache (checksum-validated entries).
    pub analysis_cache: Cache<String, String>,
    /// Circuit breaker shared across vision-service calls.
    pub vision_breaker: VisionBreaker,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "movco-lead-api",
            "version": "0.1.0"
        })),
    )
}

// ============ Quotes ============

/// POST /api/v1/quotes
///
/// Persists a new quote with status "new".
pub async fn create_quote(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateQuoteRequest>,
) -> Result<(StatusCode, Json<Quote>), AppError> {
    if payload.start_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "start_address cannot be empty".to_string(),
        ));
    }
    if payload.end_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "end_address cannot be empty".to_string(),
        ));
    }

    let quote = sqlx::query_as::<_, Quote>(
        "INSERT INTO quotes (id, start_address, end_address, photo_urls, status, user_id)
         VALUES ($1, $2, $3, $4, 'new', $5)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(payload.start_address.trim())
    .bind(payload.end_address.trim())
    .bind(&payload.photo_urls)
    .bind(payload.user_id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!("Quote {} created for user {}", quote.id, quote.user_id);

    Ok((StatusCode::CREATED, Json(quote)))
}

/// GET /api/v1/quotes/:id
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Quote>, AppError> {
    let quote = crate::distribution::load_quote(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quote {} not found", id)))?;

    Ok(Json(quote))
}

/// GET /api/v1/quotes?user_id=
pub async fn list_quotes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QuoteListParams>,
) -> Result<Json<Vec<Quote>>, AppError> {
    let quotes = sqlx::query_as::<_, Quote>(
        "SELECT * FROM quotes WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(params.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(quotes))
}

/// DELETE /api/v1/quotes/:id
///
/// Explicit user deletion; the only path that removes a quote.
pub async fn delete_quote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM quotes WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Quote {} not found", id)));
    }

    tracing::info!("Quote {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/quotes/:id/booking-interest
///
/// Records the customer's yes/no booking response on the quote, then fires
/// a best-effort notification to the configured endpoint. Notification
/// failures are logged and never surfaced to the customer.
pub async fn record_booking_interest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BookingInterestRequest>,
) -> Result<Json<Quote>, AppError> {
    let quote = sqlx::query_as::<_, Quote>(
        "UPDATE quotes SET booking_interest = $1 WHERE id = $2 RETURNING *",
    )
    .bind(payload.interested)
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Quote {} not found", id)))?;

    tracing::info!(
        "Booking interest recorded for quote {}: {}",
        id,
        payload.interested
    );

    if let Some(ref endpoint) = state.config.booking_notify_url {
        let notifier = BookingNotifier::new(endpoint.clone());
        if let Err(e) = notifier
            .notify(
                quote.id,
                payload.interested,
                &quote.start_address,
                &quote.end_address,
            )
            .await
        {
            tracing::error!("Booking notification failed for quote {}: {}", id, e);
        }
    }

    Ok(Json(quote))
}

// ============ Admin (read-only reporting) ============

/// Checks the admin token header against the configured policy. With no
/// token configured, every admin request is rejected.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    check_admin_token(state.config.admin_token.as_deref(), headers)
}

fn check_admin_token(configured: Option<&str>, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = configured else {
        return Err(AppError::Unauthorized(
            "Admin access not configured".to_string(),
        ));
    };

    let provided = headers
        .get("X-Admin-Token")
        .or_else(|| headers.get("x-admin-token"))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Admin-Token header".to_string()))?;

    if !crate::wallet_handler::constant_time_compare(provided, expected) {
        return Err(AppError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok(())
}

/// GET /api/v1/admin/quotes
///
/// Recent quotes with the owner's email joined on.
pub async fn admin_list_quotes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AdminQuoteRow>>, AppError> {
    require_admin(&state, &headers)?;

    let rows = sqlx::query_as::<_, AdminQuoteRow>(
        "SELECT q.id, q.created_at, q.start_address, q.end_address, q.status,
                q.booking_interest, q.ai_estimate, p.email AS owner_email
         FROM quotes q
         LEFT JOIN profiles p ON p.id = q.user_id
         ORDER BY q.created_at DESC
         LIMIT 200",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

/// GET /api/v1/admin/companies
pub async fn admin_list_companies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PartnerCompany>>, AppError> {
    require_admin(&state, &headers)?;

    let companies = sqlx::query_as::<_, PartnerCompany>(
        "SELECT * FROM companies ORDER BY created_at ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(companies))
}

/// GET /api/v1/admin/summary
///
/// Aggregate counts across quotes, companies and the wallet ledger.
pub async fn admin_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AdminSummary>, AppError> {
    require_admin(&state, &headers)?;

    let total_quotes =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quotes")
            .fetch_one(&state.db)
            .await?;

    let new_quotes =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quotes WHERE status = 'new'")
            .fetch_one(&state.db)
            .await?;

    let booked_quotes =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quotes WHERE status = 'booked'")
            .fetch_one(&state.db)
            .await?;

    let active_companies =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM companies WHERE active = true")
            .fetch_one(&state.db)
            .await?;

    let total_topups_pence = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount_pence), 0) FROM wallet_transactions WHERE kind = 'top_up'",
    )
    .fetch_one(&state.db)
    .await?;

    let total_lead_charges_pence = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount_pence), 0) FROM wallet_transactions
         WHERE kind = 'lead_purchase'",
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(AdminSummary {
        total_quotes,
        new_quotes,
        booked_quotes,
        active_companies,
        total_topups_pence,
        total_lead_charges_pence,
    }))
}

// ============ Router ============

/// Builds the application router.
///
/// Business routes sit behind a per-IP governor (10 req/s, burst 20) and a
/// 1MB body limit. `/health` and the payment webhook are registered outside
/// the governor: the gateway redelivers webhooks in bursts from a small set
/// of IPs, and those redeliveries must not be throttled into 429s. The
/// webhook keeps its own body limit.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    let protected_routes = Router::new()
        // Quote intake and reads
        .route("/api/v1/quotes", post(create_quote).get(list_quotes))
        .route("/api/v1/quotes/:id", get(get_quote).delete(delete_quote))
        .route(
            "/api/v1/quotes/:id/booking-interest",
            post(record_booking_interest),
        )
        // AI analysis proxy
        .route("/api/v1/quotes/analyze", post(crate::analysis::analyze_quote))
        // Lead distribution
        .route(
            "/api/v1/leads/distribute",
            post(crate::distribution::distribute_lead),
        )
        // Wallet top-ups
        .route(
            "/api/v1/wallet/checkout",
            post(crate::wallet_handler::create_checkout),
        )
        // Admin reporting
        .route("/api/v1/admin/quotes", get(admin_list_quotes))
        .route("/api/v1/admin/companies", get(admin_list_companies))
        .route("/api/v1/admin/summary", get(admin_summary))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload (JSON only; photos live in object storage)
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Signed gateway deliveries; authenticated by signature, not throttled
    let webhook_routes = Router::new()
        .route(
            "/api/v1/webhooks/payments",
            post(crate::wallet_handler::payment_webhook),
        )
        .layer(RequestBodyLimitLayer::new(1024 * 1024));

    Router::new()
        .route("/health", get(health))
        .merge(webhook_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

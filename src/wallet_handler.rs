use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{CheckoutRequest, CheckoutResponse};
use crate::wallet_models::{GatewayEvent, WebhookAck};

/// Payment gateway webhook handler.
///
/// Receives signed events from the payment gateway when a hosted checkout
/// completes, and credits the partner company's wallet.
///
/// Flow:
/// 1. Verify the signature header against the shared webhook secret (400
///    on failure).
/// 2. Only checkout-completion events tagged `purpose=wallet_topup` are
///    processed; everything else is acknowledged as "ignored".
/// 3. Metadata must carry a valid company id and a positive amount (400).
/// 4. The company must exist (404).
/// 5. Replay safety: the session id is claimed in `webhook_events` before
///    crediting; a second delivery of the same session is acknowledged as
///    "duplicate" and credits nothing.
/// 6. Balance credit and ledger row are written in one transaction.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<WebhookAck>), AppError> {
    tracing::info!("Received payment gateway webhook");

    // 1. Verify signature
    let signature = headers
        .get("Stripe-Signature")
        .or_else(|| headers.get("stripe-signature"))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    verify_signature(&state.config.gateway_webhook_secret, signature, &body)?;

    // 2. Parse and filter the event
    let event: GatewayEvent = serde_json::from_str(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    if !event.is_wallet_topup() {
        tracing::debug!("Ignoring gateway event type '{}'", event.event_type);
        return Ok((
            StatusCode::OK,
            Json(WebhookAck {
                status: "ignored".to_string(),
                session_id: None,
            }),
        ));
    }

    // 3. Validate metadata
    let company_id = event.company_id()?;
    let amount_pence = event.amount_pence()?;
    let session_id = event.data.object.id.clone();

    // 4. Company must exist
    let company_exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM companies WHERE id = $1)")
            .bind(company_id)
            .fetch_one(&state.db)
            .await?;

    if !company_exists {
        return Err(AppError::NotFound(format!(
            "Company {} not found",
            company_id
        )));
    }

    // 5 + 6. Claim the session id and credit the wallet atomically
    match apply_topup(&state.db, &event, company_id, amount_pence, &session_id).await? {
        TopupResult::Credited => {
            tracing::info!(
                "Credited {}p to company {} (session {})",
                amount_pence,
                company_id,
                session_id
            );
            Ok((
                StatusCode::OK,
                Json(WebhookAck {
                    status: "processed".to_string(),
                    session_id: Some(session_id),
                }),
            ))
        }
        TopupResult::Duplicate => {
            tracing::warn!("Replayed webhook for session {} - no credit applied", session_id);
            Ok((
                StatusCode::OK,
                Json(WebhookAck {
                    status: "duplicate".to_string(),
                    session_id: Some(session_id),
                }),
            ))
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TopupResult {
    Credited,
    Duplicate,
}

/// Claims the session id, credits the balance and appends the ledger row in
/// a single transaction. The unique constraint on `webhook_events.session_id`
/// is what makes webhook replays harmless.
pub async fn apply_topup(
    db: &PgPool,
    event: &GatewayEvent,
    company_id: Uuid,
    amount_pence: i64,
    session_id: &str,
) -> Result<TopupResult, AppError> {
    let mut tx = db.begin().await?;

    let claimed = sqlx::query(
        "INSERT INTO webhook_events (session_id, event_type, company_id, amount_pence)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (session_id) DO NOTHING",
    )
    .bind(session_id)
    .bind(&event.event_type)
    .bind(company_id)
    .bind(amount_pence)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(TopupResult::Duplicate);
    }

    sqlx::query("UPDATE companies SET balance_pence = balance_pence + $1 WHERE id = $2")
        .bind(amount_pence)
        .bind(company_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO wallet_transactions (id, company_id, amount_pence, kind, description, session_id)
         VALUES ($1, $2, $3, 'top_up', $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(amount_pence)
    .bind(format!("Wallet top-up via checkout session {}", session_id))
    .bind(session_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(TopupResult::Credited)
}

/// POST /api/v1/wallet/checkout
///
/// Creates a hosted checkout session for a wallet top-up and returns the
/// redirect URL.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    tracing::info!(
        "POST /wallet/checkout - company: {}, amount: {}p",
        payload.company_id,
        payload.amount_pence
    );

    if payload.amount_pence <= 0 {
        return Err(AppError::BadRequest(
            "Top-up amount must be positive".to_string(),
        ));
    }

    let payment_customer_id = sqlx::query_scalar::<_, Option<String>>(
        "SELECT payment_customer_id FROM companies WHERE id = $1",
    )
    .bind(payload.company_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Company {} not found", payload.company_id)))?;

    let client = state.payment_client.as_ref().ok_or_else(|| {
        AppError::Internal("Payment gateway client not configured".to_string())
    })?;

    let session = client
        .create_topup_session(
            payload.company_id,
            payload.amount_pence,
            payment_customer_id.as_deref(),
            &state.config.checkout_success_url,
            &state.config.checkout_cancel_url,
        )
        .await?;

    Ok(Json(CheckoutResponse {
        url: session.url,
        session_id: session.session_id,
    }))
}

// ============ Signature verification ============

/// Computes the hex HMAC-SHA256 signature for a timestamped payload, the
/// same construction the gateway uses: `HMAC(secret, "{ts}.{body}")`.
pub fn sign_payload(secret: &str, timestamp: i64, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(format!("{}.{}", timestamp, body).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a gateway signature header of the form `t=<unix ts>,v1=<hex>`
/// against the raw request body. Rejects stale timestamps to limit replay
/// windows at the transport level (DB-level session dedup is the real
/// idempotency guard).
pub fn verify_signature(secret: &str, header: &str, body: &str) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::BadRequest("Malformed signature header".to_string()))?;

    if candidates.is_empty() {
        return Err(AppError::BadRequest(
            "Malformed signature header".to_string(),
        ));
    }

    let age = (chrono::Utc::now().timestamp() - timestamp).abs();
    if age > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::BadRequest(
            "Webhook timestamp outside tolerance".to_string(),
        ));
    }

    let expected = sign_payload(secret, timestamp, body);
    if candidates.iter().any(|c| constant_time_compare(c, &expected)) {
        Ok(())
    } else {
        tracing::warn!("Invalid webhook signature received");
        Err(AppError::BadRequest(
            "Webhook signature verification failed".to_string(),
        ))
    }
}

const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Constant-time string comparison (basic implementation)
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn signed_header(body: &str) -> String {
        let ts = chrono::Utc::now().timestamp();
        format!("t={},v1={}", ts, sign_payload(SECRET, ts, body))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = r#"{"id":"evt_1"}"#;
        let header = signed_header(body);
        assert!(verify_signature(SECRET, &header, body).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let body = r#"{"id":"evt_1"}"#;
        let header = signed_header(body);
        let result = verify_signature(SECRET, &header, r#"{"id":"evt_2"}"#);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = r#"{"id":"evt_1"}"#;
        let header = signed_header(body);
        let result = verify_signature("whsec_other", &header, body);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let body = "{}";
        assert!(verify_signature(SECRET, "", body).is_err());
        assert!(verify_signature(SECRET, "t=notanumber,v1=abc", body).is_err());
        assert!(verify_signature(SECRET, "v1=deadbeef", body).is_err());
        assert!(verify_signature(SECRET, "t=12345", body).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = "{}";
        let ts = chrono::Utc::now().timestamp() - 3600;
        let header = format!("t={},v1={}", ts, sign_payload(SECRET, ts, body));
        let result = verify_signature(SECRET, &header, body);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_second_candidate_signature_accepted() {
        // Gateways send multiple v1 entries during secret rotation
        let body = r#"{"id":"evt_1"}"#;
        let ts = chrono::Utc::now().timestamp();
        let good = sign_payload(SECRET, ts, body);
        let header = format!("t={},v1={},v1={}", ts, "0".repeat(64), good);
        assert!(verify_signature(SECRET, &header, body).is_ok());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
        assert!(!constant_time_compare("", "a"));
    }
}

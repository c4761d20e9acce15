use axum::{extract::State, Json};
use failsafe::futures::CircuitBreaker;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::analysis_cache;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{AnalysisItem, AnalysisResult, AnalyzeRequest};
use crate::services::VisionService;

/// Base fee of the heuristic fallback, in GBP.
pub const FALLBACK_BASE_GBP: f64 = 350.0;
/// Per-photo increment of the heuristic fallback, in GBP.
pub const FALLBACK_PER_PHOTO_GBP: f64 = 120.0;
/// Coarse price-to-volume ratio used to back volume out of a fallback fee.
const GBP_PER_M3: f64 = 50.0;
/// Coarse volume-to-floor-area ratio.
const AREA_PER_VOLUME: f64 = 1.3;

/// POST /api/v1/quotes/analyze
///
/// Proxies the move details to the external vision service and returns a
/// normalized estimate. This endpoint must always produce *some* estimate:
/// with no photos it returns a fixed placeholder, and when the vision
/// upstream fails (network, non-2xx, parse error, open circuit) it falls
/// back to a deterministic heuristic instead of erroring.
pub async fn analyze_quote(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    // Resolve the move details: either from a stored quote or inline
    let (quote_id, start_address, end_address, photo_urls) = match payload.quote_id {
        Some(id) => {
            let quote = crate::distribution::load_quote(&state.db, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Quote {} not found", id)))?;
            (
                Some(id),
                quote.start_address,
                quote.end_address,
                quote.photo_urls.unwrap_or_default(),
            )
        }
        None => {
            let start = payload
                .start_address
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest("start_address required without quote_id".to_string())
                })?;
            let end = payload
                .end_address
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest("end_address required without quote_id".to_string())
                })?;
            (None, start, end, payload.photo_urls.unwrap_or_default())
        }
    };

    tracing::info!(
        "POST /quotes/analyze - {} photo(s), quote: {:?}",
        photo_urls.len(),
        quote_id
    );

    // No photos: fixed placeholder, nothing to analyze or cache
    if photo_urls.is_empty() {
        return Ok(Json(placeholder_estimate()));
    }

    let cache_key = format!(
        "{}|{}|{}",
        start_address,
        end_address,
        photo_urls.join(",")
    );

    // Check cache first with integrity validation
    if let Some(cached) = state.analysis_cache.get(&cache_key).await {
        if let Some(valid_data) = analysis_cache::unseal(&cached) {
            if let Ok(result) = serde_json::from_str::<AnalysisResult>(&valid_data) {
                tracing::debug!("Analysis cache HIT for quote {:?}", quote_id);
                return Ok(Json(result));
            }
        } else {
            tracing::warn!("Analysis cache validation failed, refetching from vision service");
        }
    }

    let vision = VisionService::new(&state.config);
    let result = match state
        .vision_breaker
        .call(vision.analyze(&start_address, &end_address, &photo_urls))
        .await
    {
        Ok(result) => {
            // Cache successful responses only; fallbacks stay uncached so a
            // recovered upstream is picked up on the next request
            if let Ok(json_str) = serde_json::to_string(&result) {
                state
                    .analysis_cache
                    .insert(cache_key, analysis_cache::seal(json_str))
                    .await;
            }

            if let Some(id) = quote_id {
                persist_analysis(&state.db, id, &result).await?;
            }

            result
        }
        Err(e) => {
            tracing::warn!(
                "Vision analysis unavailable ({}), using heuristic fallback",
                e
            );
            fallback_estimate(photo_urls.len())
        }
    };

    Ok(Json(result))
}

/// Writes the AI-derived fields back onto the quote row.
async fn persist_analysis(
    db: &PgPool,
    quote_id: Uuid,
    result: &AnalysisResult,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE quotes
         SET ai_estimate = $1,
             ai_volume_m3 = $2,
             ai_van_count = $3,
             ai_distance_miles = $4,
             ai_recommended_movers = $5
         WHERE id = $6",
    )
    .bind(result.estimate)
    .bind(result.total_volume_m3)
    .bind(result.van_count)
    .bind(result.distance_miles)
    .bind(result.recommended_movers)
    .bind(quote_id)
    .execute(db)
    .await?;

    tracing::debug!("Persisted analysis onto quote {}", quote_id);
    Ok(())
}

/// Fixed estimate shown before any photos are uploaded.
pub fn placeholder_estimate() -> AnalysisResult {
    AnalysisResult {
        estimate: FALLBACK_BASE_GBP,
        description: "Starting estimate - upload room photos for an itemized AI quote."
            .to_string(),
        items: vec![],
        total_volume_m3: 0.0,
        total_area_m2: 0.0,
        distance_miles: None,
        duration_text: None,
        van_count: None,
        recommended_movers: None,
        pricing_method: "placeholder".to_string(),
    }
}

/// Deterministic heuristic used when the vision service is unavailable:
/// base fee plus a per-photo increment, with volume and area backed out of
/// the fee. Depends only on the photo count.
pub fn fallback_estimate(photo_count: usize) -> AnalysisResult {
    let estimate = FALLBACK_BASE_GBP + FALLBACK_PER_PHOTO_GBP * photo_count as f64;
    let volume_m3 = round2(estimate / GBP_PER_M3);
    let area_m2 = round2(volume_m3 * AREA_PER_VOLUME);

    AnalysisResult {
        estimate,
        description: format!(
            "Estimate based on {} room photo(s). Detailed AI analysis was unavailable; \
             this is a standard rate estimate.",
            photo_count
        ),
        items: vec![AnalysisItem {
            name: "Household contents".to_string(),
            quantity: 1,
            note: Some("Itemized inventory unavailable - estimated from photo count".to_string()),
            estimated_volume_ft3: None,
        }],
        total_volume_m3: volume_m3,
        total_area_m2: area_m2,
        distance_miles: Some(20.0),
        duration_text: Some("~45 mins (estimated)".to_string()),
        van_count: Some(((volume_m3 / 35.0).ceil() as i32).max(1)),
        recommended_movers: Some(if volume_m3 > 30.0 { 3 } else { 2 }),
        pricing_method: "fallback".to_string(),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

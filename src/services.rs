use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AnalysisItem, AnalysisResult};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// Client for the external AI vision service that turns room photos into a
/// volume and price estimate.
pub struct VisionService {
    client: Client,
    base_url: String,
}

/// Raw response shape from the vision service's /analyze endpoint.
#[derive(Debug, Deserialize)]
struct VisionResponse {
    estimate: f64,
    description: String,
    #[serde(default)]
    items: Vec<AnalysisItem>,
    #[serde(rename = "totalVolumeM3")]
    total_volume_m3: f64,
    #[serde(rename = "totalAreaM2")]
    total_area_m2: f64,
    distance_miles: Option<f64>,
    duration_text: Option<String>,
    van_count: Option<i32>,
    recommended_movers: Option<i32>,
}

impl VisionService {
    pub fn new(config: &Config) -> Self {
        Self {
            // Vision analysis downloads and processes photos upstream, so the
            // timeout is generous compared to the other clients.
            client: Client::builder()
                .timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
            base_url: config.vision_base_url.clone(),
        }
    }

    /// Sends the move details and photo URLs for analysis and maps the
    /// response into the local result shape.
    pub async fn analyze(
        &self,
        start_address: &str,
        end_address: &str,
        photo_urls: &[String],
    ) -> Result<AnalysisResult, AppError> {
        let url = format!("{}/analyze", self.base_url);
        tracing::info!(
            "Requesting vision analysis for {} photo(s)",
            photo_urls.len()
        );

        let body = json!({
            "starting_address": start_address,
            "ending_address": end_address,
            "photo_urls": photo_urls,
        });

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            AppError::Upstream(format!("Vision service request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Vision service returned error {}: {}", status, error_text);
            return Err(AppError::Upstream(format!(
                "Vision service returned status {}: {}",
                status, error_text
            )));
        }

        let result: VisionResponse = response.json().await.map_err(|e| {
            AppError::Upstream(format!("Failed to parse vision response: {}", e))
        })?;

        tracing::info!(
            "Vision analysis complete: estimate £{:.2}, {} item type(s), {:.1} m³",
            result.estimate,
            result.items.len(),
            result.total_volume_m3
        );

        Ok(AnalysisResult {
            estimate: result.estimate,
            description: result.description,
            items: result.items,
            total_volume_m3: result.total_volume_m3,
            total_area_m2: result.total_area_m2,
            distance_miles: result.distance_miles,
            duration_text: result.duration_text,
            van_count: result.van_count,
            recommended_movers: result.recommended_movers,
            pricing_method: "vision".to_string(),
        })
    }
}

/// Best-effort notifier for booking-interest responses. Failures are logged
/// by the caller and never surfaced to the customer.
pub struct BookingNotifier {
    client: Client,
    endpoint: String,
}

impl BookingNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            endpoint,
        }
    }

    pub async fn notify(
        &self,
        quote_id: Uuid,
        interested: bool,
        start_address: &str,
        end_address: &str,
    ) -> Result<(), AppError> {
        let body = json!({
            "quote_id": quote_id,
            "interested": interested,
            "start_address": start_address,
            "end_address": end_address,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::Upstream(format!("Booking notification failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Booking notification endpoint returned {}",
                response.status()
            )));
        }

        tracing::info!("✓ Booking interest notification sent for quote {}", quote_id);
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;

/// Signed event delivered by the payment gateway.
///
/// Only `checkout.session.completed` events tagged as wallet top-ups are
/// acted on; everything else is acknowledged and ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayEvent {
    /// Gateway event id (e.g. "evt_...").
    pub id: String,

    /// Event type (e.g. "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event payload.
    pub data: GatewayEventData,

    /// Raw data for any additional fields
    #[serde(flatten)]
    pub raw: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayEventData {
    pub object: CheckoutSession,
}

/// The checkout session carried inside a completion event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSession {
    /// Session id (e.g. "cs_..."); used as the idempotency key.
    pub id: String,

    /// Metadata attached at session creation time.
    #[serde(default)]
    pub metadata: SessionMetadata,

    /// Total charged amount in minor units, as reported by the gateway.
    pub amount_total: Option<i64>,

    /// Gateway customer reference.
    pub customer: Option<String>,

    /// Raw session data
    #[serde(flatten)]
    pub raw: Value,
}

/// Metadata we attach when creating a top-up session. Gateway metadata
/// values are always strings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionMetadata {
    pub purpose: Option<String>,
    pub company_id: Option<String>,
    pub amount_pence: Option<String>,

    #[serde(flatten)]
    pub raw: Value,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            purpose: None,
            company_id: None,
            amount_pence: None,
            raw: Value::Object(serde_json::Map::new()),
        }
    }
}

impl GatewayEvent {
    /// True when this event is a completed wallet top-up checkout.
    pub fn is_wallet_topup(&self) -> bool {
        self.event_type == "checkout.session.completed"
            && self.data.object.metadata.purpose.as_deref() == Some("wallet_topup")
    }

    /// Company id from session metadata; rejects missing or malformed values.
    pub fn company_id(&self) -> Result<Uuid, AppError> {
        let raw = self
            .data
            .object
            .metadata
            .company_id
            .as_deref()
            .ok_or_else(|| {
                AppError::BadRequest("Missing company_id in session metadata".to_string())
            })?;

        raw.parse::<Uuid>()
            .map_err(|_| AppError::BadRequest(format!("Invalid company_id '{}'", raw)))
    }

    /// Top-up amount in pence. Only the metadata value set at session
    /// creation is trusted; the gateway-reported `amount_total` is never
    /// used, so a completed session this service did not mint cannot set
    /// the credit. Must be positive.
    pub fn amount_pence(&self) -> Result<i64, AppError> {
        let raw = self
            .data
            .object
            .metadata
            .amount_pence
            .as_deref()
            .ok_or_else(|| {
                AppError::BadRequest("Missing amount_pence in session metadata".to_string())
            })?;

        let amount = raw
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest(format!("Invalid amount_pence '{}'", raw)))?;

        if amount <= 0 {
            return Err(AppError::BadRequest(format!(
                "Top-up amount must be positive, got {}",
                amount
            )));
        }

        Ok(amount)
    }
}

/// Acknowledgement sent back to the gateway.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    /// "processed", "ignored" or "duplicate".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topup_event_json(company_id: &str, amount: &str) -> String {
        json!({
            "id": "evt_123",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_abc",
                    "amount_total": 2500,
                    "customer": "cus_9",
                    "metadata": {
                        "purpose": "wallet_topup",
                        "company_id": company_id,
                        "amount_pence": amount
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_parse_topup_event() {
        let company_id = Uuid::new_v4();
        let event: GatewayEvent =
            serde_json::from_str(&topup_event_json(&company_id.to_string(), "2500")).unwrap();

        assert!(event.is_wallet_topup());
        assert_eq!(event.company_id().unwrap(), company_id);
        assert_eq!(event.amount_pence().unwrap(), 2500);
        assert_eq!(event.data.object.id, "cs_test_abc");
    }

    #[test]
    fn test_other_event_types_not_topups() {
        let json = json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1" } }
        })
        .to_string();

        let event: GatewayEvent = serde_json::from_str(&json).unwrap();
        assert!(!event.is_wallet_topup());
    }

    #[test]
    fn test_completed_session_without_topup_marker_ignored() {
        let json = json!({
            "id": "evt_2",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_other", "metadata": { "purpose": "subscription" } } }
        })
        .to_string();

        let event: GatewayEvent = serde_json::from_str(&json).unwrap();
        assert!(!event.is_wallet_topup());
    }

    #[test]
    fn test_missing_company_id_rejected() {
        let json = json!({
            "id": "evt_3",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_x", "metadata": { "purpose": "wallet_topup" } } }
        })
        .to_string();

        let event: GatewayEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(event.company_id(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let company_id = Uuid::new_v4().to_string();
        let event: GatewayEvent =
            serde_json::from_str(&topup_event_json(&company_id, "0")).unwrap();
        assert!(matches!(event.amount_pence(), Err(AppError::BadRequest(_))));

        let event: GatewayEvent =
            serde_json::from_str(&topup_event_json(&company_id, "-100")).unwrap();
        assert!(matches!(event.amount_pence(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_gateway_total_never_substitutes_for_metadata_amount() {
        // A session without our amount_pence metadata is not one we minted,
        // even if the gateway reports a total
        let company_id = Uuid::new_v4();
        let json = json!({
            "id": "evt_4",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_y",
                    "amount_total": 1500,
                    "metadata": {
                        "purpose": "wallet_topup",
                        "company_id": company_id.to_string()
                    }
                }
            }
        })
        .to_string();

        let event: GatewayEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(event.amount_pence(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        let company_id = Uuid::new_v4().to_string();
        let event: GatewayEvent =
            serde_json::from_str(&topup_event_json(&company_id, "lots")).unwrap();
        assert!(matches!(event.amount_pence(), Err(AppError::BadRequest(_))));
    }
}

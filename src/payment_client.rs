use crate::errors::AppError;
use std::time::Duration;
use uuid::Uuid;

/// Client for the hosted payment gateway's checkout API.
///
/// Creates hosted checkout sessions for wallet top-ups; the balance credit
/// itself happens later via the signed webhook.
#[derive(Clone)]
pub struct PaymentClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

/// A created checkout session: where to send the user, and the session id
/// we will see again in the completion webhook.
#[derive(Debug)]
pub struct CheckoutSessionRef {
    pub session_id: String,
    pub url: String,
}

impl PaymentClient {
    pub fn new(base_url: String, secret_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::Upstream(format!("Failed to create gateway client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            secret_key,
        })
    }

    /// Creates a hosted checkout session for a wallet top-up.
    ///
    /// The session carries `purpose=wallet_topup`, the company id and the
    /// amount in its metadata so the webhook handler can validate and credit
    /// the right wallet.
    pub async fn create_topup_session(
        &self,
        company_id: Uuid,
        amount_pence: i64,
        payment_customer_id: Option<&str>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSessionRef, AppError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);
        tracing::info!(
            "Creating top-up checkout session: company={}, amount={}p",
            company_id,
            amount_pence
        );

        let company_id_str = company_id.to_string();
        let amount_str = amount_pence.to_string();

        // The gateway's API is form-encoded
        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("line_items[0][price_data][currency]", "gbp"),
            (
                "line_items[0][price_data][product_data][name]",
                "Wallet top-up",
            ),
            ("line_items[0][price_data][unit_amount]", &amount_str),
            ("line_items[0][quantity]", "1"),
            ("metadata[purpose]", "wallet_topup"),
            ("metadata[company_id]", &company_id_str),
            ("metadata[amount_pence]", &amount_str),
        ];

        if let Some(customer) = payment_customer_id {
            form.push(("customer", customer));
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Gateway request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Upstream(format!(
                "Gateway returned {}: {}",
                status, error_text
            )));
        }

        let data: serde_json::Value = response.json().await.map_err(|e| {
            AppError::Upstream(format!("Failed to parse gateway response: {}", e))
        })?;

        let session_id = data
            .get("id")
            .and_then(|i| i.as_str())
            .ok_or_else(|| {
                tracing::warn!("Unexpected gateway response format: {:?}", data);
                AppError::Upstream(
                    "Checkout session response missing 'id' field".to_string(),
                )
            })?
            .to_string();

        let redirect_url = data
            .get("url")
            .and_then(|u| u.as_str())
            .ok_or_else(|| {
                AppError::Upstream(
                    "Checkout session response missing 'url' field".to_string(),
                )
            })?
            .to_string();

        tracing::info!("✓ Checkout session created: {}", session_id);

        Ok(CheckoutSessionRef {
            session_id,
            url: redirect_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = PaymentClient::new(
            "https://api.stripe.com".to_string(),
            "sk_test_123".to_string(),
        );
        assert!(client.is_ok());
    }
}

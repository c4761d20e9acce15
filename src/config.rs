use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub vision_base_url: String,
    pub gateway_base_url: String,
    pub gateway_secret_key: String,
    pub gateway_webhook_secret: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub booking_notify_url: Option<String>, // Optional; booking interest is still recorded without it
    pub admin_token: Option<String>,
    pub default_lead_price_pence: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            vision_base_url: std::env::var("VISION_BASE_URL")
                .map_err(|_| anyhow::anyhow!("VISION_BASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("VISION_BASE_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("VISION_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })?,
            gateway_base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            gateway_secret_key: std::env::var("GATEWAY_SECRET_KEY")
                .map_err(|_| anyhow::anyhow!("GATEWAY_SECRET_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("GATEWAY_SECRET_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            gateway_webhook_secret: std::env::var("GATEWAY_WEBHOOK_SECRET")
                .map_err(|_| {
                    anyhow::anyhow!("GATEWAY_WEBHOOK_SECRET environment variable required")
                })
                .and_then(|secret| {
                    if secret.trim().is_empty() {
                        anyhow::bail!("GATEWAY_WEBHOOK_SECRET cannot be empty");
                    }
                    Ok(secret)
                })?,
            checkout_success_url: std::env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "https://movco.co.uk/wallet?topup=success".to_string()),
            checkout_cancel_url: std::env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "https://movco.co.uk/wallet?topup=cancelled".to_string()),
            booking_notify_url: std::env::var("BOOKING_NOTIFY_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            admin_token: std::env::var("ADMIN_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            default_lead_price_pence: std::env::var("DEFAULT_LEAD_PRICE_PENCE")
                .unwrap_or_else(|_| "500".to_string())
                .parse::<i64>()
                .map_err(|_| {
                    anyhow::anyhow!("DEFAULT_LEAD_PRICE_PENCE must be a positive integer")
                })
                .and_then(|price| {
                    if price <= 0 {
                        anyhow::bail!("DEFAULT_LEAD_PRICE_PENCE must be positive");
                    }
                    Ok(price)
                })?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Vision Base URL: {}", config.vision_base_url);
        tracing::debug!("Gateway Base URL: {}", config.gateway_base_url);
        if config.booking_notify_url.is_some() {
            tracing::info!("Booking interest notifications enabled");
        }
        if config.admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN not set - admin endpoints will reject all requests");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

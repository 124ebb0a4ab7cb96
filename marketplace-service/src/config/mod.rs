use anyhow::{Context, Result};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub registry: RegistryConfig,
    pub razorpay: RazorpayConfig,
    pub checkout: CheckoutConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

/// External operator registry used for PNR verification.
#[derive(Deserialize, Clone, Debug)]
pub struct RegistryConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    /// Provider tag stamped on successful verifications.
    pub provider: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CheckoutConfig {
    /// How long an order-creation hold keeps a ticket off the market.
    pub reservation_ttl_minutes: i64,
    /// Platform fee as a percentage of the selling price.
    pub platform_fee_percent: Decimal,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("MARKETPLACE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("MARKETPLACE_PORT")
            .unwrap_or_else(|_| "3005".to_string())
            .parse()
            .context("MARKETPLACE_PORT must be a port number")?;

        let db_url = env::var("MARKETPLACE_DATABASE_URL")
            .context("MARKETPLACE_DATABASE_URL must be set")?;
        let max_connections = env::var("MARKETPLACE_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("MARKETPLACE_DATABASE_MAX_CONNECTIONS must be a number")?;
        let min_connections = env::var("MARKETPLACE_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .context("MARKETPLACE_DATABASE_MIN_CONNECTIONS must be a number")?;

        let jwt_secret =
            env::var("MARKETPLACE_JWT_SECRET").context("MARKETPLACE_JWT_SECRET must be set")?;

        let registry_base_url = env::var("MARKETPLACE_REGISTRY_URL").unwrap_or_default();
        let registry_api_key = env::var("MARKETPLACE_REGISTRY_API_KEY").unwrap_or_default();
        let registry_provider = env::var("MARKETPLACE_REGISTRY_PROVIDER")
            .unwrap_or_else(|_| "operator-registry".to_string());
        let registry_timeout_secs = env::var("MARKETPLACE_REGISTRY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("MARKETPLACE_REGISTRY_TIMEOUT_SECS must be a number")?;

        let razorpay_key_id = env::var("MARKETPLACE_RAZORPAY_KEY_ID").unwrap_or_default();
        let razorpay_key_secret = env::var("MARKETPLACE_RAZORPAY_KEY_SECRET").unwrap_or_default();
        let razorpay_webhook_secret =
            env::var("MARKETPLACE_RAZORPAY_WEBHOOK_SECRET").unwrap_or_default();
        let razorpay_api_base_url = env::var("MARKETPLACE_RAZORPAY_API_URL")
            .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string());

        let reservation_ttl_minutes = env::var("MARKETPLACE_RESERVATION_TTL_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .context("MARKETPLACE_RESERVATION_TTL_MINUTES must be a number")?;
        let platform_fee_percent = env::var("MARKETPLACE_PLATFORM_FEE_PERCENT")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("MARKETPLACE_PLATFORM_FEE_PERCENT must be a decimal")?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(jwt_secret),
            },
            registry: RegistryConfig {
                base_url: registry_base_url,
                api_key: Secret::new(registry_api_key),
                provider: registry_provider,
                timeout_secs: registry_timeout_secs,
            },
            razorpay: RazorpayConfig {
                key_id: razorpay_key_id,
                key_secret: Secret::new(razorpay_key_secret),
                webhook_secret: Secret::new(razorpay_webhook_secret),
                api_base_url: razorpay_api_base_url,
            },
            checkout: CheckoutConfig {
                reservation_ttl_minutes,
                platform_fee_percent,
            },
            service_name: "marketplace-service".to_string(),
        })
    }
}

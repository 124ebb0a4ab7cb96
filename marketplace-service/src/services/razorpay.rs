//! Razorpay gateway client.
//!
//! Wraps the Orders API for checkout initiation and the HMAC-SHA256
//! signature schemes for payment confirmation and webhook authentication.
//! Signatures are always verified in constant time; there is no test-mode
//! bypass.

use anyhow::{Result, anyhow};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::signature::verify_hmac_sha256_hex;
use std::time::Duration;
use thiserror::Error;

use crate::config::RazorpayConfig;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Razorpay credentials not configured")]
    NotConfigured,

    #[error("Gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gateway rejected the request ({code}): {description}")]
    Rejected { code: String, description: String },

    #[error("Gateway returned an unreadable response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Razorpay client for interacting with the Razorpay API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    /// Amount in smallest currency unit (paise for INR).
    amount: u64,
    currency: &'a str,
    receipt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<serde_json::Value>,
}

/// Response from Razorpay order creation.
#[derive(Debug, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
    pub created_at: u64,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorBody {
    error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorDetail {
    code: String,
    description: String,
}

/// Parameters returned by the checkout widget for signature verification.
#[derive(Debug)]
pub struct PaymentVerification {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Razorpay webhook event envelope.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub entity: String,
    pub event: String,
    pub payload: WebhookPayload,
    pub created_at: u64,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<WebhookPaymentEntity>,
    pub order: Option<WebhookOrderEntity>,
    pub refund: Option<WebhookRefundEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPaymentEntity {
    pub entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
pub struct WebhookOrderEntity {
    pub entity: RazorpayOrder,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRefundEntity {
    pub entity: RefundEntity,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    pub status: String,
    pub order_id: Option<String>,
    pub method: Option<String>,
    pub email: Option<String>,
    pub captured: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RefundEntity {
    pub id: String,
    pub payment_id: String,
    pub amount: u64,
    pub status: String,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(GATEWAY_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    /// Check if Razorpay is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    /// Public key id for the client-side checkout widget.
    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    /// Create an order in Razorpay.
    ///
    /// `amount` is in the smallest currency unit (paise for INR).
    pub async fn create_order(
        &self,
        amount: u64,
        currency: &str,
        receipt: &str,
        notes: Option<serde_json::Value>,
    ) -> Result<RazorpayOrder, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let url = format!("{}/orders", self.config.api_base_url);
        let body = CreateOrderBody {
            amount,
            currency,
            receipt,
            notes,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        tracing::debug!(status = %status, "Razorpay create_order response");

        if status.is_success() {
            let order: RazorpayOrder = serde_json::from_str(&text)?;
            tracing::info!(
                order_id = %order.id,
                amount = order.amount,
                currency = %order.currency,
                "Razorpay order created"
            );
            Ok(order)
        } else {
            let detail = serde_json::from_str::<RazorpayErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(RazorpayErrorDetail {
                    code: "UNKNOWN".to_string(),
                    description: text,
                });
            tracing::error!(
                code = %detail.code,
                description = %detail.description,
                "Razorpay order creation failed"
            );
            Err(GatewayError::Rejected {
                code: detail.code,
                description: detail.description,
            })
        }
    }

    /// Verify the checkout signature: `HMAC-SHA256(order_id|payment_id,
    /// key_secret)`, hex-encoded, compared in constant time.
    pub fn verify_payment_signature(&self, verification: &PaymentVerification) -> Result<bool> {
        let payload = format!(
            "{}|{}",
            verification.razorpay_order_id, verification.razorpay_payment_id
        );

        let is_valid = verify_hmac_sha256_hex(
            self.config.key_secret.expose_secret(),
            &payload,
            &verification.razorpay_signature,
        )?;

        if !is_valid {
            tracing::warn!(
                order_id = %verification.razorpay_order_id,
                payment_id = %verification.razorpay_payment_id,
                "Payment signature verification failed"
            );
        }

        Ok(is_valid)
    }

    /// Verify a webhook signature: `HMAC-SHA256(raw_body, webhook_secret)`.
    pub fn verify_webhook_signature(&self, body: &str, signature: &str) -> Result<bool> {
        let is_valid = verify_hmac_sha256_hex(
            self.config.webhook_secret.expose_secret(),
            body,
            signature,
        )?;

        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }

    /// Parse a webhook event from the raw request body.
    pub fn parse_webhook_event(&self, body: &str) -> Result<WebhookEvent> {
        serde_json::from_str(body).map_err(|e| anyhow!("Invalid webhook payload: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use service_core::signature::hmac_sha256_hex;

    fn test_config() -> RazorpayConfig {
        RazorpayConfig {
            key_id: "rzp_test_123".to_string(),
            key_secret: Secret::new("test_secret".to_string()),
            webhook_secret: Secret::new("webhook_secret".to_string()),
            api_base_url: "https://api.razorpay.com/v1".to_string(),
        }
    }

    #[test]
    fn is_configured_requires_credentials() {
        let client = RazorpayClient::new(test_config()).unwrap();
        assert!(client.is_configured());

        let client = RazorpayClient::new(RazorpayConfig {
            key_id: String::new(),
            key_secret: Secret::new(String::new()),
            webhook_secret: Secret::new(String::new()),
            api_base_url: String::new(),
        })
        .unwrap();
        assert!(!client.is_configured());
    }

    #[test]
    fn payment_signature_accepts_valid_hmac() {
        let client = RazorpayClient::new(test_config()).unwrap();

        let signature = hmac_sha256_hex("test_secret", "order_123|pay_456").unwrap();
        let verification = PaymentVerification {
            razorpay_order_id: "order_123".to_string(),
            razorpay_payment_id: "pay_456".to_string(),
            razorpay_signature: signature,
        };

        assert!(client.verify_payment_signature(&verification).unwrap());
    }

    #[test]
    fn payment_signature_rejects_garbage() {
        let client = RazorpayClient::new(test_config()).unwrap();

        let verification = PaymentVerification {
            razorpay_order_id: "order_123".to_string(),
            razorpay_payment_id: "pay_456".to_string(),
            razorpay_signature: "invalid_signature".to_string(),
        };

        assert!(!client.verify_payment_signature(&verification).unwrap());
    }

    #[test]
    fn webhook_signature_round_trips() {
        let client = RazorpayClient::new(test_config()).unwrap();
        let body = r#"{"event":"payment.captured"}"#;

        let signature = hmac_sha256_hex("webhook_secret", body).unwrap();
        assert!(client.verify_webhook_signature(body, &signature).unwrap());
        assert!(!client.verify_webhook_signature(body, "not-a-signature").unwrap());
    }

    #[test]
    fn webhook_event_parses_payment_payload() {
        let client = RazorpayClient::new(test_config()).unwrap();
        let body = r#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_456",
                        "amount": 45000,
                        "currency": "INR",
                        "status": "captured",
                        "order_id": "order_123",
                        "method": "upi",
                        "email": "buyer@example.com",
                        "captured": true
                    }
                }
            },
            "created_at": 1700000000
        }"#;

        let event = client.parse_webhook_event(body).unwrap();
        assert_eq!(event.event, "payment.captured");
        let payment = event.payload.payment.unwrap().entity;
        assert_eq!(payment.order_id.as_deref(), Some("order_123"));
        assert_eq!(payment.amount, 45000);
    }
}

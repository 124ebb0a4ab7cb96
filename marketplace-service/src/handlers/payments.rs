//! Payment verification after checkout-widget completion.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::auth::AuthUser;
use service_core::error::AppError;
use uuid::Uuid;

use crate::AppState;
use crate::handlers::tickets::TicketResponse;
use crate::handlers::{caller_id, require_fields};
use crate::models::{Transaction, TransactionStatus};
use crate::services::metrics::CHECKOUTS_TOTAL;
use crate::services::razorpay::PaymentVerification;
use crate::services::repository::CheckoutOutcome;

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub ticket_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: Uuid,
    pub ticket_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub seller_amount: Decimal,
    pub status: TransactionStatus,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            transaction_id: t.transaction_id,
            ticket_id: t.ticket_id,
            buyer_id: t.buyer_id,
            seller_id: t.seller_id,
            amount: t.amount,
            platform_fee: t.platform_fee,
            seller_amount: t.seller_amount,
            status: t.status,
            razorpay_order_id: t.razorpay_order_id,
            razorpay_payment_id: t.razorpay_payment_id,
            created_at: t.created_at,
            completed_at: t.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub message: String,
    pub transaction: TransactionResponse,
    pub ticket: TicketResponse,
}

/// Verify a completed checkout.
///
/// The gateway signature is verified before any state changes; a mismatch
/// fails the checkout and puts the ticket back on the market. On a valid
/// signature the transaction, ticket, and payout rows are updated in one
/// database transaction, keyed (and made idempotent) by the gateway order
/// id.
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    auth.require_verified_email()?;

    let mut missing = Vec::new();
    if payload.razorpay_order_id.is_none() {
        missing.push("razorpay_order_id");
    }
    if payload.razorpay_payment_id.is_none() {
        missing.push("razorpay_payment_id");
    }
    if payload.razorpay_signature.is_none() {
        missing.push("razorpay_signature");
    }
    if payload.ticket_id.is_none() {
        missing.push("ticket_id");
    }
    require_fields(missing)?;

    let (Some(order_id), Some(payment_id), Some(signature), Some(ticket_id)) = (
        payload.razorpay_order_id,
        payload.razorpay_payment_id,
        payload.razorpay_signature,
        payload.ticket_id,
    ) else {
        return Err(AppError::BadRequest(anyhow::anyhow!("Missing required fields")));
    };

    let buyer_id = caller_id(&auth)?;

    let verification = PaymentVerification {
        razorpay_order_id: order_id.clone(),
        razorpay_payment_id: payment_id.clone(),
        razorpay_signature: signature,
    };
    let signature_valid = state.razorpay.verify_payment_signature(&verification)?;

    if !signature_valid {
        CHECKOUTS_TOTAL
            .with_label_values(&["signature_mismatch"])
            .inc();
        if let Err(err) = state.repository.mark_payment_failed(&order_id).await {
            tracing::error!(order_id = %order_id, error = %err, "Failed to record signature failure");
        }
        return Err(AppError::Unprocessable(anyhow::anyhow!(
            "Payment signature verification failed"
        )));
    }

    let outcome = state
        .repository
        .finalize_checkout(&order_id, &payment_id, Some(ticket_id), Some(buyer_id))
        .await?;

    let (transaction, ticket, message) = match outcome {
        CheckoutOutcome::Finalized {
            transaction,
            ticket,
        } => {
            CHECKOUTS_TOTAL.with_label_values(&["completed"]).inc();
            (
                transaction,
                ticket,
                "Payment verified and ticket transferred".to_string(),
            )
        }
        CheckoutOutcome::AlreadyCompleted {
            transaction,
            ticket,
        } => (
            transaction,
            ticket,
            "Payment was already verified".to_string(),
        ),
    };

    Ok(Json(VerifyPaymentResponse {
        success: true,
        message,
        transaction: transaction.into(),
        ticket: ticket.into(),
    }))
}

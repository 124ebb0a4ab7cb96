//! Razorpay webhook receiver.
//!
//! The webhook signature is the trust boundary here: events are only
//! processed after the HMAC over the raw body checks out. Handled events
//! are always acknowledged with 200 so the gateway does not redeliver;
//! processing failures inside an event are logged and retried on the next
//! delivery of the same event (all state transitions are idempotent).

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use service_core::error::AppError;

use crate::AppState;
use crate::models::{Transaction, TransactionStatus};
use crate::services::metrics::{CHECKOUTS_TOTAL, WEBHOOK_EVENTS_TOTAL};
use crate::services::repository::CheckoutOutcome;

const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

/// Receive and process a gateway webhook.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing {} header", SIGNATURE_HEADER);
            AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
        })?;

    let is_valid = state
        .razorpay
        .verify_webhook_signature(&body, signature)
        .map_err(|e| {
            tracing::error!(error = %e, "Webhook signature verification error");
            AppError::InternalError(anyhow::anyhow!("Webhook verification failed"))
        })?;

    if !is_valid {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let event = state.razorpay.parse_webhook_event(&body).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse webhook event");
        AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
    })?;

    WEBHOOK_EVENTS_TOTAL
        .with_label_values(&[event.event.as_str()])
        .inc();

    tracing::info!(event_type = %event.event, "Processing gateway webhook");

    match event.event.as_str() {
        "payment.captured" | "order.paid" => {
            if let Some(ref payment_entity) = event.payload.payment {
                let payment = &payment_entity.entity;
                if let Some(ref order_id) = payment.order_id {
                    capture_payment(&state, order_id, &payment.id).await;
                } else {
                    tracing::warn!(payment_id = %payment.id, "Captured payment carries no order id");
                }
            }
        }
        "payment.failed" => {
            if let Some(ref payment_entity) = event.payload.payment {
                let payment = &payment_entity.entity;
                if let Some(ref order_id) = payment.order_id {
                    fail_payment(&state, order_id).await;
                }
            }
        }
        "refund.processed" => {
            if let Some(ref refund_entity) = event.payload.refund {
                process_refund(&state, &refund_entity.entity.payment_id).await;
            }
        }
        _ => {
            tracing::debug!(event_type = %event.event, "Unhandled webhook event type");
        }
    }

    // Always acknowledge handled deliveries.
    Ok(StatusCode::OK)
}

/// Finalize a captured payment. Shares the idempotent finalization path
/// with the client verify endpoint, so whichever arrives first wins and
/// the other becomes a no-op.
async fn capture_payment(state: &AppState, order_id: &str, payment_id: &str) {
    match state
        .repository
        .finalize_checkout(order_id, payment_id, None, None)
        .await
    {
        Ok(CheckoutOutcome::Finalized {
            transaction,
            ticket,
        }) => {
            CHECKOUTS_TOTAL.with_label_values(&["completed"]).inc();
            tracing::info!(
                order_id = %order_id,
                transaction_id = %transaction.transaction_id,
                "Checkout finalized via webhook"
            );
            notify(
                state,
                &transaction,
                "purchase_confirmed",
                &format!(
                    "Payment received for ticket {} ({} -> {})",
                    ticket.pnr, ticket.source_location, ticket.destination_location
                ),
                "ticket_sold",
                &format!(
                    "Your ticket {} sold; payout of {} is pending",
                    ticket.pnr, transaction.seller_amount
                ),
            )
            .await;
        }
        Ok(CheckoutOutcome::AlreadyCompleted { .. }) => {
            tracing::debug!(order_id = %order_id, "Checkout already finalized");
        }
        Err(err) => {
            tracing::error!(order_id = %order_id, error = %err, "Webhook capture processing failed");
        }
    }
}

async fn fail_payment(state: &AppState, order_id: &str) {
    match state.repository.mark_payment_failed(order_id).await {
        Ok(Some(transaction)) if transaction.status == TransactionStatus::Failed => {
            CHECKOUTS_TOTAL.with_label_values(&["failed"]).inc();
            if let Err(err) = state
                .repository
                .insert_notification(
                    transaction.buyer_id,
                    "payment_failed",
                    "Your payment did not complete; the ticket has been released",
                )
                .await
            {
                tracing::error!(error = %err, "Failed to record payment_failed notification");
            }
        }
        Ok(Some(transaction)) => {
            tracing::debug!(
                order_id = %order_id,
                status = %transaction.status,
                "Ignoring failure event for settled checkout"
            );
        }
        Ok(None) => {
            tracing::warn!(order_id = %order_id, "Failure event for unknown order");
        }
        Err(err) => {
            tracing::error!(order_id = %order_id, error = %err, "Webhook failure processing failed");
        }
    }
}

async fn process_refund(state: &AppState, payment_id: &str) {
    match state.repository.mark_refund_processed(payment_id).await {
        Ok(Some(transaction)) if transaction.status == TransactionStatus::Refunded => {
            CHECKOUTS_TOTAL.with_label_values(&["refunded"]).inc();
            notify(
                state,
                &transaction,
                "refund_processed",
                "Your payment was refunded",
                "sale_reversed",
                "A sale was refunded; the pending payout has been cancelled",
            )
            .await;
        }
        Ok(Some(transaction)) => {
            tracing::debug!(
                payment_id = %payment_id,
                status = %transaction.status,
                "Ignoring refund event for non-completed checkout"
            );
        }
        Ok(None) => {
            tracing::warn!(payment_id = %payment_id, "Refund event for unknown payment");
        }
        Err(err) => {
            tracing::error!(payment_id = %payment_id, error = %err, "Webhook refund processing failed");
        }
    }
}

async fn notify(
    state: &AppState,
    transaction: &Transaction,
    buyer_kind: &str,
    buyer_body: &str,
    seller_kind: &str,
    seller_body: &str,
) {
    for (user_id, kind, body) in [
        (transaction.buyer_id, buyer_kind, buyer_body),
        (transaction.seller_id, seller_kind, seller_body),
    ] {
        if let Err(err) = state.repository.insert_notification(user_id, kind, body).await {
            tracing::error!(user_id = %user_id, kind = %kind, error = %err, "Failed to record notification");
        }
    }
}

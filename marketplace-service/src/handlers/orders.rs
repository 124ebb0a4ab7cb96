//! Order creation: reserve the ticket, open a gateway order, record the
//! checkout attempt.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::auth::AuthUser;
use service_core::error::AppError;
use uuid::Uuid;

use crate::AppState;
use crate::handlers::caller_id;
use crate::models::{CreateTransaction, TicketStatus};
use crate::services::fees::{platform_fee, seller_amount, to_minor_units};
use crate::services::metrics::CHECKOUTS_TOTAL;
use crate::services::razorpay::GatewayError;

const ORDER_CURRENCY: &str = "INR";

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub ticket_id: Option<Uuid>,
    /// Buyer display name recorded on the transaction; defaults to the
    /// caller's email.
    pub buyer_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: String,
    /// Amount in the gateway's minor units (paise).
    pub amount: u64,
    pub currency: String,
    pub razorpay_key_id: String,
    pub receipt: String,
    pub ticket_id: Uuid,
    pub transaction_id: Uuid,
    pub seller_amount: Decimal,
    pub platform_fee: Decimal,
}

/// Open a checkout for a ticket.
///
/// Amounts are computed from the stored selling price; the client supplies
/// only the ticket it wants. The ticket is put under a reservation hold
/// before the gateway order is created, and the hold is released again if
/// the gateway rejects the order.
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    auth.require_verified_email()?;

    let ticket_id = payload.ticket_id.ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Missing required fields: ticket_id"))
    })?;

    let buyer_id = caller_id(&auth)?;
    let buyer_name = payload
        .buyer_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| auth.0.email.clone());

    if !state.razorpay.is_configured() {
        return Err(AppError::InternalError(anyhow::anyhow!(
            "Payment gateway is not configured for this environment"
        )));
    }

    let ticket = state
        .repository
        .get_ticket(ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Ticket not found")))?;

    if ticket.seller_id == buyer_id {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Sellers cannot buy their own listing"
        )));
    }
    if matches!(ticket.status, TicketStatus::Sold | TicketStatus::Cancelled) {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Ticket is no longer for sale"
        )));
    }

    let reserved_until = Utc::now() + Duration::minutes(state.config.checkout.reservation_ttl_minutes);
    let ticket = state
        .repository
        .reserve_ticket(ticket_id, buyer_id, reserved_until)
        .await?
        .ok_or_else(|| {
            CHECKOUTS_TOTAL.with_label_values(&["conflict"]).inc();
            AppError::Conflict(anyhow::anyhow!(
                "Ticket is currently held by another buyer"
            ))
        })?;

    let fee_percent = state.config.checkout.platform_fee_percent;
    let fee = platform_fee(ticket.selling_price, fee_percent);
    let net = seller_amount(ticket.selling_price, fee_percent);
    let amount_minor = to_minor_units(ticket.selling_price)?;

    let receipt = format!(
        "rcpt_{}_{}",
        &ticket.ticket_id.simple().to_string()[..8],
        Utc::now().timestamp_millis()
    );

    let order = match state
        .razorpay
        .create_order(
            amount_minor,
            ORDER_CURRENCY,
            &receipt,
            Some(json!({ "ticket_id": ticket.ticket_id })),
        )
        .await
    {
        Ok(order) => order,
        Err(err) => {
            release_quietly(&state, ticket_id).await;
            CHECKOUTS_TOTAL.with_label_values(&["gateway_error"]).inc();
            return Err(map_gateway_error(err));
        }
    };

    let transaction = match state
        .repository
        .create_transaction(&CreateTransaction {
            ticket_id: ticket.ticket_id,
            buyer_id,
            buyer_name,
            seller_id: ticket.seller_id,
            amount: ticket.selling_price,
            platform_fee: fee,
            seller_amount: net,
            razorpay_order_id: order.id.clone(),
        })
        .await
    {
        Ok(transaction) => transaction,
        Err(err) => {
            release_quietly(&state, ticket_id).await;
            return Err(err);
        }
    };

    CHECKOUTS_TOTAL.with_label_values(&["initiated"]).inc();

    tracing::info!(
        ticket_id = %ticket.ticket_id,
        transaction_id = %transaction.transaction_id,
        order_id = %order.id,
        "Checkout opened"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            success: true,
            order_id: order.id,
            amount: amount_minor,
            currency: ORDER_CURRENCY.to_string(),
            razorpay_key_id: state.razorpay.key_id().to_string(),
            receipt,
            ticket_id: ticket.ticket_id,
            transaction_id: transaction.transaction_id,
            seller_amount: net,
            platform_fee: fee,
        }),
    ))
}

fn map_gateway_error(err: GatewayError) -> AppError {
    match err {
        GatewayError::NotConfigured => {
            AppError::InternalError(anyhow::anyhow!("Payment gateway is not configured"))
        }
        GatewayError::Rejected { description, .. } => AppError::BadGateway(description),
        other => AppError::BadGateway(other.to_string()),
    }
}

/// Compensating release after a failed order creation. A failure here only
/// delays relisting until the hold lapses, so it is logged and swallowed.
async fn release_quietly(state: &AppState, ticket_id: Uuid) {
    if let Err(err) = state.repository.release_reservation(ticket_id).await {
        tracing::error!(ticket_id = %ticket_id, error = %err, "Failed to release reservation");
    }
}

//! Read endpoints for transactions and payouts.

use axum::{
    Json,
    extract::{Path, State},
};
use service_core::auth::AuthUser;
use service_core::error::AppError;
use uuid::Uuid;

use crate::AppState;
use crate::handlers::caller_id;
use crate::handlers::payments::TransactionResponse;
use crate::models::{Notification, Payout};

/// Fetch a transaction. Visible only to its buyer or seller.
pub async fn get_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let user_id = caller_id(&auth)?;

    let transaction = state
        .repository
        .get_transaction(transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    if transaction.buyer_id != user_id && transaction.seller_id != user_id {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Transaction belongs to another user"
        )));
    }

    Ok(Json(transaction.into()))
}

/// Payouts owed to the authenticated seller.
pub async fn list_payouts(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Payout>>, AppError> {
    let seller_id = caller_id(&auth)?;
    let payouts = state.repository.list_payouts_for_seller(seller_id).await?;
    Ok(Json(payouts))
}

/// Notifications recorded for the authenticated user.
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Notification>>, AppError> {
    let user_id = caller_id(&auth)?;
    let notifications = state
        .repository
        .list_notifications_for_user(user_id)
        .await?;
    Ok(Json(notifications))
}

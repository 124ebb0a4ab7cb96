//! Ticket listing handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::auth::AuthUser;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::handlers::caller_id;
use crate::models::{CreateTicket, Ticket, TicketStatus, VerificationStatus};
use crate::services::registry::{VerificationError, normalize_pnr};
use crate::services::repository::{SyncOutcome, TicketFilter};

const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 50;

/// Request to list a ticket for resale.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    /// Booking reference; normalized to uppercase alphanumeric on intake.
    #[validate(length(min = 6, max = 20))]
    pub pnr: String,
    #[validate(length(min = 1, max = 120))]
    pub passenger_name: String,
    #[validate(length(min = 1, max = 120))]
    pub operator: String,
    #[validate(length(min = 1, max = 120))]
    pub source_location: String,
    #[validate(length(min = 1, max = 120))]
    pub destination_location: String,
    pub departure_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub departure_time: String,
    #[validate(length(min = 1, max = 16))]
    pub seat_number: String,
    pub face_price: Decimal,
    pub selling_price: Decimal,
}

/// Public view of a listing. Reservation bookkeeping stays internal.
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub ticket_id: Uuid,
    pub pnr: String,
    pub passenger_name: String,
    pub operator: String,
    pub source_location: String,
    pub destination_location: String,
    pub departure_date: NaiveDate,
    pub departure_time: String,
    pub seat_number: String,
    pub face_price: Decimal,
    pub selling_price: Decimal,
    pub status: TicketStatus,
    pub verification_status: VerificationStatus,
    pub seller_id: Uuid,
    pub buyer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Ticket> for TicketResponse {
    fn from(t: Ticket) -> Self {
        Self {
            ticket_id: t.ticket_id,
            pnr: t.pnr,
            passenger_name: t.passenger_name,
            operator: t.operator,
            source_location: t.source_location,
            destination_location: t.destination_location,
            departure_date: t.departure_date,
            departure_time: t.departure_time,
            seat_number: t.seat_number,
            face_price: t.face_price,
            selling_price: t.selling_price,
            status: t.status,
            verification_status: t.verification_status,
            seller_id: t.seller_id,
            buyer_id: t.buyer_id,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// Create a listing.
///
/// When the operator registry is configured the PNR is checked against it
/// and the listing stamped `verified` on a match; verification failures
/// and registry outages leave the listing `unverified` rather than
/// blocking the seller.
pub async fn create_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>), AppError> {
    auth.require_verified_email()?;
    payload.validate()?;

    let seller_id = caller_id(&auth)?;

    let pnr = normalize_pnr(&payload.pnr);
    if pnr.len() < 6 || pnr.len() > 15 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "PNR must normalize to 6-15 alphanumeric characters"
        )));
    }
    if payload.selling_price <= Decimal::ZERO || payload.face_price <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Prices must be positive"
        )));
    }

    let verification_status = if state.registry.is_configured() {
        match state
            .registry
            .verify(&pnr, Some(&payload.operator), &payload.passenger_name)
            .await
        {
            Ok(_) => VerificationStatus::Verified,
            Err(err @ (VerificationError::Upstream(_) | VerificationError::UpstreamStatus(_))) => {
                tracing::warn!(error = %err, "Registry unavailable, listing stays unverified");
                VerificationStatus::Unverified
            }
            Err(err) => {
                tracing::info!(error = %err, "PNR did not verify, listing stays unverified");
                VerificationStatus::Unverified
            }
        }
    } else {
        VerificationStatus::Unverified
    };

    let ticket = state
        .repository
        .create_ticket(&CreateTicket {
            pnr,
            passenger_name: payload.passenger_name,
            operator: payload.operator,
            source_location: payload.source_location,
            destination_location: payload.destination_location,
            departure_date: payload.departure_date,
            departure_time: payload.departure_time,
            seat_number: payload.seat_number,
            face_price: payload.face_price,
            selling_price: payload.selling_price,
            verification_status,
            seller_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ticket.into())))
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub operator: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Browse purchasable listings.
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Vec<TicketResponse>>, AppError> {
    let filter = TicketFilter {
        operator: query.operator,
        source: query.source,
        destination: query.destination,
        limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset: query.offset.unwrap_or(0).max(0),
    };

    let tickets = state.repository.list_open_tickets(&filter).await?;

    Ok(Json(tickets.into_iter().map(TicketResponse::from).collect()))
}

/// Fetch a single listing.
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<TicketResponse>, AppError> {
    let ticket = state
        .repository
        .get_ticket(ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Ticket not found")))?;

    Ok(Json(ticket.into()))
}

/// Seller cancels an available listing.
pub async fn cancel_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<TicketResponse>, AppError> {
    let seller_id = caller_id(&auth)?;
    let ticket = state.repository.cancel_ticket(ticket_id, seller_id).await?;
    Ok(Json(ticket.into()))
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub registry_records: usize,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Reconcile local listings against the operator registry.
///
/// Available listings whose PNR the registry no longer reports are taken
/// off the market; reserved and sold tickets are never touched.
pub async fn sync_registry(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<SyncResponse>, AppError> {
    auth.require_verified_email()?;

    if !state.registry.is_configured() {
        return Err(AppError::BadGateway(
            "Operator registry is not configured".to_string(),
        ));
    }

    let records = state.registry.fetch_records().await.map_err(AppError::from)?;
    let live_pnrs: Vec<String> = records.iter().map(|r| normalize_pnr(&r.pnr_number)).collect();

    let outcome = state.repository.sync_against_registry(&live_pnrs).await?;

    Ok(Json(SyncResponse {
        registry_records: records.len(),
        outcome,
    }))
}

//! PNR verification endpoint.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::auth::AuthUser;
use service_core::error::AppError;

use crate::AppState;
use crate::services::metrics::PNR_VERIFICATIONS_TOTAL;
use crate::services::registry::VerificationError;

#[derive(Debug, Deserialize)]
pub struct VerifyPnrRequest {
    pub pnr: String,
    /// Advisory; the registry record's operator is authoritative.
    pub operator: Option<String>,
    pub passenger_name: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPnrResponse {
    pub valid: bool,
    pub pnr: String,
    pub operator: String,
    pub source_location: String,
    pub destination_location: String,
    pub departure_date: String,
    pub departure_time: String,
    pub seat_number: String,
    pub ticket_price: Decimal,
    pub confidence: u8,
    pub provider: String,
}

/// Verify a PNR and passenger name against the operator registry.
pub async fn verify_pnr(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(payload): Json<VerifyPnrRequest>,
) -> Result<Json<VerifyPnrResponse>, AppError> {
    if !state.registry.is_configured() {
        return Err(AppError::BadGateway(
            "Operator registry is not configured".to_string(),
        ));
    }

    let result = state
        .registry
        .verify(
            &payload.pnr,
            payload.operator.as_deref(),
            &payload.passenger_name,
        )
        .await;

    let outcome = match &result {
        Ok(_) => "verified",
        Err(VerificationError::InvalidFormat) => "invalid_format",
        Err(VerificationError::NotFound) => "not_found",
        Err(VerificationError::NameMismatch) => "name_mismatch",
        Err(VerificationError::Upstream(_)) | Err(VerificationError::UpstreamStatus(_)) => {
            "registry_error"
        }
    };
    PNR_VERIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();

    let verified = result?;

    Ok(Json(VerifyPnrResponse {
        valid: true,
        pnr: verified.pnr,
        operator: verified.operator,
        source_location: verified.source_location,
        destination_location: verified.destination_location,
        departure_date: verified.departure_date,
        departure_time: verified.departure_time,
        seat_number: verified.seat_number,
        ticket_price: verified.ticket_price,
        confidence: verified.confidence,
        provider: verified.provider,
    }))
}

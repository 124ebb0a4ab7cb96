//! Operator registry client for PNR verification.
//!
//! The registry is a hosted table of live bookings keyed by PNR. It has no
//! server-side filtering, so verification fetches the full record set and
//! scans for the normalized PNR, then checks the passenger name against the
//! booking's passenger of record.

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::time::Duration;
use thiserror::Error;

use crate::config::RegistryConfig;

const API_KEY_HEADER: &str = "x-api-key";

/// Outcome of a failed verification. Upstream failures keep their source
/// so callers can distinguish "no such booking" from "registry unreachable".
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("PNR must normalize to 6-15 alphanumeric characters")]
    InvalidFormat,

    #[error("No booking found for the supplied PNR")]
    NotFound,

    #[error("Passenger name does not match the booking")]
    NameMismatch,

    #[error("Operator registry request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Operator registry returned status {0}")]
    UpstreamStatus(StatusCode),
}

impl From<VerificationError> for AppError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::InvalidFormat | VerificationError::NameMismatch => {
                AppError::Unprocessable(anyhow::anyhow!(err.to_string()))
            }
            VerificationError::NotFound => AppError::NotFound(anyhow::anyhow!(err.to_string())),
            VerificationError::Upstream(_) | VerificationError::UpstreamStatus(_) => {
                AppError::BadGateway(err.to_string())
            }
        }
    }
}

/// A booking as the registry reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryRecord {
    pub pnr_number: String,
    pub passenger_name: String,
    pub bus_operator: String,
    pub source_location: String,
    pub destination_location: String,
    pub departure_date: String,
    pub departure_time: String,
    pub seat_number: String,
    pub ticket_price: Decimal,
}

/// A verified booking, ready to back a listing.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedPnr {
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

#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    config: RegistryConfig,
}

/// Normalize a PNR: uppercase, alphanumerics only. Idempotent.
pub fn normalize_pnr(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Case-insensitive, whitespace-trimmed passenger-name match. Equality or
/// containment in either direction counts: booking sites routinely store
/// "DOE/JOHN MR" style names.
pub fn names_match(supplied: &str, on_record: &str) -> bool {
    let supplied = supplied.trim().to_lowercase();
    let on_record = on_record.trim().to_lowercase();

    if supplied.is_empty() || on_record.is_empty() {
        return false;
    }

    supplied == on_record || supplied.contains(&on_record) || on_record.contains(&supplied)
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Check if the registry is configured (base URL is set).
    pub fn is_configured(&self) -> bool {
        !self.config.base_url.is_empty()
    }

    /// Fetch the full booking record set.
    ///
    /// No retry on failure; the client-side timeout is the only guard
    /// against a hung registry.
    pub async fn fetch_records(&self) -> Result<Vec<RegistryRecord>, VerificationError> {
        let url = format!("{}/records", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Operator registry returned an error");
            return Err(VerificationError::UpstreamStatus(status));
        }

        let records = response.json::<Vec<RegistryRecord>>().await?;
        Ok(records)
    }

    /// Verify a PNR and passenger name against the registry.
    ///
    /// `operator_hint` is advisory: the registry record's own operator is
    /// authoritative and a mismatch is only logged.
    pub async fn verify(
        &self,
        pnr: &str,
        operator_hint: Option<&str>,
        passenger_name: &str,
    ) -> Result<VerifiedPnr, VerificationError> {
        let normalized = normalize_pnr(pnr);
        if normalized.len() < 6 || normalized.len() > 15 {
            return Err(VerificationError::InvalidFormat);
        }

        let records = self.fetch_records().await?;

        let record = records
            .iter()
            .find(|r| normalize_pnr(&r.pnr_number) == normalized)
            .ok_or(VerificationError::NotFound)?;

        if let Some(hint) = operator_hint {
            if !hint.trim().is_empty()
                && !record.bus_operator.eq_ignore_ascii_case(hint.trim())
            {
                tracing::debug!(
                    hint = %hint,
                    operator = %record.bus_operator,
                    "Operator hint differs from registry record"
                );
            }
        }

        if !names_match(passenger_name, &record.passenger_name) {
            return Err(VerificationError::NameMismatch);
        }

        tracing::info!(pnr = %normalized, operator = %record.bus_operator, "PNR verified");

        Ok(VerifiedPnr {
            pnr: normalized,
            operator: record.bus_operator.clone(),
            source_location: record.source_location.clone(),
            destination_location: record.destination_location.clone(),
            departure_date: record.departure_date.clone(),
            departure_time: record.departure_time.clone(),
            seat_number: record.seat_number.clone(),
            ticket_price: record.ticket_price,
            confidence: 100,
            provider: self.config.provider.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_uppercases_and_strips() {
        assert_eq!(normalize_pnr("ab-12 34x"), "AB1234X");
        assert_eq!(normalize_pnr("  tx99/21a "), "TX9921A");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["ab-12 34x", "TX9921A", "q1w2e3r4t5y6"] {
            let once = normalize_pnr(raw);
            assert_eq!(normalize_pnr(&once), once);
        }
    }

    #[test]
    fn name_match_is_case_insensitive_and_trimmed() {
        assert!(names_match(" john doe ", "John Doe"));
        assert!(names_match("JOHN DOE", "john doe"));
    }

    #[test]
    fn name_match_allows_containment_both_ways() {
        assert!(names_match("John", "John Doe"));
        assert!(names_match("John Doe Jr", "john doe"));
    }

    #[test]
    fn name_match_rejects_disjoint_names() {
        assert!(!names_match("Jane Roe", "John Doe"));
        assert!(!names_match("", "John Doe"));
    }
}

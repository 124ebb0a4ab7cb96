//! Ticket listing model and lifecycle states.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a listed ticket.
///
/// `reserved` is a short-lived hold taken at order creation so that two
/// buyers cannot both pass the availability check; a hold past its
/// `reserved_until` is treated as available again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Available,
    Reserved,
    Sold,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Sold => "sold",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the listing's PNR was matched against the operator registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Unverified,
}

/// A listed ticket.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ticket {
    pub ticket_id: Uuid,
    /// Normalized PNR: uppercase alphanumeric, 6 to 15 characters.
    pub pnr: String,
    /// Passenger of record. Preserved across a sale; the buyer's display
    /// name lives on the transaction instead.
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
    pub reserved_by: Option<Uuid>,
    pub reserved_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a listing.
#[derive(Debug, Clone)]
pub struct CreateTicket {
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
    pub verification_status: VerificationStatus,
    pub seller_id: Uuid,
}

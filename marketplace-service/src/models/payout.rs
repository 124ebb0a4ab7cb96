use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Paid,
    Cancelled,
}

/// Money owed to a seller for a completed sale. Rows start `pending`;
/// actual disbursement happens out of band.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payout {
    pub payout_id: Uuid,
    pub transaction_id: Uuid,
    pub seller_id: Uuid,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
}

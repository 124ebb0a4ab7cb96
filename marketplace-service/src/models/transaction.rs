use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Created,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One checkout attempt against a ticket. Created at order time with
/// status `created`; the unique `razorpay_order_id` makes verification and
/// webhook reconciliation idempotent.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub ticket_id: Uuid,
    pub buyer_id: Uuid,
    /// Buyer display name as supplied at checkout.
    pub buyer_name: String,
    pub seller_id: Uuid,
    /// Gross amount, equal to the ticket's selling price.
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub seller_amount: Decimal,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for recording a new checkout attempt.
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub ticket_id: Uuid,
    pub buyer_id: Uuid,
    pub buyer_name: String,
    pub seller_id: Uuid,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub seller_amount: Decimal,
    pub razorpay_order_id: String,
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Bookkeeping row recorded when webhook reconciliation changes the state
/// of a purchase. Delivery channels are out of scope here.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

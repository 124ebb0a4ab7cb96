//! All SQL for the marketplace.
//!
//! The checkout path is written around two guarantees the ticket lifecycle
//! needs: a buyer can only hold one live reservation per ticket (the
//! conditional reservation UPDATE), and finalization is atomic and
//! idempotent (row locks plus a single transaction around the
//! transaction/ticket/payout writes).

use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    CreateTicket, CreateTransaction, Notification, Payout, Ticket, TicketStatus, Transaction,
    TransactionStatus,
};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;

const TICKET_COLUMNS: &str = "ticket_id, pnr, passenger_name, operator, source_location, \
     destination_location, departure_date, departure_time, seat_number, face_price, \
     selling_price, status, verification_status, seller_id, buyer_id, reserved_by, \
     reserved_until, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, ticket_id, buyer_id, buyer_name, seller_id, \
     amount, platform_fee, seller_amount, razorpay_order_id, razorpay_payment_id, status, \
     created_at, completed_at";

/// Filters for listing browsing.
#[derive(Debug, Default, Clone)]
pub struct TicketFilter {
    pub operator: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Result of finalizing a checkout by gateway order id.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// This call performed the state transition.
    Finalized {
        transaction: Transaction,
        ticket: Ticket,
    },
    /// A previous call (client verify or webhook) already completed the
    /// checkout; the stored rows are replayed unchanged.
    AlreadyCompleted {
        transaction: Transaction,
        ticket: Ticket,
    },
}

/// Counts from a registry reconciliation pass.
#[derive(Debug, serde::Serialize)]
pub struct SyncOutcome {
    /// Available listings deleted because the registry no longer knows
    /// their PNR.
    pub deleted: u64,
    /// Listings with checkout history that were cancelled instead of
    /// deleted.
    pub cancelled: u64,
}

#[derive(Clone)]
pub struct MarketplaceRepository {
    pool: PgPool,
}

impl MarketplaceRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Tickets
    // -------------------------------------------------------------------------

    /// Create a new listing.
    #[instrument(skip(self, input), fields(pnr = %input.pnr, seller_id = %input.seller_id))]
    pub async fn create_ticket(&self, input: &CreateTicket) -> Result<Ticket, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_ticket"])
            .start_timer();

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            INSERT INTO tickets (ticket_id, pnr, passenger_name, operator, source_location,
                destination_location, departure_date, departure_time, seat_number, face_price,
                selling_price, status, verification_status, seller_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'available', $12, $13)
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.pnr)
        .bind(&input.passenger_name)
        .bind(&input.operator)
        .bind(&input.source_location)
        .bind(&input.destination_location)
        .bind(input.departure_date)
        .bind(&input.departure_time)
        .bind(&input.seat_number)
        .bind(input.face_price)
        .bind(input.selling_price)
        .bind(input.verification_status)
        .bind(input.seller_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create ticket: {}", e)))?;

        timer.observe_duration();

        info!(ticket_id = %ticket.ticket_id, "Listing created");

        Ok(ticket)
    }

    /// List tickets currently purchasable: `available`, or `reserved` with
    /// a lapsed hold.
    #[instrument(skip(self, filter))]
    pub async fn list_open_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_open_tickets"])
            .start_timer();

        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            SELECT {TICKET_COLUMNS}
            FROM tickets
            WHERE (status = 'available'
                   OR (status = 'reserved' AND reserved_until < now()))
              AND ($1::text IS NULL OR operator ILIKE $1)
              AND ($2::text IS NULL OR source_location ILIKE $2)
              AND ($3::text IS NULL OR destination_location ILIKE $3)
            ORDER BY departure_date, created_at
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(&filter.operator)
        .bind(&filter.source)
        .bind(&filter.destination)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list tickets: {}", e)))?;

        timer.observe_duration();

        Ok(tickets)
    }

    /// Get a ticket by id.
    pub async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_id = $1"
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get ticket: {}", e)))?;

        Ok(ticket)
    }

    /// Cancel an available listing on behalf of its seller.
    #[instrument(skip(self), fields(ticket_id = %ticket_id, seller_id = %seller_id))]
    pub async fn cancel_ticket(
        &self,
        ticket_id: Uuid,
        seller_id: Uuid,
    ) -> Result<Ticket, AppError> {
        let ticket = self
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Ticket not found")))?;

        if ticket.seller_id != seller_id {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Only the seller can cancel a listing"
            )));
        }

        let cancelled = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            UPDATE tickets
            SET status = 'cancelled', updated_at = now()
            WHERE ticket_id = $1 AND status = 'available'
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel ticket: {}", e)))?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Only available listings can be cancelled (current status: {})",
                ticket.status
            ))
        })?;

        info!(ticket_id = %ticket_id, "Listing cancelled");

        Ok(cancelled)
    }

    /// Take a reservation hold on a ticket for a prospective buyer.
    ///
    /// Succeeds when the ticket is available, when its previous hold has
    /// lapsed, or when the same buyer re-reserves (retried checkout).
    /// Returns `None` when another buyer holds a live reservation or the
    /// ticket is no longer on the market.
    #[instrument(skip(self), fields(ticket_id = %ticket_id, buyer_id = %buyer_id))]
    pub async fn reserve_ticket(
        &self,
        ticket_id: Uuid,
        buyer_id: Uuid,
        reserved_until: DateTime<Utc>,
    ) -> Result<Option<Ticket>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reserve_ticket"])
            .start_timer();

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            UPDATE tickets
            SET status = 'reserved', reserved_by = $2, reserved_until = $3, updated_at = now()
            WHERE ticket_id = $1
              AND (status = 'available'
                   OR (status = 'reserved' AND (reserved_until < now() OR reserved_by = $2)))
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(ticket_id)
        .bind(buyer_id)
        .bind(reserved_until)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to reserve ticket: {}", e))
        })?;

        timer.observe_duration();

        if ticket.is_some() {
            info!(ticket_id = %ticket_id, "Ticket reserved");
        }

        Ok(ticket)
    }

    /// Release a reservation hold, returning the ticket to the market.
    /// No-op when the ticket is not currently reserved.
    pub async fn release_reservation(&self, ticket_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'available', reserved_by = NULL, reserved_until = NULL,
                updated_at = now()
            WHERE ticket_id = $1 AND status = 'reserved'
            "#,
        )
        .bind(ticket_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to release reservation: {}", e))
        })?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Transactions & checkout
    // -------------------------------------------------------------------------

    /// Record a new checkout attempt (status `created`).
    #[instrument(skip(self, input), fields(ticket_id = %input.ticket_id, order_id = %input.razorpay_order_id))]
    pub async fn create_transaction(
        &self,
        input: &CreateTransaction,
    ) -> Result<Transaction, AppError> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO transactions (transaction_id, ticket_id, buyer_id, buyer_name,
                seller_id, amount, platform_fee, seller_amount, razorpay_order_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'created')
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.ticket_id)
        .bind(input.buyer_id)
        .bind(&input.buyer_name)
        .bind(input.seller_id)
        .bind(input.amount)
        .bind(input.platform_fee)
        .bind(input.seller_amount)
        .bind(&input.razorpay_order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A transaction already exists for order '{}'",
                    input.razorpay_order_id
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create transaction: {}", e)),
        })?;

        Ok(transaction)
    }

    /// Get a transaction by id.
    pub async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, AppError> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get transaction: {}", e))
        })?;

        Ok(transaction)
    }

    /// Finalize a checkout: transaction `created -> completed`, ticket
    /// `reserved -> sold`, payout inserted, all in one database
    /// transaction keyed by the gateway order id.
    ///
    /// Safe to call from both the client verify path and the webhook: the
    /// `FOR UPDATE` lock serializes racing callers and an
    /// already-completed checkout replays idempotently.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn finalize_checkout(
        &self,
        order_id: &str,
        payment_id: &str,
        expected_ticket: Option<Uuid>,
        expected_buyer: Option<Uuid>,
    ) -> Result<CheckoutOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["finalize_checkout"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE razorpay_order_id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load transaction: {}", e))
        })?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("No transaction found for order '{}'", order_id))
        })?;

        if let Some(ticket_id) = expected_ticket {
            if transaction.ticket_id != ticket_id {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Order does not belong to the supplied ticket"
                )));
            }
        }
        if let Some(buyer_id) = expected_buyer {
            if transaction.buyer_id != buyer_id {
                return Err(AppError::Forbidden(anyhow::anyhow!(
                    "Transaction belongs to a different buyer"
                )));
            }
        }

        match transaction.status {
            TransactionStatus::Completed => {
                let ticket = self
                    .load_ticket_in_tx(&mut tx, transaction.ticket_id)
                    .await?;
                tx.commit().await.map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e))
                })?;
                timer.observe_duration();
                return Ok(CheckoutOutcome::AlreadyCompleted {
                    transaction,
                    ticket,
                });
            }
            TransactionStatus::Failed | TransactionStatus::Refunded => {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Checkout for order '{}' is already closed ({})",
                    order_id,
                    transaction.status
                )));
            }
            TransactionStatus::Created => {}
        }

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_id = $1 FOR UPDATE"
        ))
        .bind(transaction.ticket_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load ticket: {}", e)))?;

        // The hold must still belong to this buyer. A lapsed hold that was
        // re-reserved by someone else means the sale is lost.
        if ticket.status != TicketStatus::Reserved
            || ticket.reserved_by != Some(transaction.buyer_id)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Ticket reservation was lost before the payment completed"
            )));
        }

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions
            SET status = 'completed', razorpay_payment_id = $2, completed_at = now()
            WHERE transaction_id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction.transaction_id)
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to complete transaction: {}", e))
        })?;

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            UPDATE tickets
            SET status = 'sold', buyer_id = $2, reserved_by = NULL, reserved_until = NULL,
                updated_at = now()
            WHERE ticket_id = $1
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(ticket.ticket_id)
        .bind(transaction.buyer_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark ticket sold: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO payouts (payout_id, transaction_id, seller_id, amount, status)
            VALUES ($1, $2, $3, $4, 'pending')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(transaction.transaction_id)
        .bind(transaction.seller_id)
        .bind(transaction.seller_amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create payout: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(
            transaction_id = %transaction.transaction_id,
            ticket_id = %ticket.ticket_id,
            "Checkout finalized"
        );

        Ok(CheckoutOutcome::Finalized {
            transaction,
            ticket,
        })
    }

    /// Mark a checkout failed and put the ticket back on the market.
    /// Returns the transaction, or `None` when the order id is unknown.
    /// A checkout that already completed is left untouched.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_payment_failed(
        &self,
        order_id: &str,
    ) -> Result<Option<Transaction>, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let Some(transaction) = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE razorpay_order_id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load transaction: {}", e))
        })?
        else {
            return Ok(None);
        };

        if transaction.status != TransactionStatus::Created {
            return Ok(Some(transaction));
        }

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions
            SET status = 'failed'
            WHERE transaction_id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction.transaction_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fail transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'available', reserved_by = NULL, reserved_until = NULL,
                updated_at = now()
            WHERE ticket_id = $1 AND status = 'reserved'
            "#,
        )
        .bind(transaction.ticket_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to release reservation: {}", e))
        })?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e)))?;

        info!(order_id = %order_id, "Checkout marked failed");

        Ok(Some(transaction))
    }

    /// Process a refund: transaction `completed -> refunded`, payout
    /// cancelled, ticket relisted. Keyed by the gateway payment id.
    /// Returns `None` when the payment id is unknown.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn mark_refund_processed(
        &self,
        payment_id: &str,
    ) -> Result<Option<Transaction>, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let Some(transaction) = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE razorpay_payment_id = $1 FOR UPDATE"
        ))
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load transaction: {}", e))
        })?
        else {
            return Ok(None);
        };

        if transaction.status != TransactionStatus::Completed {
            return Ok(Some(transaction));
        }

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions
            SET status = 'refunded'
            WHERE transaction_id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction.transaction_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to refund transaction: {}", e))
        })?;

        sqlx::query("UPDATE payouts SET status = 'cancelled' WHERE transaction_id = $1 AND status = 'pending'")
            .bind(transaction.transaction_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to cancel payout: {}", e))
            })?;

        sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'available', buyer_id = NULL, reserved_by = NULL,
                reserved_until = NULL, updated_at = now()
            WHERE ticket_id = $1 AND status = 'sold'
            "#,
        )
        .bind(transaction.ticket_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to relist ticket: {}", e))
        })?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e)))?;

        info!(payment_id = %payment_id, "Refund processed");

        Ok(Some(transaction))
    }

    // -------------------------------------------------------------------------
    // Payouts & notifications
    // -------------------------------------------------------------------------

    /// Payouts owed to a seller, newest first.
    pub async fn list_payouts_for_seller(&self, seller_id: Uuid) -> Result<Vec<Payout>, AppError> {
        let payouts = sqlx::query_as::<_, Payout>(
            r#"
            SELECT payout_id, transaction_id, seller_id, amount, status, payment_method,
                   created_at
            FROM payouts
            WHERE seller_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payouts: {}", e)))?;

        Ok(payouts)
    }

    /// Notifications for a user, newest first.
    pub async fn list_notifications_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT notification_id, user_id, kind, body, is_read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list notifications: {}", e))
        })?;

        Ok(notifications)
    }

    /// Record a notification row for a user.
    pub async fn insert_notification(
        &self,
        user_id: Uuid,
        kind: &str,
        body: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO notifications (notification_id, user_id, kind, body) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert notification: {}", e))
        })?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Registry reconciliation
    // -------------------------------------------------------------------------

    /// Reconcile available listings against the registry's live PNR set.
    ///
    /// Listings the registry no longer knows are deleted when they have no
    /// checkout history, and cancelled otherwise (transactions keep their
    /// foreign key).
    #[instrument(skip(self, live_pnrs), fields(registry_records = live_pnrs.len()))]
    pub async fn sync_against_registry(
        &self,
        live_pnrs: &[String],
    ) -> Result<SyncOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM tickets
            WHERE status = 'available'
              AND NOT (pnr = ANY($1))
              AND NOT EXISTS (
                  SELECT 1 FROM transactions t WHERE t.ticket_id = tickets.ticket_id
              )
            "#,
        )
        .bind(live_pnrs)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete stale tickets: {}", e))
        })?
        .rows_affected();

        let cancelled = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'cancelled', updated_at = now()
            WHERE status = 'available' AND NOT (pnr = ANY($1))
            "#,
        )
        .bind(live_pnrs)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to cancel stale tickets: {}", e))
        })?
        .rows_affected();

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e)))?;

        info!(deleted = deleted, cancelled = cancelled, "Registry reconciliation complete");

        Ok(SyncOutcome { deleted, cancelled })
    }

    async fn load_ticket_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_id: Uuid,
    ) -> Result<Ticket, AppError> {
        sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_id = $1"
        ))
        .bind(ticket_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load ticket: {}", e)))
    }
}

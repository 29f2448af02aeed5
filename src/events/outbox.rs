//! Durable outbox for cross-aggregate follow-ups.
//!
//! A workflow that must update other aggregates writes an outbox row in the
//! same transaction as its own change. After commit the service tries to
//! deliver the row right away; the background worker picks up anything left
//! behind and retries with exponential backoff.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::Duration};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    commands::{orders::ApplyProcurementCascadeCommand, Command},
    db::DbPool,
    entities::outbox_event::{self, Entity as OutboxEvent},
    errors::ServiceError,
    events::EventSender,
    metrics::OUTBOX_DELIVERIES,
    models::OrderStatus,
};

const BASE_BACKOFF_SECS: u64 = 2;
const STALE_CLAIM_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
}

/// Orders touched by a purchase request milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementCascade {
    pub purchase_request_id: Uuid,
    pub order_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxMessage {
    PurchaseRequestAwaitingDispatch(ProcurementCascade),
    PurchaseRequestIntrasite(ProcurementCascade),
}

impl OutboxMessage {
    pub fn event_type(&self) -> &'static str {
        match self {
            OutboxMessage::PurchaseRequestAwaitingDispatch(_) => "PurchaseRequestAwaitingDispatch",
            OutboxMessage::PurchaseRequestIntrasite(_) => "PurchaseRequestIntrasite",
        }
    }

    pub fn cascade(&self) -> &ProcurementCascade {
        match self {
            OutboxMessage::PurchaseRequestAwaitingDispatch(c)
            | OutboxMessage::PurchaseRequestIntrasite(c) => c,
        }
    }

    /// Status the linked orders are moved to.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            OutboxMessage::PurchaseRequestAwaitingDispatch(_) => OrderStatus::AwaitingDispatch,
            OutboxMessage::PurchaseRequestIntrasite(_) => OrderStatus::Intrasite,
        }
    }

    pub fn decode(event_type: &str, payload: &str) -> Result<Self, ServiceError> {
        let cascade: ProcurementCascade = serde_json::from_str(payload)?;
        match event_type {
            "PurchaseRequestAwaitingDispatch" => {
                Ok(OutboxMessage::PurchaseRequestAwaitingDispatch(cascade))
            }
            "PurchaseRequestIntrasite" => Ok(OutboxMessage::PurchaseRequestIntrasite(cascade)),
            other => Err(ServiceError::SerializationError(format!(
                "unknown outbox event type '{}'",
                other
            ))),
        }
    }
}

/// Writes a message into the outbox. Call with the transaction that makes
/// the change the message describes.
pub async fn enqueue<C>(conn: &C, message: &OutboxMessage) -> Result<Uuid, ServiceError>
where
    C: ConnectionTrait,
{
    let id = Uuid::new_v4();
    let now = Utc::now();
    let cascade = message.cascade();

    let row = outbox_event::ActiveModel {
        id: Set(id),
        aggregate_type: Set("purchase_request".to_string()),
        aggregate_id: Set(Some(cascade.purchase_request_id)),
        event_type: Set(message.event_type().to_string()),
        payload: Set(serde_json::to_string(cascade)?),
        status: Set(OutboxStatus::Pending.to_string()),
        attempts: Set(0),
        available_at: Set(now),
        processed_at: Set(None),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(None),
    };
    OutboxEvent::insert(row).exec_without_returning(conn).await?;

    debug!(outbox_id = %id, event_type = message.event_type(), "enqueued outbox event");
    Ok(id)
}

/// Delay before the next attempt: `2^attempts` seconds plus sub-second jitter.
pub fn backoff_delay(attempts: i32, jitter_ms: u64) -> chrono::Duration {
    let secs = BASE_BACKOFF_SECS.saturating_pow(attempts.max(0) as u32).min(3600);
    chrono::Duration::seconds(secs as i64) + chrono::Duration::milliseconds((jitter_ms % 1000) as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Handler failed; the row is pending again with a later `available_at`
    Retrying,
    Failed,
    /// Another worker holds the row or it is no longer pending
    Skipped,
}

pub struct OutboxProcessor {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    max_attempts: i32,
    batch_size: u64,
}

impl OutboxProcessor {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        max_attempts: i32,
        batch_size: u64,
    ) -> Self {
        Self {
            db,
            event_sender,
            max_attempts: max_attempts.max(1),
            batch_size: batch_size.max(1),
        }
    }

    /// Claims one row and runs its handler.
    #[instrument(skip(self), fields(outbox_id = %id))]
    pub async fn deliver(&self, id: Uuid) -> Result<DeliveryOutcome, ServiceError> {
        let db = self.db.as_ref();
        let now = Utc::now();

        let claimed = OutboxEvent::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Processing.to_string()),
            )
            .col_expr(
                outbox_event::Column::Attempts,
                Expr::col(outbox_event::Column::Attempts).add(1),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(now))
            .filter(outbox_event::Column::Id.eq(id))
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Pending.to_string()))
            .exec(db)
            .await?;
        if claimed.rows_affected == 0 {
            return Ok(DeliveryOutcome::Skipped);
        }

        let row = OutboxEvent::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("outbox event {} not found", id)))?;

        let message = match OutboxMessage::decode(&row.event_type, &row.payload) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, event_type = %row.event_type, "undecodable outbox event");
                self.mark_failed(id, &e.to_string()).await?;
                return Ok(DeliveryOutcome::Failed);
            }
        };

        match self.handle(&message).await {
            Ok(()) => {
                self.mark_delivered(id).await?;
                OUTBOX_DELIVERIES.with_label_values(&["delivered"]).inc();
                Ok(DeliveryOutcome::Delivered)
            }
            Err(e) => {
                warn!(error = %e, attempts = row.attempts, "outbox handler failed");
                self.schedule_retry(id, row.attempts, &e.to_string()).await
            }
        }
    }

    async fn handle(&self, message: &OutboxMessage) -> Result<(), ServiceError> {
        let cascade = message.cascade();
        let command = ApplyProcurementCascadeCommand {
            purchase_request_id: cascade.purchase_request_id,
            target_status: message.target_status(),
            order_ids: cascade.order_ids.clone(),
        };
        command
            .execute(self.db.clone(), self.event_sender.clone())
            .await
            .map(|_| ())
    }

    async fn mark_delivered(&self, id: Uuid) -> Result<(), ServiceError> {
        let now = Utc::now();
        OutboxEvent::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Delivered.to_string()),
            )
            .col_expr(outbox_event::Column::ProcessedAt, Expr::value(now))
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                outbox_event::Column::ErrorMessage,
                Expr::value(Option::<String>::None),
            )
            .filter(outbox_event::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<(), ServiceError> {
        OutboxEvent::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Failed.to_string()),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(Utc::now()))
            .col_expr(
                outbox_event::Column::ErrorMessage,
                Expr::value(Some(reason.to_string())),
            )
            .filter(outbox_event::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        OUTBOX_DELIVERIES.with_label_values(&["failed"]).inc();
        Ok(())
    }

    async fn schedule_retry(
        &self,
        id: Uuid,
        attempts: i32,
        reason: &str,
    ) -> Result<DeliveryOutcome, ServiceError> {
        if attempts >= self.max_attempts {
            error!(outbox_id = %id, attempts, "outbox event exhausted its attempts");
            self.mark_failed(id, &format!("max attempts exceeded: {}", reason))
                .await?;
            return Ok(DeliveryOutcome::Failed);
        }

        let now = Utc::now();
        let jitter_ms = now.timestamp_subsec_millis() as u64;
        let available_at: DateTime<Utc> = now + backoff_delay(attempts, jitter_ms);

        OutboxEvent::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Pending.to_string()),
            )
            .col_expr(outbox_event::Column::AvailableAt, Expr::value(available_at))
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                outbox_event::Column::ErrorMessage,
                Expr::value(Some(reason.to_string())),
            )
            .filter(outbox_event::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        OUTBOX_DELIVERIES.with_label_values(&["retrying"]).inc();
        Ok(DeliveryOutcome::Retrying)
    }

    /// Returns rows left in `processing` by a crashed worker to `pending`.
    pub async fn requeue_stale(&self) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(STALE_CLAIM_SECS);
        let result = OutboxEvent::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Pending.to_string()),
            )
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Processing.to_string()))
            .filter(outbox_event::Column::UpdatedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected > 0 {
            warn!(rows = result.rows_affected, "requeued stale outbox claims");
        }
        Ok(result.rows_affected)
    }

    /// Delivers one batch of due rows, oldest first. Returns how many were delivered.
    pub async fn drain_once(&self) -> Result<usize, ServiceError> {
        let due: Vec<Uuid> = OutboxEvent::find()
            .select_only()
            .column(outbox_event::Column::Id)
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Pending.to_string()))
            .filter(outbox_event::Column::AvailableAt.lte(Utc::now()))
            .order_by_asc(outbox_event::Column::CreatedAt)
            .limit(self.batch_size)
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        let mut delivered = 0;
        for id in due {
            if self.deliver(id).await? == DeliveryOutcome::Delivered {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Background loop polling for due rows.
    pub fn start_worker(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!(interval_ms = interval.as_millis() as u64, "starting outbox worker");
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.requeue_stale().await {
                    error!("outbox requeue error: {}", e);
                }
                match self.drain_once().await {
                    Ok(0) => {}
                    Ok(n) => debug!(delivered = n, "outbox batch drained"),
                    Err(e) => error!("outbox worker error: {}", e),
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

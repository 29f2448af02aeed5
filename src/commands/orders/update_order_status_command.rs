use crate::{
    commands::{check_expected_version, orders::find_order, update_versioned, Command},
    db::DbPool,
    entities::order,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_command_failure,
    models::OrderStatus,
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Manual status change. Cancellation has its own command because it
/// rewrites quantities and money.
#[derive(Debug, Clone)]
pub struct UpdateOrderStatusCommand {
    pub order_id: Uuid,
    pub status: String,
    pub expected_version: Option<i32>,
}

#[async_trait::async_trait]
impl Command for UpdateOrderStatusCommand {
    type Result = order::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id, new_status = %self.status))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let target = OrderStatus::parse(&self.status)?;
        if target == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(
                "use the cancel endpoint to cancel an order".to_string(),
            ));
        }

        let order_id = self.order_id;
        let expected_version = self.expected_version;

        let (previous, updated) = db_pool
            .transaction::<_, (OrderStatus, order::Model), ServiceError>(|txn| {
                Box::pin(async move {
                    let current = find_order(txn, order_id).await?;
                    check_expected_version(order_id, current.version, expected_version)?;

                    if current.status.is_terminal() {
                        return Err(ServiceError::InvalidStatus(format!(
                            "order is {} and can no longer change status",
                            current.status
                        )));
                    }

                    let previous = current.status;
                    let version = current.version;
                    let mut active: order::ActiveModel = current.into();
                    active.status = Set(target);
                    active.version = Set(version + 1);
                    active.updated_at = Set(Some(Utc::now()));

                    let updated =
                        update_versioned(txn, order_id, active, order::Column::Version, version)
                            .await?;
                    Ok((previous, updated))
                })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("update_order_status", &e);
                warn!(error = %e, "order status update rejected");
                e
            })?;

        info!(from = %previous, to = %updated.status, "Order status updated");
        if previous != updated.status {
            event_sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    from: previous,
                    to: updated.status,
                })
                .await;
        }

        Ok(updated)
    }
}

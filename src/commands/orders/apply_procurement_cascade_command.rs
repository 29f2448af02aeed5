use crate::{
    commands::{update_versioned, Command},
    db::DbPool,
    entities::order,
    errors::ServiceError,
    events::{Event, EventSender},
    models::OrderStatus,
};
use chrono::Utc;
use sea_orm::{EntityTrait, Set};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const MAX_CAS_RETRIES: usize = 5;

/// Moves the orders behind a purchase request to `target_status`.
///
/// Safe to run any number of times: an order already at or past the target,
/// or in a closed state, is left alone.
#[derive(Debug, Clone)]
pub struct ApplyProcurementCascadeCommand {
    pub purchase_request_id: Uuid,
    pub target_status: OrderStatus,
    pub order_ids: Vec<Uuid>,
}

pub(crate) fn cascade_applies(current: OrderStatus, target: OrderStatus) -> bool {
    current.accepts_procurement_cascade()
        && current.fulfillment_rank() < target.fulfillment_rank()
}

#[async_trait::async_trait]
impl Command for ApplyProcurementCascadeCommand {
    /// Ids of the orders that actually changed
    type Result = Vec<Uuid>;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id, target = %self.target_status))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let db = db_pool.as_ref();
        let mut updated = Vec::new();

        for &order_id in &self.order_ids {
            let mut attempt = 0;
            loop {
                attempt += 1;
                let Some(current) = order::Entity::find_by_id(order_id).one(db).await? else {
                    warn!(order_id = %order_id, "order referenced by purchase request no longer exists");
                    break;
                };

                if !cascade_applies(current.status, self.target_status) {
                    debug!(order_id = %order_id, status = %current.status, "order left unchanged");
                    break;
                }

                let previous = current.status;
                let version = current.version;
                let mut active: order::ActiveModel = current.into();
                active.status = Set(self.target_status);
                active.version = Set(version + 1);
                active.updated_at = Set(Some(Utc::now()));

                match update_versioned(db, order_id, active, order::Column::Version, version).await
                {
                    Ok(_) => {
                        updated.push(order_id);
                        event_sender
                            .send_or_log(Event::OrderStatusChanged {
                                order_id,
                                from: previous,
                                to: self.target_status,
                            })
                            .await;
                        break;
                    }
                    Err(ServiceError::ConcurrentModification(_)) if attempt < MAX_CAS_RETRIES => {
                        debug!(order_id = %order_id, attempt, "order changed underneath cascade, reloading");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        info!(updated = updated.len(), total = self.order_ids.len(), "Procurement cascade applied");
        event_sender
            .send_or_log(Event::ProcurementCascadeApplied {
                purchase_request_id: self.purchase_request_id,
                target_status: self.target_status,
                updated_orders: updated.clone(),
                at: Utc::now(),
            })
            .await;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::AwaitingDispatch, true)]
    #[case(OrderStatus::PartiallyPending, OrderStatus::AwaitingDispatch, true)]
    #[case(OrderStatus::AwaitingDispatch, OrderStatus::AwaitingDispatch, false)]
    #[case(OrderStatus::PartiallyDispatched, OrderStatus::AwaitingDispatch, false)]
    #[case(OrderStatus::AwaitingDispatch, OrderStatus::Intrasite, true)]
    #[case(OrderStatus::Cancelled, OrderStatus::AwaitingDispatch, false)]
    #[case(OrderStatus::Delivered, OrderStatus::Intrasite, false)]
    #[case(OrderStatus::Completed, OrderStatus::Intrasite, false)]
    fn cascade_only_moves_orders_forward(
        #[case] current: OrderStatus,
        #[case] target: OrderStatus,
        #[case] expected: bool,
    ) {
        assert_eq!(cascade_applies(current, target), expected);
    }
}

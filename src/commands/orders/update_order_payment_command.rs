use crate::{
    commands::{check_expected_version, orders::find_order, update_versioned, Command},
    db::DbPool,
    entities::order,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_command_failure,
    models::{fulfillment::payment_status_for, OrderStatus},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Overwrites the amount received on an order and recomputes its balance.
#[derive(Debug, Clone)]
pub struct UpdateOrderPaymentCommand {
    pub order_id: Uuid,
    pub amount_paid: Decimal,
    pub expected_version: Option<i32>,
}

/// Applies a new `amount_paid` to a loaded order, keeping
/// `balance_amount = net_amount_payable - amount_paid`.
pub(crate) async fn apply_amount_paid<C>(
    conn: &C,
    current: order::Model,
    amount_paid: Decimal,
) -> Result<order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let order_id = current.id;
    let version = current.version;
    let balance = current.net_amount_payable - amount_paid;
    let payment_status = payment_status_for(current.net_amount_payable, amount_paid);

    let mut active: order::ActiveModel = current.into();
    active.amount_paid = Set(amount_paid);
    active.balance_amount = Set(balance);
    active.payment_status = Set(payment_status);
    active.version = Set(version + 1);
    active.updated_at = Set(Some(Utc::now()));

    update_versioned(conn, order_id, active, order::Column::Version, version).await
}

#[async_trait::async_trait]
impl Command for UpdateOrderPaymentCommand {
    type Result = order::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id, amount_paid = %self.amount_paid))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        if self.amount_paid < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "amount_paid cannot be negative".to_string(),
            ));
        }

        let order_id = self.order_id;
        let amount_paid = self.amount_paid;
        let expected_version = self.expected_version;

        let updated = db_pool
            .transaction::<_, order::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let current = find_order(txn, order_id).await?;
                    check_expected_version(order_id, current.version, expected_version)?;
                    if current.status == OrderStatus::Cancelled {
                        return Err(ServiceError::InvalidOperation(
                            "payments cannot be recorded on a cancelled order".to_string(),
                        ));
                    }
                    apply_amount_paid(txn, current, amount_paid).await
                })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("update_order_payment", &e);
                e
            })?;

        info!(
            balance_amount = %updated.balance_amount,
            payment_status = %updated.payment_status,
            "Order payment updated"
        );
        event_sender
            .send_or_log(Event::OrderPaymentUpdated {
                order_id,
                amount_paid: updated.amount_paid,
            })
            .await;

        Ok(updated)
    }
}

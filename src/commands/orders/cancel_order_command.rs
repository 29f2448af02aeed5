use crate::{
    commands::{
        check_expected_version,
        orders::{
            find_order, find_order_items, load_order_details,
            update_order_payment_command::apply_amount_paid, OrderDetails,
        },
        update_versioned, Command,
    },
    db::DbPool,
    entities::{order, order_group, order_item},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{record_command_failure, ORDER_CANCELLATIONS},
    models::{
        fulfillment::{payment_status_for, plan_cancellation},
        CancellationType, OrderStatus, PaymentAdjustmentAction, PaymentStatus,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAdjustmentInput {
    pub action: PaymentAdjustmentAction,
    /// Order that receives the money when `action` is `adjust`
    pub target_order_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelOrderInput {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Reason must be between 1 and 500 characters"
    ))]
    pub reason: String,
    pub payment_adjustment: Option<PaymentAdjustmentInput>,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CancelOrderCommand {
    pub order_id: Uuid,
    pub input: CancelOrderInput,
    pub cancelled_by: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderResult {
    pub order: OrderDetails,
    pub cancellation_type: CancellationType,
    /// The order that absorbed the payment, for `adjust`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_order: Option<order::Model>,
}

#[async_trait::async_trait]
impl Command for CancelOrderCommand {
    type Result = CancelOrderResult;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.input.validate().map_err(|e| {
            let e = ServiceError::from(e);
            record_command_failure("cancel_order", &e);
            e
        })?;

        let command = self.clone();
        let result = db_pool
            .transaction::<_, CancelOrderResult, ServiceError>(|txn| {
                Box::pin(async move { command.cancel_in_txn(txn).await })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("cancel_order", &e);
                warn!(error = %e, "order cancellation rejected");
                e
            })?;

        ORDER_CANCELLATIONS
            .with_label_values(&[&result.cancellation_type.to_string()])
            .inc();
        info!(
            order_id = %self.order_id,
            reason = %self.input.reason,
            cancellation_type = %result.cancellation_type,
            grand_total = %result.order.order.grand_total,
            "Order cancelled"
        );

        event_sender
            .send_or_log(Event::OrderCancelled {
                order_id: self.order_id,
                cancellation_type: result.cancellation_type,
            })
            .await;
        if let Some(target) = &result.adjusted_order {
            event_sender
                .send_or_log(Event::OrderPaymentUpdated {
                    order_id: target.id,
                    amount_paid: target.amount_paid,
                })
                .await;
        }

        Ok(result)
    }
}

impl CancelOrderCommand {
    async fn cancel_in_txn(&self, txn: &DatabaseTransaction) -> Result<CancelOrderResult, ServiceError> {
        let current = find_order(txn, self.order_id).await?;
        check_expected_version(self.order_id, current.version, self.input.expected_version)?;

        if matches!(current.status, OrderStatus::Cancelled | OrderStatus::Delivered) {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} is already {}",
                current.order_number, current.status
            )));
        }

        let amount_paid = current.amount_paid;
        let adjustment = if amount_paid > Decimal::ZERO {
            match self.input.payment_adjustment.clone() {
                Some(adjustment) => Some(adjustment),
                None => {
                    return Err(ServiceError::PaymentAdjustmentRequired {
                        order_id: self.order_id,
                        amount_paid,
                    })
                }
            }
        } else {
            if self.input.payment_adjustment.is_some() {
                debug!(order_id = %self.order_id, "nothing paid; payment adjustment ignored");
            }
            None
        };

        let adjusted_order = match &adjustment {
            Some(PaymentAdjustmentInput {
                action: PaymentAdjustmentAction::Adjust,
                target_order_id,
            }) => Some(self.move_payment(txn, *target_order_id, amount_paid).await?),
            _ => None,
        };

        let items = find_order_items(txn, self.order_id).await?;
        let lines: Vec<_> = items.iter().map(order_item::Model::as_cancel_line).collect();
        let plan = plan_cancellation(&lines, current.gst_rate);

        for (item, cancelled) in items.into_iter().zip(plan.lines.iter()) {
            let mut active: order_item::ActiveModel = item.into();
            active.quantity = Set(cancelled.quantity);
            active.balance_quantity = Set(cancelled.balance_quantity);
            active.cancelled_quantity = Set(cancelled.cancelled_quantity);
            active.total_amount = Set(cancelled.total_amount);
            active.update(txn).await?;
        }

        for (group_id, total) in &plan.group_totals {
            order_group::ActiveModel {
                id: Set(*group_id),
                total_amount: Set(*total),
                ..Default::default()
            }
            .update(txn)
            .await?;
        }

        let version = current.version;
        let (new_paid, new_balance, payment_status) = if adjustment.is_some() {
            (Decimal::ZERO, Decimal::ZERO, PaymentStatus::Refunded)
        } else {
            (
                Decimal::ZERO,
                plan.net_amount_payable,
                payment_status_for(plan.net_amount_payable, Decimal::ZERO),
            )
        };

        let now = Utc::now();
        let mut active: order::ActiveModel = current.into();
        active.status = Set(OrderStatus::Cancelled);
        active.grand_total = Set(plan.grand_total);
        active.gst_amount = Set(plan.gst_amount);
        active.net_amount_payable = Set(plan.net_amount_payable);
        active.amount_paid = Set(new_paid);
        active.balance_amount = Set(new_balance);
        active.payment_status = Set(payment_status);
        active.cancellation_reason = Set(Some(self.input.reason.trim().to_string()));
        active.cancelled_by = Set(Some(self.cancelled_by.clone()));
        active.cancelled_at = Set(Some(now));
        active.cancellation_type = Set(Some(plan.cancellation_type.to_string()));
        active.payment_adjustment_action = Set(adjustment.as_ref().map(|a| a.action.to_string()));
        active.payment_adjustment_target = Set(adjusted_order.as_ref().map(|o| o.id));
        active.payment_adjustment_amount = Set(adjustment.as_ref().map(|_| amount_paid));
        active.version = Set(version + 1);
        active.updated_at = Set(Some(now));

        update_versioned(txn, self.order_id, active, order::Column::Version, version).await?;

        Ok(CancelOrderResult {
            order: load_order_details(txn, self.order_id).await?,
            cancellation_type: plan.cancellation_type,
            adjusted_order,
        })
    }

    /// Credits the cancelled order's payment to another live order.
    async fn move_payment(
        &self,
        txn: &DatabaseTransaction,
        target_order_id: Option<Uuid>,
        amount: Decimal,
    ) -> Result<order::Model, ServiceError> {
        let target_id = target_order_id.ok_or_else(|| {
            ServiceError::ValidationError(
                "payment_adjustment.target_order_id is required for adjust".to_string(),
            )
        })?;
        if target_id == self.order_id {
            return Err(ServiceError::ValidationError(
                "payment cannot be adjusted onto the order being cancelled".to_string(),
            ));
        }

        let target = find_order(txn, target_id).await?;
        if target.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "target order {} is cancelled",
                target.order_number
            )));
        }

        let new_paid = target.amount_paid + amount;
        apply_amount_paid(txn, target, new_paid).await
    }
}

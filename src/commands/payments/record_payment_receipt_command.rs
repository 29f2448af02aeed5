use crate::{
    commands::{
        orders::{find_order, update_order_payment_command::apply_amount_paid},
        Command,
    },
    db::DbPool,
    entities::{order, payment_receipt},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_command_failure,
    models::OrderStatus,
    services::sequences::{next_document_number, DocumentPrefix},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordPaymentReceiptInput {
    pub order_id: Uuid,
    pub amount: Decimal,
    #[validate(length(max = 32))]
    pub payment_mode: Option<String>,
    #[validate(length(max = 120))]
    pub reference: Option<String>,
}

/// Money received from the party against an order. Applies straight to the
/// order balance; purchase request PI amounts play no part.
#[derive(Debug, Clone)]
pub struct RecordPaymentReceiptCommand {
    pub input: RecordPaymentReceiptInput,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceiptRecorded {
    pub receipt: payment_receipt::Model,
    pub order: order::Model,
}

#[async_trait::async_trait]
impl Command for RecordPaymentReceiptCommand {
    type Result = PaymentReceiptRecorded;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.input.order_id, amount = %self.input.amount))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.input.validate()?;
        if self.input.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "receipt amount must be greater than zero".to_string(),
            ));
        }

        let input = self.input.clone();
        let created_by = self.created_by.clone();
        let recorded = db_pool
            .transaction::<_, PaymentReceiptRecorded, ServiceError>(|txn| {
                Box::pin(async move {
                    let current = find_order(txn, input.order_id).await?;
                    if current.status == OrderStatus::Cancelled {
                        return Err(ServiceError::InvalidOperation(
                            "payments cannot be recorded on a cancelled order".to_string(),
                        ));
                    }

                    let receipt_number =
                        next_document_number(txn, DocumentPrefix::PaymentReceipt).await?;
                    let receipt_id = Uuid::new_v4();
                    payment_receipt::Entity::insert(payment_receipt::ActiveModel {
                        id: Set(receipt_id),
                        receipt_number: Set(receipt_number),
                        order_id: Set(input.order_id),
                        amount: Set(input.amount),
                        payment_mode: Set(input.payment_mode.clone()),
                        reference: Set(input.reference.clone()),
                        created_by: Set(created_by),
                        received_at: Set(Utc::now()),
                    })
                    .exec_without_returning(txn)
                    .await?;

                    let new_paid = current.amount_paid + input.amount;
                    let order = apply_amount_paid(txn, current, new_paid).await?;
                    let receipt = payment_receipt::Entity::find_by_id(receipt_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::InternalError("receipt vanished after insert".into())
                        })?;

                    Ok(PaymentReceiptRecorded { receipt, order })
                })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("record_payment_receipt", &e);
                e
            })?;

        info!(
            receipt_number = %recorded.receipt.receipt_number,
            balance_amount = %recorded.order.balance_amount,
            "Payment receipt recorded"
        );
        event_sender
            .send_or_log(Event::PaymentReceiptRecorded {
                receipt_id: recorded.receipt.id,
                order_id: recorded.order.id,
                amount: recorded.receipt.amount,
            })
            .await;

        Ok(recorded)
    }
}

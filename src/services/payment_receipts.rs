use crate::{
    commands::{
        orders::find_order,
        payments::{PaymentReceiptRecorded, RecordPaymentReceiptCommand, RecordPaymentReceiptInput},
        Command,
    },
    db::DbPool,
    entities::payment_receipt,
    errors::ServiceError,
    events::EventSender,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentReceiptService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PaymentReceiptService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn record_payment_receipt(
        &self,
        input: RecordPaymentReceiptInput,
        created_by: String,
    ) -> Result<PaymentReceiptRecorded, ServiceError> {
        RecordPaymentReceiptCommand { input, created_by }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Receipts for one order in the order they were received
    #[instrument(skip(self))]
    pub async fn list_payment_receipts(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<payment_receipt::Model>, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_id).await?;
        Ok(payment_receipt::Entity::find()
            .filter(payment_receipt::Column::OrderId.eq(order_id))
            .order_by_asc(payment_receipt::Column::ReceivedAt)
            .all(db)
            .await?)
    }
}

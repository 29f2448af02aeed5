use crate::{
    commands::{
        dispatch::{find_dispatch_note, load_dispatch_note_details},
        update_product_counters, Command,
    },
    db::DbPool,
    entities::{dispatch_note, sell_record},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_command_failure,
    services::sequences::{next_document_number, DocumentPrefix},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Marks a dispatch note sold and books the goods out of fresh stock.
#[derive(Debug, Clone)]
pub struct CreateSellRecordCommand {
    pub dispatch_note_id: Uuid,
    pub created_by: String,
}

#[async_trait::async_trait]
impl Command for CreateSellRecordCommand {
    type Result = sell_record::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(dispatch_note_id = %self.dispatch_note_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let command = self.clone();
        let record = db_pool
            .transaction::<_, sell_record::Model, ServiceError>(|txn| {
                Box::pin(async move { command.sell_in_txn(txn).await })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("create_sell_record", &e);
                e
            })?;

        info!(sell_number = %record.sell_number, "Sell record created");
        event_sender
            .send_or_log(Event::SellRecordCreated {
                sell_record_id: record.id,
                dispatch_note_id: record.dispatch_note_id,
            })
            .await;

        Ok(record)
    }
}

impl CreateSellRecordCommand {
    async fn sell_in_txn(&self, txn: &DatabaseTransaction) -> Result<sell_record::Model, ServiceError> {
        let note = find_dispatch_note(txn, self.dispatch_note_id).await?;

        let flagged = dispatch_note::Entity::update_many()
            .col_expr(dispatch_note::Column::Sold, Expr::value(true))
            .filter(dispatch_note::Column::Id.eq(note.id))
            .filter(dispatch_note::Column::Sold.eq(false))
            .exec(txn)
            .await?;
        if flagged.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "dispatch note {} is already sold",
                note.dn_number
            )));
        }

        let details = load_dispatch_note_details(txn, note.id).await?;
        for item in &details.items {
            let quantity = item.quantity;
            let updated = update_product_counters(txn, item.product_id, |product, active| {
                active.fresh_stock = Set((product.fresh_stock - quantity).max(0));
            })
            .await?;
            if updated.is_none() {
                warn!(product_id = %item.product_id, "product missing; fresh stock not updated");
            }
        }

        let sell_number = next_document_number(txn, DocumentPrefix::SellRecord).await?;
        let record_id = Uuid::new_v4();
        sell_record::Entity::insert(sell_record::ActiveModel {
            id: Set(record_id),
            sell_number: Set(sell_number),
            dispatch_note_id: Set(note.id),
            order_id: Set(note.order_id),
            total_amount: Set(note.total_amount),
            created_by: Set(self.created_by.clone()),
            created_at: Set(Utc::now()),
        })
        .exec_without_returning(txn)
        .await?;

        sell_record::Entity::find_by_id(record_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::InternalError("sell record vanished after insert".into()))
    }
}

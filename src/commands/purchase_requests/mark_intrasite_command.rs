use crate::{
    commands::{
        check_expected_version,
        purchase_requests::{
            find_purchase_request, find_purchase_request_items, save_purchase_request,
            unique_order_ids, PurchaseRequestChanged, PurchaseRequestDetails,
        },
        update_product_counters, Command,
    },
    db::DbPool,
    errors::ServiceError,
    events::{
        outbox::{enqueue, OutboxMessage, ProcurementCascade},
        Event, EventSender,
    },
    metrics::record_command_failure,
    models::PurchaseRequestStatus,
};
use sea_orm::{DatabaseTransaction, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Goods have left the vendor: `awaiting_dispatch` -> `intrasite`.
#[derive(Debug, Clone)]
pub struct MarkIntrasiteCommand {
    pub purchase_request_id: Uuid,
    pub expected_version: Option<i32>,
}

#[async_trait::async_trait]
impl Command for MarkIntrasiteCommand {
    type Result = PurchaseRequestChanged;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let command = self.clone();
        let changed = db_pool
            .transaction::<_, PurchaseRequestChanged, ServiceError>(|txn| {
                Box::pin(async move { command.mark_in_txn(txn).await })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("mark_intrasite", &e);
                e
            })?;

        info!(
            pr_number = %changed.purchase_request.purchase_request.pr_number,
            "Purchase request in transit"
        );
        event_sender
            .send_or_log(Event::PurchaseRequestUpdated(self.purchase_request_id))
            .await;

        Ok(changed)
    }
}

impl MarkIntrasiteCommand {
    async fn mark_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<PurchaseRequestChanged, ServiceError> {
        let current = find_purchase_request(txn, self.purchase_request_id).await?;
        check_expected_version(current.id, current.version, self.expected_version)?;
        if current.status != PurchaseRequestStatus::AwaitingDispatch {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase request {} is {}; only awaiting_dispatch can go intrasite",
                current.pr_number, current.status
            )));
        }

        let purchase_request_id = current.id;
        let saved = save_purchase_request(txn, current, |active| {
            active.status = Set(PurchaseRequestStatus::Intrasite);
        })
        .await?;

        let items = find_purchase_request_items(txn, purchase_request_id).await?;
        let mut skipped_products = Vec::new();
        for item in &items {
            let procured = item.procured_quantity();
            let updated = update_product_counters(txn, item.product_id, |product, active| {
                active.in_transit_quantity = Set(product.in_transit_quantity + procured);
            })
            .await?;
            if updated.is_none() {
                warn!(product_id = %item.product_id, "product missing; in-transit quantity not updated");
                skipped_products.push(item.product_id);
            }
        }

        let message = OutboxMessage::PurchaseRequestIntrasite(ProcurementCascade {
            purchase_request_id,
            order_ids: unique_order_ids(&items),
        });
        let outbox_event_id = enqueue(txn, &message).await?;

        Ok(PurchaseRequestChanged {
            purchase_request: PurchaseRequestDetails {
                purchase_request: saved,
                items,
            },
            outbox_event_id: Some(outbox_event_id),
            skipped_products,
        })
    }
}

use crate::{
    commands::{
        check_expected_version,
        purchase_requests::{
            find_purchase_request, find_purchase_request_items, save_purchase_request,
            PurchaseRequestChanged, PurchaseRequestDetails,
        },
        update_product_counters, Command,
    },
    db::DbPool,
    entities::purchase_request_item,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_command_failure,
    models::fulfillment::{in_transit_after_receipt, validate_material_receipt, ReceiptLine},
};
use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceivedItemInput {
    pub item_id: Uuid,
    #[serde(default)]
    pub fresh_stock_received: i32,
    #[serde(default)]
    pub damaged_stock_received: i32,
    #[serde(default)]
    pub short_qty_received: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MaterialReceiptInput {
    #[validate(length(min = 1, max = 64, message = "Vendor invoice number is required"))]
    pub vendor_invoice_number: String,
    pub vendor_invoice_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "At least one received item is required"))]
    pub items: Vec<ReceivedItemInput>,
    pub expected_version: Option<i32>,
}

/// Books the vendor's delivery into stock. Either every line is accepted or
/// none is.
#[derive(Debug, Clone)]
pub struct RecordMaterialReceivedCommand {
    pub purchase_request_id: Uuid,
    pub input: MaterialReceiptInput,
}

#[async_trait::async_trait]
impl Command for RecordMaterialReceivedCommand {
    type Result = PurchaseRequestChanged;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id, lines = self.input.items.len()))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.input.validate()?;

        let command = self.clone();
        let changed = db_pool
            .transaction::<_, PurchaseRequestChanged, ServiceError>(|txn| {
                Box::pin(async move { command.receive_in_txn(txn).await })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("record_material_received", &e);
                e
            })?;

        info!(
            pr_number = %changed.purchase_request.purchase_request.pr_number,
            skipped = changed.skipped_products.len(),
            "Material received"
        );
        event_sender
            .send_or_log(Event::MaterialReceived {
                purchase_request_id: self.purchase_request_id,
                skipped_products: changed.skipped_products.clone(),
            })
            .await;

        Ok(changed)
    }
}

impl RecordMaterialReceivedCommand {
    async fn receive_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<PurchaseRequestChanged, ServiceError> {
        let current = find_purchase_request(txn, self.purchase_request_id).await?;
        check_expected_version(current.id, current.version, self.input.expected_version)?;

        if !current.pi_received {
            return Err(ServiceError::InvalidOperation(format!(
                "purchase request {} has no PI yet",
                current.pr_number
            )));
        }
        if current.status.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase request {} is {}",
                current.pr_number, current.status
            )));
        }
        if current.material_received {
            return Err(ServiceError::Conflict(format!(
                "material for purchase request {} was already received",
                current.pr_number
            )));
        }

        let items = find_purchase_request_items(txn, current.id).await?;
        let mut receipt: Vec<(&purchase_request_item::Model, ReceiptLine)> =
            Vec::with_capacity(self.input.items.len());
        for input in &self.input.items {
            let item = items.iter().find(|i| i.id == input.item_id).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "item {} does not belong to purchase request {}",
                    input.item_id, current.pr_number
                ))
            })?;
            if receipt.iter().any(|(i, _)| i.id == item.id) {
                return Err(ServiceError::ValidationError(format!(
                    "item {} is listed twice",
                    item.id
                )));
            }
            let line = item.receipt_line(
                input.fresh_stock_received,
                input.damaged_stock_received,
                input.short_qty_received,
            );
            receipt.push((item, line));
        }
        let lines: Vec<ReceiptLine> = receipt.iter().map(|(_, line)| line.clone()).collect();
        validate_material_receipt(&lines)?;

        let mut skipped_products = Vec::new();
        let mut updated_items = Vec::with_capacity(items.len());
        for (item, line) in &receipt {
            let mut active: purchase_request_item::ActiveModel = (*item).clone().into();
            active.fresh_stock_received = Set(line.fresh);
            active.damaged_stock_received = Set(line.damaged);
            active.short_qty_received = Set(line.short);
            updated_items.push(active.update(txn).await?);

            let accounted = line.accounted();
            let (fresh, damaged) = (line.fresh, line.damaged);
            let updated = update_product_counters(txn, item.product_id, |product, active| {
                active.fresh_stock = Set(product.fresh_stock + fresh);
                active.damaged_stock = Set(product.damaged_stock + damaged);
                active.in_transit_quantity =
                    Set(in_transit_after_receipt(product.in_transit_quantity, accounted));
            })
            .await?;
            if updated.is_none() {
                warn!(product_id = %item.product_id, item_id = %item.id, "product missing; stock not updated");
                skipped_products.push(item.product_id);
            }
        }

        let invoice_number = self.input.vendor_invoice_number.clone();
        let invoice_date = self.input.vendor_invoice_date;
        let saved = save_purchase_request(txn, current, |active| {
            active.material_received = Set(true);
            active.vendor_invoice_number = Set(Some(invoice_number));
            active.vendor_invoice_date = Set(invoice_date);
        })
        .await?;

        let items = items
            .into_iter()
            .map(|item| {
                updated_items
                    .iter()
                    .find(|u| u.id == item.id)
                    .cloned()
                    .unwrap_or(item)
            })
            .collect();

        Ok(PurchaseRequestChanged {
            purchase_request: PurchaseRequestDetails {
                purchase_request: saved,
                items,
            },
            outbox_event_id: None,
            skipped_products,
        })
    }
}

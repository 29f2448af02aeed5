use crate::{
    commands::{
        orders::{find_order, find_order_items},
        purchase_requests::{load_purchase_request_details, PurchaseRequestDetails},
        Command,
    },
    db::DbPool,
    entities::{order_item, product, purchase_request, purchase_request_item},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_command_failure,
    models::PurchaseRequestStatus,
    services::sequences::{next_document_number, DocumentPrefix},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPurchaseRequestItem {
    pub order_id: Uuid,
    /// Exact order line; when absent the first line carrying the product is used
    pub order_item_id: Option<Uuid>,
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseRequestInput {
    #[validate(length(max = 200))]
    pub vendor_name: Option<String>,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    #[validate(length(min = 1, message = "A purchase request needs at least one item"))]
    pub items: Vec<NewPurchaseRequestItem>,
}

#[derive(Debug, Clone)]
pub struct CreatePurchaseRequestCommand {
    pub input: CreatePurchaseRequestInput,
    pub created_by: String,
}

#[async_trait::async_trait]
impl Command for CreatePurchaseRequestCommand {
    type Result = PurchaseRequestDetails;

    #[instrument(skip(self, db_pool, event_sender), fields(items = self.input.items.len()))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.input.validate()?;
        for item in &self.input.items {
            item.validate()?;
        }

        let command = self.clone();
        let created = db_pool
            .transaction::<_, PurchaseRequestDetails, ServiceError>(|txn| {
                Box::pin(async move { command.create_in_txn(txn).await })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("create_purchase_request", &e);
                e
            })?;

        info!(
            purchase_request_id = %created.purchase_request.id,
            pr_number = %created.purchase_request.pr_number,
            "Purchase request created"
        );
        event_sender
            .send_or_log(Event::PurchaseRequestCreated(created.purchase_request.id))
            .await;

        Ok(created)
    }
}

impl CreatePurchaseRequestCommand {
    async fn create_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<PurchaseRequestDetails, ServiceError> {
        let mut order_lines: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        let mut rows = Vec::with_capacity(self.input.items.len());
        let mut requested_per_line: HashMap<Uuid, i32> = HashMap::new();
        let mut balances: HashMap<Uuid, i32> = HashMap::new();
        let purchase_request_id = Uuid::new_v4();

        for input in &self.input.items {
            if !order_lines.contains_key(&input.order_id) {
                let order = find_order(txn, input.order_id).await?;
                if order.status.is_terminal() {
                    return Err(ServiceError::InvalidStatus(format!(
                        "cannot procure for a {} order",
                        order.status
                    )));
                }
                let items = find_order_items(txn, input.order_id).await?;
                order_lines.insert(input.order_id, items);
            }
            let lines = &order_lines[&input.order_id];

            let line = resolve_order_line(lines, input)?;
            if product::Entity::find_by_id(input.product_id)
                .one(txn)
                .await?
                .is_none()
            {
                return Err(ServiceError::NotFound(format!(
                    "Product {} not found",
                    input.product_id
                )));
            }

            let requested = requested_per_line.entry(line.id).or_insert(0);
            *requested += input.quantity;
            balances.insert(line.id, line.balance_quantity);

            rows.push(purchase_request_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_request_id: Set(purchase_request_id),
                order_id: Set(input.order_id),
                order_item_id: Set(Some(line.id)),
                product_id: Set(input.product_id),
                quantity: Set(input.quantity),
                pi_received_quantity: Set(None),
                fresh_stock_received: Set(0),
                damaged_stock_received: Set(0),
                short_qty_received: Set(0),
            });
        }

        let line_ids: Vec<Uuid> = requested_per_line.keys().copied().collect();
        let committed = open_procurement_per_line(txn, &line_ids).await?;
        for (line_id, requested) in &requested_per_line {
            let balance = balances.get(line_id).copied().unwrap_or(0);
            let already = committed.get(line_id).copied().unwrap_or(0);
            if already + requested > balance {
                return Err(ServiceError::ValidationError(format!(
                    "order item {}: {} requested and {} on open purchase requests but only {} outstanding",
                    line_id, requested, already, balance
                )));
            }
        }

        let pr_number = next_document_number(txn, DocumentPrefix::PurchaseRequest).await?;
        purchase_request::Entity::insert(purchase_request::ActiveModel {
            id: Set(purchase_request_id),
            pr_number: Set(pr_number),
            vendor_name: Set(self.input.vendor_name.clone()),
            status: Set(PurchaseRequestStatus::Pending),
            pi_received: Set(false),
            pi_number: Set(None),
            pi_amount: Set(Decimal::ZERO),
            payment_done: Set(false),
            payment_amount: Set(Decimal::ZERO),
            material_received: Set(false),
            vendor_invoice_number: Set(None),
            vendor_invoice_date: Set(None),
            remarks: Set(self.input.remarks.clone()),
            rejection_reason: Set(None),
            approved_by: Set(None),
            created_by: Set(self.created_by.clone()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            version: Set(1),
        })
        .exec_without_returning(txn)
        .await?;
        purchase_request_item::Entity::insert_many(rows)
            .exec_without_returning(txn)
            .await?;

        load_purchase_request_details(txn, purchase_request_id).await
    }
}

/// Quantity per order line still being procured by purchase requests that
/// are neither rejected nor completed. Completed requests are left out since
/// their stock is on hand and dispatching it lowers the line's balance.
async fn open_procurement_per_line(
    txn: &DatabaseTransaction,
    line_ids: &[Uuid],
) -> Result<HashMap<Uuid, i32>, ServiceError> {
    let mut committed = HashMap::new();
    if line_ids.is_empty() {
        return Ok(committed);
    }
    let items = purchase_request_item::Entity::find()
        .inner_join(purchase_request::Entity)
        .filter(purchase_request_item::Column::OrderItemId.is_in(line_ids.iter().copied()))
        .filter(purchase_request::Column::Status.is_not_in([
            PurchaseRequestStatus::Rejected,
            PurchaseRequestStatus::Completed,
        ]))
        .all(txn)
        .await?;
    for item in items {
        if let Some(line_id) = item.order_item_id {
            *committed.entry(line_id).or_insert(0) += item.procured_quantity();
        }
    }
    Ok(committed)
}

fn resolve_order_line<'a>(
    lines: &'a [order_item::Model],
    input: &NewPurchaseRequestItem,
) -> Result<&'a order_item::Model, ServiceError> {
    let found = match input.order_item_id {
        Some(item_id) => {
            let line = lines.iter().find(|l| l.id == item_id).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "order item {} does not belong to order {}",
                    item_id, input.order_id
                ))
            })?;
            if line.product_id != input.product_id {
                return Err(ServiceError::ValidationError(format!(
                    "order item {} carries product {}, not {}",
                    item_id, line.product_id, input.product_id
                )));
            }
            line
        }
        None => lines
            .iter()
            .find(|l| l.product_id == input.product_id)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "product {} is not on order {}",
                    input.product_id, input.order_id
                ))
            })?,
    };
    Ok(found)
}

use crate::{
    commands::{
        check_expected_version,
        dispatch::{load_dispatch_note_details, DispatchNoteDetails},
        orders::{find_order, find_order_items},
        update_versioned, Command,
    },
    db::DbPool,
    entities::{dispatch_note, dispatch_note_item, order, order_item},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{record_command_failure, DISPATCH_CLAMPED_LINES, DISPATCH_NOTES_CREATED},
    models::{
        fulfillment::{
            derive_order_status, line_total, plan_dispatch, DispatchRequestLine,
            OverDispatchPolicy,
        },
        OrderStatus,
    },
    services::sequences::{next_document_number, DocumentPrefix},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchItemInput {
    /// Exact order line; takes precedence over product matching
    pub order_item_id: Option<Uuid>,
    /// Narrows product matching to one group
    pub group_id: Option<Uuid>,
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Dispatch quantity must be greater than zero"))]
    pub quantity: i32,
    /// Defaults to the order item's net rate
    pub rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDispatchNoteInput {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "A dispatch note needs at least one item"))]
    pub items: Vec<DispatchItemInput>,
    #[validate(length(max = 32))]
    pub vehicle_number: Option<String>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CreateDispatchNoteCommand {
    pub input: CreateDispatchNoteInput,
    pub policy: OverDispatchPolicy,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchNoteCreated {
    pub dispatch_note: DispatchNoteDetails,
    pub order_status: OrderStatus,
    /// Lines that were matched by product only or cut down to the balance
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[async_trait::async_trait]
impl Command for CreateDispatchNoteCommand {
    type Result = DispatchNoteCreated;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.input.order_id, lines = self.input.items.len()))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let validated = self.input.validate().map_err(ServiceError::from).and_then(|_| {
            self.input
                .items
                .iter()
                .try_for_each(|item| item.validate().map_err(ServiceError::from))
        });
        if let Err(e) = validated {
            record_command_failure("create_dispatch_note", &e);
            return Err(e);
        }
        if self
            .input
            .items
            .iter()
            .any(|item| item.rate.is_some_and(|r| r < Decimal::ZERO))
        {
            return Err(ServiceError::ValidationError(
                "dispatch rate cannot be negative".to_string(),
            ));
        }

        let command = self.clone();
        let created = db_pool
            .transaction::<_, DispatchNoteCreated, ServiceError>(|txn| {
                Box::pin(async move { command.dispatch_in_txn(txn).await })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("create_dispatch_note", &e);
                warn!(error = %e, "dispatch note rejected");
                e
            })?;

        DISPATCH_NOTES_CREATED.inc();
        let note = &created.dispatch_note.note;
        info!(
            dispatch_note_id = %note.id,
            dn_number = %note.dn_number,
            order_status = %created.order_status,
            "Dispatch note created"
        );
        event_sender
            .send_or_log(Event::DispatchNoteCreated {
                dispatch_note_id: note.id,
                order_id: note.order_id,
                order_status: created.order_status,
            })
            .await;

        Ok(created)
    }
}

impl CreateDispatchNoteCommand {
    async fn dispatch_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<DispatchNoteCreated, ServiceError> {
        let order_id = self.input.order_id;
        let order = find_order(txn, order_id).await?;
        check_expected_version(order_id, order.version, self.input.expected_version)?;

        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Delivered) {
            return Err(ServiceError::InvalidStatus(format!(
                "cannot dispatch against a {} order",
                order.status
            )));
        }

        let mut items = find_order_items(txn, order_id).await?;
        let lines: Vec<_> = items.iter().map(order_item::Model::as_order_line).collect();
        let requests: Vec<DispatchRequestLine> = self
            .input
            .items
            .iter()
            .map(|i| DispatchRequestLine {
                order_item_id: i.order_item_id,
                group_id: i.group_id,
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect();

        let allocations = plan_dispatch(&lines, &requests, self.policy)?;

        let mut warnings = Vec::new();
        let mut increments = vec![0i32; items.len()];
        let mut note_items = Vec::with_capacity(allocations.len());
        let mut note_total = Decimal::ZERO;
        let dispatch_note_id = Uuid::new_v4();

        for (allocation, request) in allocations.iter().zip(self.input.items.iter()) {
            let line = &items[allocation.line_index];
            if line.product_id != request.product_id {
                return Err(ServiceError::ValidationError(format!(
                    "order item {} carries product {}, not {}",
                    line.id, line.product_id, request.product_id
                )));
            }
            if allocation.ambiguous {
                warn!(product_id = %request.product_id, order_item_id = %line.id, "product appears in several groups; matched the first");
                warnings.push(format!(
                    "product {} appears in several groups; dispatched against order item {}",
                    request.product_id, line.id
                ));
            }
            if let Some(requested) = allocation.clamped_from {
                DISPATCH_CLAMPED_LINES.inc();
                warn!(order_item_id = %line.id, requested, dispatched = allocation.quantity, "dispatch clamped to outstanding balance");
                warnings.push(format!(
                    "order item {}: {} requested, {} dispatched",
                    line.id, requested, allocation.quantity
                ));
            }

            let rate = request.rate.unwrap_or(line.net_rate);
            let amount = line_total(allocation.quantity, rate);
            note_total += amount;
            increments[allocation.line_index] += allocation.quantity;
            note_items.push(dispatch_note_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                dispatch_note_id: Set(dispatch_note_id),
                order_item_id: Set(line.id),
                product_id: Set(line.product_id),
                quantity: Set(allocation.quantity),
                rate: Set(rate),
                amount: Set(amount),
            });
        }

        let derived = {
            for (item, inc) in items.iter_mut().zip(increments.iter()) {
                item.dispatched_quantity += inc;
                item.balance_quantity = item.quantity - item.dispatched_quantity;
            }
            let progress: Vec<_> = items.iter().map(order_item::Model::progress).collect();
            derive_order_status(order.status, &progress)
        };

        // Order row first: a concurrent dispatch fails on the version check
        // before either touches the item rows.
        let version = order.version;
        let snapshot = order.clone();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(derived);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(Utc::now()));
        update_versioned(txn, order_id, active, order::Column::Version, version).await?;

        for (item, inc) in items.into_iter().zip(increments) {
            if inc == 0 {
                continue;
            }
            let dispatched = item.dispatched_quantity;
            let balance = item.balance_quantity;
            let mut active: order_item::ActiveModel = item.into();
            active.dispatched_quantity = Set(dispatched);
            active.balance_quantity = Set(balance);
            active.update(txn).await?;
        }

        let dn_number = next_document_number(txn, DocumentPrefix::DispatchNote).await?;
        dispatch_note::Entity::insert(dispatch_note::ActiveModel {
            id: Set(dispatch_note_id),
            dn_number: Set(dn_number),
            order_id: Set(order_id),
            order_number: Set(snapshot.order_number),
            company_id: Set(snapshot.company_id),
            party_id: Set(snapshot.party_id),
            site_id: Set(snapshot.site_id),
            company_name: Set(snapshot.company_name),
            party_name: Set(snapshot.party_name),
            site_name: Set(snapshot.site_name),
            vehicle_number: Set(self.input.vehicle_number.clone()),
            remarks: Set(self.input.remarks.clone()),
            total_amount: Set(note_total),
            sold: Set(false),
            created_by: Set(self.created_by.clone()),
            created_at: Set(Utc::now()),
        })
        .exec_without_returning(txn)
        .await?;
        dispatch_note_item::Entity::insert_many(note_items)
            .exec_without_returning(txn)
            .await?;

        Ok(DispatchNoteCreated {
            dispatch_note: load_dispatch_note_details(txn, dispatch_note_id).await?,
            order_status: derived,
            warnings,
        })
    }
}

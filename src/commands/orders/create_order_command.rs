use crate::{
    commands::{orders::load_order_details, orders::OrderDetails, Command},
    db::DbPool,
    entities::{order, order_group, order_item, product},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{record_command_failure, ORDERS_CREATED},
    models::{
        fulfillment::{gst_for, line_total},
        OrderStatus, PaymentStatus,
    },
    services::sequences::{next_document_number, DocumentPrefix},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Item quantity must be greater than zero"))]
    pub quantity: i32,
    pub net_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrderGroup {
    #[validate(length(min = 1, max = 120, message = "Group name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Each group needs at least one item"))]
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub company_id: Uuid,
    pub party_id: Uuid,
    pub site_id: Option<Uuid>,
    pub company_name: Option<String>,
    pub party_name: Option<String>,
    pub site_name: Option<String>,
    #[validate(length(min = 1, message = "An order needs at least one group"))]
    pub groups: Vec<NewOrderGroup>,
    /// Overrides the configured GST rate for this order
    pub gst_rate: Option<Decimal>,
}

impl CreateOrderInput {
    fn validate_all(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for group in &self.groups {
            group.validate()?;
            for item in &group.items {
                item.validate()?;
                if item.net_rate < Decimal::ZERO {
                    return Err(ServiceError::ValidationError(
                        "net_rate cannot be negative".to_string(),
                    ));
                }
            }
        }
        if let Some(rate) = self.gst_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(ServiceError::ValidationError(
                    "gst_rate must be between 0 and 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub input: CreateOrderInput,
    pub default_gst_rate: Decimal,
    pub created_by: String,
}

#[async_trait::async_trait]
impl Command for CreateOrderCommand {
    type Result = OrderDetails;

    #[instrument(skip(self, db_pool, event_sender), fields(party_id = %self.input.party_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.input.validate_all().map_err(|e| {
            record_command_failure("create_order", &e);
            e
        })?;

        let details = self.create_in_db(db_pool.as_ref()).await.map_err(|e| {
            record_command_failure("create_order", &e);
            error!(error = %e, "order creation failed");
            e
        })?;

        ORDERS_CREATED.inc();
        info!(
            order_id = %details.order.id,
            order_number = %details.order.order_number,
            grand_total = %details.order.grand_total,
            "Order created"
        );
        event_sender
            .send_or_log(Event::OrderCreated(details.order.id))
            .await;

        Ok(details)
    }
}

impl CreateOrderCommand {
    async fn create_in_db(&self, db: &DbPool) -> Result<OrderDetails, ServiceError> {
        let input = self.input.clone();
        let gst_rate = input.gst_rate.unwrap_or(self.default_gst_rate);
        let created_by = self.created_by.clone();

        db.transaction::<_, OrderDetails, ServiceError>(|txn| {
            Box::pin(async move {
                let product_ids: HashSet<Uuid> = input
                    .groups
                    .iter()
                    .flat_map(|g| g.items.iter().map(|i| i.product_id))
                    .collect();
                let known = product::Entity::find()
                    .filter(product::Column::Id.is_in(product_ids.iter().copied()))
                    .all(txn)
                    .await?;
                if let Some(missing) = product_ids
                    .iter()
                    .find(|id| !known.iter().any(|p| p.id == **id))
                {
                    return Err(ServiceError::ValidationError(format!(
                        "product {} does not exist",
                        missing
                    )));
                }

                let order_id = Uuid::new_v4();
                let now = Utc::now();
                let mut groups = Vec::with_capacity(input.groups.len());
                let mut items = Vec::new();
                let mut grand_total = Decimal::ZERO;
                let mut item_position = 0;

                for (position, group) in input.groups.iter().enumerate() {
                    let group_id = Uuid::new_v4();
                    let mut group_total = Decimal::ZERO;

                    for item in &group.items {
                        let total = line_total(item.quantity, item.net_rate);
                        group_total += total;
                        items.push(order_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            order_id: Set(order_id),
                            group_id: Set(group_id),
                            product_id: Set(item.product_id),
                            position: Set(item_position),
                            quantity: Set(item.quantity),
                            dispatched_quantity: Set(0),
                            balance_quantity: Set(item.quantity),
                            cancelled_quantity: Set(0),
                            net_rate: Set(item.net_rate),
                            total_amount: Set(total),
                        });
                        item_position += 1;
                    }

                    grand_total += group_total;
                    groups.push(order_group::ActiveModel {
                        id: Set(group_id),
                        order_id: Set(order_id),
                        name: Set(group.name.trim().to_string()),
                        position: Set(position as i32),
                        total_amount: Set(group_total),
                    });
                }

                let gst_amount = gst_for(grand_total, gst_rate);
                let net_amount_payable = grand_total + gst_amount;
                let order_number = next_document_number(txn, DocumentPrefix::Order).await?;

                let order = order::ActiveModel {
                    id: Set(order_id),
                    order_number: Set(order_number),
                    company_id: Set(input.company_id),
                    party_id: Set(input.party_id),
                    site_id: Set(input.site_id),
                    company_name: Set(input.company_name.clone()),
                    party_name: Set(input.party_name.clone()),
                    site_name: Set(input.site_name.clone()),
                    status: Set(OrderStatus::Pending),
                    payment_status: Set(PaymentStatus::Pending),
                    grand_total: Set(grand_total),
                    gst_rate: Set(gst_rate),
                    gst_amount: Set(gst_amount),
                    net_amount_payable: Set(net_amount_payable),
                    amount_paid: Set(Decimal::ZERO),
                    balance_amount: Set(net_amount_payable),
                    cancellation_reason: Set(None),
                    cancelled_by: Set(None),
                    cancelled_at: Set(None),
                    cancellation_type: Set(None),
                    payment_adjustment_action: Set(None),
                    payment_adjustment_target: Set(None),
                    payment_adjustment_amount: Set(None),
                    created_by: Set(created_by),
                    created_at: Set(now),
                    updated_at: Set(None),
                    version: Set(1),
                };

                order::Entity::insert(order).exec_without_returning(txn).await?;
                order_group::Entity::insert_many(groups)
                    .exec_without_returning(txn)
                    .await?;
                order_item::Entity::insert_many(items)
                    .exec_without_returning(txn)
                    .await?;

                load_order_details(txn, order_id).await
            })
        })
        .await
        .map_err(ServiceError::from)
    }
}

use crate::{
    commands::{
        orders::{
            cancel_order_command::CancelOrderResult, load_order_details, CancelOrderCommand,
            CancelOrderInput, CreateOrderCommand, CreateOrderInput, OrderDetails,
            UpdateOrderPaymentCommand, UpdateOrderStatusCommand,
        },
        Command,
    },
    db::DbPool,
    entities::order::{self, Entity as OrderEntity},
    errors::ServiceError,
    events::EventSender,
    models::OrderStatus,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Service for the order lifecycle
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    default_gst_rate: Decimal,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, default_gst_rate: Decimal) -> Self {
        Self {
            db_pool,
            event_sender,
            default_gst_rate,
        }
    }

    /// Creates an order with its groups and items
    #[instrument(skip(self, input))]
    pub async fn create_order(
        &self,
        input: CreateOrderInput,
        created_by: String,
    ) -> Result<OrderDetails, ServiceError> {
        CreateOrderCommand {
            input,
            default_gst_rate: self.default_gst_rate,
            created_by,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        load_order_details(&*self.db_pool, order_id).await
    }

    /// Lists orders newest first. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
        status: Option<OrderStatus>,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = OrderEntity::find();
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        status: String,
        expected_version: Option<i32>,
    ) -> Result<order::Model, ServiceError> {
        UpdateOrderStatusCommand {
            order_id,
            status,
            expected_version,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn update_order_payment(
        &self,
        order_id: Uuid,
        amount_paid: Decimal,
        expected_version: Option<i32>,
    ) -> Result<order::Model, ServiceError> {
        UpdateOrderPaymentCommand {
            order_id,
            amount_paid,
            expected_version,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Cancels an order, settling any money already paid on it
    #[instrument(skip(self, input))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        input: CancelOrderInput,
        cancelled_by: String,
    ) -> Result<CancelOrderResult, ServiceError> {
        CancelOrderCommand {
            order_id,
            input,
            cancelled_by,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }
}

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    entities::{order, order_group, order_item},
    errors::ServiceError,
};

pub mod apply_procurement_cascade_command;
pub mod cancel_order_command;
pub mod create_order_command;
pub mod update_order_payment_command;
pub mod update_order_status_command;

pub use apply_procurement_cascade_command::ApplyProcurementCascadeCommand;
pub use cancel_order_command::{CancelOrderCommand, CancelOrderInput, PaymentAdjustmentInput};
pub use create_order_command::{CreateOrderCommand, CreateOrderInput, NewOrderGroup, NewOrderItem};
pub use update_order_payment_command::UpdateOrderPaymentCommand;
pub use update_order_status_command::UpdateOrderStatusCommand;

/// A group with its items, in position order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderGroupDetails {
    #[serde(flatten)]
    pub group: order_group::Model,
    pub items: Vec<order_item::Model>,
}

/// An order with everything nested under it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub groups: Vec<OrderGroupDetails>,
}

impl OrderDetails {
    pub fn items(&self) -> impl Iterator<Item = &order_item::Model> {
        self.groups.iter().flat_map(|g| g.items.iter())
    }
}

pub(crate) async fn find_order<C>(conn: &C, order_id: Uuid) -> Result<order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    order::Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

pub(crate) async fn find_order_items<C>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<order_item::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Position)
        .all(conn)
        .await?)
}

/// Loads an order and nests its groups and items.
pub async fn load_order_details<C>(conn: &C, order_id: Uuid) -> Result<OrderDetails, ServiceError>
where
    C: ConnectionTrait,
{
    let order = find_order(conn, order_id).await?;
    let groups = order_group::Entity::find()
        .filter(order_group::Column::OrderId.eq(order_id))
        .order_by_asc(order_group::Column::Position)
        .all(conn)
        .await?;
    let mut items = find_order_items(conn, order_id).await?;

    let groups = groups
        .into_iter()
        .map(|group| {
            let (mine, rest): (Vec<_>, Vec<_>) =
                items.drain(..).partition(|item| item.group_id == group.id);
            items = rest;
            OrderGroupDetails { group, items: mine }
        })
        .collect();

    Ok(OrderDetails { order, groups })
}

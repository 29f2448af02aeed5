use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::fulfillment::{CancelLine, ItemProgress, OrderLine};

/// Invariant: `balance_quantity == quantity - dispatched_quantity >= 0`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub group_id: Uuid,
    pub product_id: Uuid,
    pub position: i32,
    pub quantity: i32,
    pub dispatched_quantity: i32,
    pub balance_quantity: i32,
    /// Quantity dropped from the order by cancellation
    pub cancelled_quantity: i32,
    pub net_rate: Decimal,
    pub total_amount: Decimal,
}

impl Model {
    pub fn progress(&self) -> ItemProgress {
        ItemProgress {
            quantity: self.quantity,
            dispatched_quantity: self.dispatched_quantity,
        }
    }

    pub fn as_order_line(&self) -> OrderLine {
        OrderLine {
            id: self.id,
            group_id: self.group_id,
            product_id: self.product_id,
            quantity: self.quantity,
            dispatched_quantity: self.dispatched_quantity,
        }
    }

    pub fn as_cancel_line(&self) -> CancelLine {
        CancelLine {
            id: self.id,
            group_id: self.group_id,
            quantity: self.quantity,
            dispatched_quantity: self.dispatched_quantity,
            net_rate: self.net_rate,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::order_group::Entity",
        from = "Column::GroupId",
        to = "super::order_group::Column::Id"
    )]
    OrderGroup,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::order_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderGroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

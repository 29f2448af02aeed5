use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::fulfillment::{procured_quantity, ReceiptLine};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_request_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub purchase_request_id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Option<Uuid>,
    pub product_id: Uuid,
    pub quantity: i32,
    pub pi_received_quantity: Option<i32>,
    pub fresh_stock_received: i32,
    pub damaged_stock_received: i32,
    pub short_qty_received: i32,
}

impl Model {
    /// Quantity that moves the product's ordered and in-transit counters.
    pub fn procured_quantity(&self) -> i32 {
        procured_quantity(self.quantity, self.pi_received_quantity)
    }

    pub fn receipt_line(&self, fresh: i32, damaged: i32, short: i32) -> ReceiptLine {
        ReceiptLine {
            item_id: self.id,
            quantity: self.quantity,
            pi_received_quantity: self.pi_received_quantity,
            fresh,
            damaged,
            short,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_request::Entity",
        from = "Column::PurchaseRequestId",
        to = "super::purchase_request::Column::Id"
    )]
    PurchaseRequest,
}

impl Related<super::purchase_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

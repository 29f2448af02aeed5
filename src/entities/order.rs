use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{OrderStatus, PaymentStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub company_id: Uuid,
    pub party_id: Uuid,
    pub site_id: Option<Uuid>,
    pub company_name: Option<String>,
    pub party_name: Option<String>,
    pub site_name: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub grand_total: Decimal,
    pub gst_rate: Decimal,
    pub gst_amount: Decimal,
    pub net_amount_payable: Decimal,
    pub amount_paid: Decimal,
    pub balance_amount: Decimal,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_type: Option<String>,
    pub payment_adjustment_action: Option<String>,
    pub payment_adjustment_target: Option<Uuid>,
    pub payment_adjustment_amount: Option<Decimal>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_group::Entity")]
    OrderGroup,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::dispatch_note::Entity")]
    DispatchNote,
    #[sea_orm(has_many = "super::payment_receipt::Entity")]
    PaymentReceipt,
}

impl Related<super::order_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderGroup.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::dispatch_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DispatchNote.def()
    }
}

impl Related<super::payment_receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentReceipt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PurchaseRequestStatus;

/// Vendor-facing procurement record. `payment_done` implies `payment_amount > 0`,
/// and only a full payment moves it to `awaiting_dispatch`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub pr_number: String,
    pub vendor_name: Option<String>,
    pub status: PurchaseRequestStatus,
    pub pi_received: bool,
    pub pi_number: Option<String>,
    pub pi_amount: Decimal,
    pub payment_done: bool,
    pub payment_amount: Decimal,
    pub material_received: bool,
    pub vendor_invoice_number: Option<String>,
    pub vendor_invoice_date: Option<NaiveDate>,
    pub remarks: Option<String>,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_request_item::Entity")]
    Item,
}

impl Related<super::purchase_request_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

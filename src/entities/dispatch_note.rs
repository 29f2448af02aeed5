use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Goods shipped against one order. Party, company and site are copied from
/// the order at creation so the note reads the same after the order changes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dispatch_notes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub dn_number: String,
    pub order_id: Uuid,
    pub order_number: String,
    pub company_id: Uuid,
    pub party_id: Uuid,
    pub site_id: Option<Uuid>,
    pub company_name: Option<String>,
    pub party_name: Option<String>,
    pub site_name: Option<String>,
    pub vehicle_number: Option<String>,
    pub remarks: Option<String>,
    pub total_amount: Decimal,
    pub sold: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(has_many = "super::dispatch_note_item::Entity")]
    Item,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::dispatch_note_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

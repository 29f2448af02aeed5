use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dispatch_note_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub dispatch_note_id: Uuid,
    pub order_item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub rate: Decimal,
    pub amount: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dispatch_note::Entity",
        from = "Column::DispatchNoteId",
        to = "super::dispatch_note::Column::Id"
    )]
    DispatchNote,
}

impl Related<super::dispatch_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DispatchNote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

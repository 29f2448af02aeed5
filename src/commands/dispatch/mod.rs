use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    entities::{dispatch_note, dispatch_note_item},
    errors::ServiceError,
};

pub mod create_dispatch_note_command;
pub mod create_sell_record_command;

pub use create_dispatch_note_command::{
    CreateDispatchNoteCommand, CreateDispatchNoteInput, DispatchItemInput, DispatchNoteCreated,
};
pub use create_sell_record_command::CreateSellRecordCommand;

#[derive(Debug, Clone, Serialize)]
pub struct DispatchNoteDetails {
    #[serde(flatten)]
    pub note: dispatch_note::Model,
    pub items: Vec<dispatch_note_item::Model>,
}

pub(crate) async fn find_dispatch_note<C>(
    conn: &C,
    dispatch_note_id: Uuid,
) -> Result<dispatch_note::Model, ServiceError>
where
    C: ConnectionTrait,
{
    dispatch_note::Entity::find_by_id(dispatch_note_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Dispatch note {} not found", dispatch_note_id))
        })
}

pub async fn load_dispatch_note_details<C>(
    conn: &C,
    dispatch_note_id: Uuid,
) -> Result<DispatchNoteDetails, ServiceError>
where
    C: ConnectionTrait,
{
    let note = find_dispatch_note(conn, dispatch_note_id).await?;
    let items = dispatch_note_item::Entity::find()
        .filter(dispatch_note_item::Column::DispatchNoteId.eq(dispatch_note_id))
        .all(conn)
        .await?;
    Ok(DispatchNoteDetails { note, items })
}

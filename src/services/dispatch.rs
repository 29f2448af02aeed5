use crate::{
    commands::{
        dispatch::{
            load_dispatch_note_details, CreateDispatchNoteCommand, CreateDispatchNoteInput,
            CreateSellRecordCommand, DispatchNoteCreated, DispatchNoteDetails,
        },
        Command,
    },
    db::DbPool,
    entities::{dispatch_note, sell_record},
    errors::ServiceError,
    events::EventSender,
    models::fulfillment::OverDispatchPolicy,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Service for dispatch notes and the sell records raised from them
#[derive(Clone)]
pub struct DispatchService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    policy: OverDispatchPolicy,
}

impl DispatchService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, allow_over_dispatch: bool) -> Self {
        let policy = if allow_over_dispatch {
            OverDispatchPolicy::Clamp
        } else {
            OverDispatchPolicy::Reject
        };
        Self {
            db_pool,
            event_sender,
            policy,
        }
    }

    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn create_dispatch_note(
        &self,
        input: CreateDispatchNoteInput,
        created_by: String,
    ) -> Result<DispatchNoteCreated, ServiceError> {
        CreateDispatchNoteCommand {
            input,
            policy: self.policy,
            created_by,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_dispatch_note(&self, id: Uuid) -> Result<DispatchNoteDetails, ServiceError> {
        load_dispatch_note_details(&*self.db_pool, id).await
    }

    /// Dispatch notes, newest first, optionally for one order
    #[instrument(skip(self))]
    pub async fn list_dispatch_notes(
        &self,
        order_id: Option<Uuid>,
    ) -> Result<Vec<dispatch_note::Model>, ServiceError> {
        let mut query = dispatch_note::Entity::find();
        if let Some(order_id) = order_id {
            query = query.filter(dispatch_note::Column::OrderId.eq(order_id));
        }
        Ok(query
            .order_by_desc(dispatch_note::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_sell_record(
        &self,
        dispatch_note_id: Uuid,
        created_by: String,
    ) -> Result<sell_record::Model, ServiceError> {
        CreateSellRecordCommand {
            dispatch_note_id,
            created_by,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }
}

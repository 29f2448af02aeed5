use chrono::Utc;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    commands::update_versioned,
    entities::{purchase_request, purchase_request_item},
    errors::ServiceError,
};

pub mod complete_purchase_request_command;
pub mod create_purchase_request_command;
pub mod mark_intrasite_command;
pub mod record_material_received_command;
pub mod record_purchase_request_payment_command;
pub mod review_purchase_request_command;
pub mod update_purchase_request_command;

pub use complete_purchase_request_command::CompletePurchaseRequestCommand;
pub use create_purchase_request_command::{
    CreatePurchaseRequestCommand, CreatePurchaseRequestInput, NewPurchaseRequestItem,
};
pub use mark_intrasite_command::MarkIntrasiteCommand;
pub use record_material_received_command::{
    MaterialReceiptInput, ReceivedItemInput, RecordMaterialReceivedCommand,
};
pub use record_purchase_request_payment_command::RecordPurchaseRequestPaymentCommand;
pub use review_purchase_request_command::{ReviewDecision, ReviewPurchaseRequestCommand};
pub use update_purchase_request_command::{
    PiItemQuantity, UpdatePurchaseRequestCommand, UpdatePurchaseRequestInput,
};

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseRequestDetails {
    #[serde(flatten)]
    pub purchase_request: purchase_request::Model,
    pub items: Vec<purchase_request_item::Model>,
}

impl PurchaseRequestDetails {
    /// Orders behind the items, first appearance first, without repeats.
    pub fn order_ids(&self) -> Vec<Uuid> {
        unique_order_ids(&self.items)
    }
}

/// Outcome of a purchase request command. `outbox_event_id` is set when a
/// cascade to the linked orders was queued.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseRequestChanged {
    pub purchase_request: PurchaseRequestDetails,
    #[serde(skip)]
    pub outbox_event_id: Option<Uuid>,
    /// Products referenced by the request that could not be updated
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_products: Vec<Uuid>,
}

pub(crate) fn unique_order_ids(items: &[purchase_request_item::Model]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for item in items {
        if !ids.contains(&item.order_id) {
            ids.push(item.order_id);
        }
    }
    ids
}

pub(crate) async fn find_purchase_request<C>(
    conn: &C,
    id: Uuid,
) -> Result<purchase_request::Model, ServiceError>
where
    C: ConnectionTrait,
{
    purchase_request::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase request {} not found", id)))
}

pub(crate) async fn find_purchase_request_items<C>(
    conn: &C,
    id: Uuid,
) -> Result<Vec<purchase_request_item::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(purchase_request_item::Entity::find()
        .filter(purchase_request_item::Column::PurchaseRequestId.eq(id))
        .order_by_asc(purchase_request_item::Column::Id)
        .all(conn)
        .await?)
}

pub async fn load_purchase_request_details<C>(
    conn: &C,
    id: Uuid,
) -> Result<PurchaseRequestDetails, ServiceError>
where
    C: ConnectionTrait,
{
    let purchase_request = find_purchase_request(conn, id).await?;
    let items = find_purchase_request_items(conn, id).await?;
    Ok(PurchaseRequestDetails {
        purchase_request,
        items,
    })
}

/// Saves changes to a purchase request under its version check.
pub(crate) async fn save_purchase_request<C, F>(
    conn: &C,
    current: purchase_request::Model,
    apply: F,
) -> Result<purchase_request::Model, ServiceError>
where
    C: ConnectionTrait,
    F: FnOnce(&mut purchase_request::ActiveModel) + Send,
{
    let id = current.id;
    let version = current.version;
    let mut active: purchase_request::ActiveModel = current.into();
    apply(&mut active);
    active.version = Set(version + 1);
    active.updated_at = Set(Some(Utc::now()));
    update_versioned(conn, id, active, purchase_request::Column::Version, version).await
}

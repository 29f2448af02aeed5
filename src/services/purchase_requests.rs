use crate::{
    commands::{
        purchase_requests::{
            load_purchase_request_details, CompletePurchaseRequestCommand,
            CreatePurchaseRequestCommand, CreatePurchaseRequestInput, MarkIntrasiteCommand,
            MaterialReceiptInput, PurchaseRequestChanged, PurchaseRequestDetails,
            RecordMaterialReceivedCommand, RecordPurchaseRequestPaymentCommand, ReviewDecision,
            ReviewPurchaseRequestCommand, UpdatePurchaseRequestCommand,
            UpdatePurchaseRequestInput,
        },
        Command,
    },
    db::DbPool,
    entities::purchase_request,
    errors::ServiceError,
    events::{outbox::OutboxProcessor, EventSender},
    models::PurchaseRequestStatus,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Service for vendor purchase requests.
///
/// Commands that move linked orders leave an outbox row behind; the service
/// delivers it as soon as the command has committed. A failed delivery is
/// only logged: the row stays queued for the background worker and the
/// purchase request change stands.
#[derive(Clone)]
pub struct PurchaseRequestService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    outbox: Arc<OutboxProcessor>,
}

impl PurchaseRequestService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        outbox: Arc<OutboxProcessor>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            outbox,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create_purchase_request(
        &self,
        input: CreatePurchaseRequestInput,
        created_by: String,
    ) -> Result<PurchaseRequestDetails, ServiceError> {
        CreatePurchaseRequestCommand { input, created_by }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_purchase_request(
        &self,
        id: Uuid,
    ) -> Result<PurchaseRequestDetails, ServiceError> {
        load_purchase_request_details(&*self.db_pool, id).await
    }

    #[instrument(skip(self))]
    pub async fn list_purchase_requests(
        &self,
        page: u64,
        per_page: u64,
        status: Option<PurchaseRequestStatus>,
    ) -> Result<(Vec<purchase_request::Model>, u64), ServiceError> {
        let mut query = purchase_request::Entity::find();
        if let Some(status) = status {
            query = query.filter(purchase_request::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(purchase_request::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page.max(1));

        let total = paginator.num_items().await?;
        let requests = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((requests, total))
    }

    #[instrument(skip(self, input))]
    pub async fn update_purchase_request(
        &self,
        id: Uuid,
        input: UpdatePurchaseRequestInput,
    ) -> Result<PurchaseRequestChanged, ServiceError> {
        let changed = UpdatePurchaseRequestCommand {
            purchase_request_id: id,
            input,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        self.deliver_cascade(&changed).await;
        Ok(changed)
    }

    #[instrument(skip(self))]
    pub async fn approve_purchase_request(
        &self,
        id: Uuid,
        approved_by: String,
        expected_version: Option<i32>,
    ) -> Result<PurchaseRequestDetails, ServiceError> {
        ReviewPurchaseRequestCommand {
            purchase_request_id: id,
            decision: ReviewDecision::Approve { approved_by },
            expected_version,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn reject_purchase_request(
        &self,
        id: Uuid,
        reason: String,
        expected_version: Option<i32>,
    ) -> Result<PurchaseRequestDetails, ServiceError> {
        ReviewPurchaseRequestCommand {
            purchase_request_id: id,
            decision: ReviewDecision::Reject { reason },
            expected_version,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn record_payment(
        &self,
        id: Uuid,
        payment_amount: Decimal,
        expected_version: Option<i32>,
    ) -> Result<PurchaseRequestChanged, ServiceError> {
        let changed = RecordPurchaseRequestPaymentCommand {
            purchase_request_id: id,
            payment_amount,
            expected_version,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        self.deliver_cascade(&changed).await;
        Ok(changed)
    }

    #[instrument(skip(self))]
    pub async fn mark_intrasite(
        &self,
        id: Uuid,
        expected_version: Option<i32>,
    ) -> Result<PurchaseRequestChanged, ServiceError> {
        let changed = MarkIntrasiteCommand {
            purchase_request_id: id,
            expected_version,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        self.deliver_cascade(&changed).await;
        Ok(changed)
    }

    #[instrument(skip(self, input))]
    pub async fn record_material_received(
        &self,
        id: Uuid,
        input: MaterialReceiptInput,
    ) -> Result<PurchaseRequestChanged, ServiceError> {
        RecordMaterialReceivedCommand {
            purchase_request_id: id,
            input,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn complete_purchase_request(
        &self,
        id: Uuid,
        expected_version: Option<i32>,
    ) -> Result<PurchaseRequestDetails, ServiceError> {
        CompletePurchaseRequestCommand {
            purchase_request_id: id,
            expected_version,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    async fn deliver_cascade(&self, changed: &PurchaseRequestChanged) {
        let Some(outbox_id) = changed.outbox_event_id else {
            return;
        };
        if let Err(e) = self.outbox.deliver(outbox_id).await {
            warn!(
                error = %e,
                outbox_id = %outbox_id,
                purchase_request_id = %changed.purchase_request.purchase_request.id,
                "order cascade not delivered; left for the outbox worker"
            );
        }
    }
}

use crate::{
    commands::{
        check_expected_version,
        purchase_requests::{
            find_purchase_request, load_purchase_request_details, save_purchase_request,
            PurchaseRequestDetails,
        },
        Command,
    },
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_command_failure,
    models::PurchaseRequestStatus,
};
use sea_orm::{Set, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CompletePurchaseRequestCommand {
    pub purchase_request_id: Uuid,
    pub expected_version: Option<i32>,
}

#[async_trait::async_trait]
impl Command for CompletePurchaseRequestCommand {
    type Result = PurchaseRequestDetails;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let id = self.purchase_request_id;
        let expected_version = self.expected_version;
        let completed = db_pool
            .transaction::<_, PurchaseRequestDetails, ServiceError>(|txn| {
                Box::pin(async move {
                    let current = find_purchase_request(txn, id).await?;
                    check_expected_version(id, current.version, expected_version)?;
                    if current.status != PurchaseRequestStatus::Intrasite {
                        return Err(ServiceError::InvalidStatus(format!(
                            "purchase request {} is {}; only intrasite requests complete",
                            current.pr_number, current.status
                        )));
                    }
                    if !current.material_received {
                        return Err(ServiceError::InvalidOperation(format!(
                            "material for purchase request {} has not been received",
                            current.pr_number
                        )));
                    }

                    save_purchase_request(txn, current, |active| {
                        active.status = Set(PurchaseRequestStatus::Completed);
                    })
                    .await?;
                    load_purchase_request_details(txn, id).await
                })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("complete_purchase_request", &e);
                e
            })?;

        info!(pr_number = %completed.purchase_request.pr_number, "Purchase request completed");
        event_sender
            .send_or_log(Event::PurchaseRequestUpdated(id))
            .await;

        Ok(completed)
    }
}

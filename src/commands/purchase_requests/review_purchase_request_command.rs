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
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve { approved_by: String },
    Reject { reason: String },
}

/// Approves or rejects a pending purchase request.
#[derive(Debug, Clone)]
pub struct ReviewPurchaseRequestCommand {
    pub purchase_request_id: Uuid,
    pub decision: ReviewDecision,
    pub expected_version: Option<i32>,
}

#[async_trait::async_trait]
impl Command for ReviewPurchaseRequestCommand {
    type Result = PurchaseRequestDetails;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        if let ReviewDecision::Reject { reason } = &self.decision {
            if reason.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "a rejection needs a reason".to_string(),
                ));
            }
        }

        let id = self.purchase_request_id;
        let decision = self.decision.clone();
        let expected_version = self.expected_version;
        let reviewed = db_pool
            .transaction::<_, PurchaseRequestDetails, ServiceError>(|txn| {
                Box::pin(async move {
                    let current = find_purchase_request(txn, id).await?;
                    check_expected_version(id, current.version, expected_version)?;
                    if current.status != PurchaseRequestStatus::Pending {
                        return Err(ServiceError::InvalidStatus(format!(
                            "only pending purchase requests can be reviewed; {} is {}",
                            current.pr_number, current.status
                        )));
                    }

                    save_purchase_request(txn, current, |active| match decision {
                        ReviewDecision::Approve { approved_by } => {
                            active.status = Set(PurchaseRequestStatus::Approved);
                            active.approved_by = Set(Some(approved_by));
                        }
                        ReviewDecision::Reject { reason } => {
                            active.status = Set(PurchaseRequestStatus::Rejected);
                            active.rejection_reason = Set(Some(reason));
                        }
                    })
                    .await?;

                    load_purchase_request_details(txn, id).await
                })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("review_purchase_request", &e);
                e
            })?;

        info!(
            pr_number = %reviewed.purchase_request.pr_number,
            status = %reviewed.purchase_request.status,
            "Purchase request reviewed"
        );
        event_sender
            .send_or_log(Event::PurchaseRequestUpdated(id))
            .await;

        Ok(reviewed)
    }
}

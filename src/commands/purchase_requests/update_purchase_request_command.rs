use crate::{
    commands::{
        check_expected_version,
        purchase_requests::{
            find_purchase_request, find_purchase_request_items,
            record_purchase_request_payment_command::{apply_payment, publish_payment},
            save_purchase_request, PurchaseRequestChanged, PurchaseRequestDetails,
        },
        Command,
    },
    db::DbPool,
    entities::purchase_request_item,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::record_command_failure,
    models::{fulfillment::PaymentOutcome, PurchaseRequestStatus},
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PiItemQuantity {
    pub item_id: Uuid,
    #[validate(range(min = 0, message = "PI quantity cannot be negative"))]
    pub pi_received_quantity: i32,
}

/// Full replacement of the editable fields. Fields left out keep their
/// stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePurchaseRequestInput {
    #[validate(length(max = 200))]
    pub vendor_name: Option<String>,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    pub pi_received: Option<bool>,
    #[validate(length(max = 64))]
    pub pi_number: Option<String>,
    pub pi_amount: Option<Decimal>,
    pub items: Option<Vec<PiItemQuantity>>,
    /// Running total paid to the vendor; reconciled against the PI amount
    pub payment_amount: Option<Decimal>,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct UpdatePurchaseRequestCommand {
    pub purchase_request_id: Uuid,
    pub input: UpdatePurchaseRequestInput,
}

#[async_trait::async_trait]
impl Command for UpdatePurchaseRequestCommand {
    type Result = PurchaseRequestChanged;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.input.validate()?;
        if let Some(items) = &self.input.items {
            for item in items {
                item.validate()?;
            }
        }
        if self.input.pi_amount.is_some_and(|a| a < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "PI amount cannot be negative".to_string(),
            ));
        }

        let command = self.clone();
        let (changed, outcome) = db_pool
            .transaction::<_, (PurchaseRequestChanged, Option<PaymentOutcome>), ServiceError>(
                |txn| Box::pin(async move { command.update_in_txn(txn).await }),
            )
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("update_purchase_request", &e);
                e
            })?;

        let pr = &changed.purchase_request.purchase_request;
        info!(pr_number = %pr.pr_number, status = %pr.status, "Purchase request updated");
        event_sender
            .send_or_log(Event::PurchaseRequestUpdated(pr.id))
            .await;
        publish_payment(&event_sender, &changed, outcome).await;

        Ok(changed)
    }
}

impl UpdatePurchaseRequestCommand {
    async fn update_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<(PurchaseRequestChanged, Option<PaymentOutcome>), ServiceError> {
        let input = &self.input;
        let current = find_purchase_request(txn, self.purchase_request_id).await?;
        check_expected_version(current.id, current.version, input.expected_version)?;

        if current.status.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase request {} is {}",
                current.pr_number, current.status
            )));
        }
        if current.pi_received && input.pi_received == Some(false) {
            return Err(ServiceError::InvalidOperation(
                "a received PI cannot be withdrawn".to_string(),
            ));
        }
        let touches_pi = input.pi_amount.is_some_and(|a| a != current.pi_amount)
            || input.items.as_ref().is_some_and(|items| !items.is_empty());
        if current.payment_done && touches_pi {
            return Err(ServiceError::InvalidOperation(format!(
                "purchase request {} is paid; PI figures are locked",
                current.pr_number
            )));
        }

        let mut items = find_purchase_request_items(txn, current.id).await?;
        if let Some(quantities) = &input.items {
            for q in quantities {
                let item = items.iter_mut().find(|i| i.id == q.item_id).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "item {} does not belong to purchase request {}",
                        q.item_id, current.pr_number
                    ))
                })?;
                let mut active: purchase_request_item::ActiveModel = item.clone().into();
                active.pi_received_quantity = Set(Some(q.pi_received_quantity));
                *item = active.update(txn).await?;
            }
        }

        let receives_pi = input.pi_received == Some(true) && !current.pi_received;
        let next_status = match current.status {
            PurchaseRequestStatus::Pending | PurchaseRequestStatus::Approved if receives_pi => {
                PurchaseRequestStatus::AwaitingPayment
            }
            status => status,
        };

        let saved = save_purchase_request(txn, current, |active| {
            if let Some(vendor_name) = &input.vendor_name {
                active.vendor_name = Set(Some(vendor_name.clone()));
            }
            if let Some(remarks) = &input.remarks {
                active.remarks = Set(Some(remarks.clone()));
            }
            if let Some(pi_number) = &input.pi_number {
                active.pi_number = Set(Some(pi_number.clone()));
            }
            if let Some(pi_amount) = input.pi_amount {
                active.pi_amount = Set(pi_amount);
            }
            if receives_pi {
                active.pi_received = Set(true);
            }
            active.status = Set(next_status);
        })
        .await?;

        let (purchase_request, outcome, outbox_event_id, skipped_products) =
            match input.payment_amount {
                Some(amount) => {
                    let applied = apply_payment(txn, saved, &items, amount).await?;
                    (
                        applied.purchase_request,
                        applied.outcome,
                        applied.outbox_event_id,
                        applied.skipped_products,
                    )
                }
                None => (saved, None, None, Vec::new()),
            };

        Ok((
            PurchaseRequestChanged {
                purchase_request: PurchaseRequestDetails {
                    purchase_request,
                    items,
                },
                outbox_event_id,
                skipped_products,
            },
            outcome,
        ))
    }
}

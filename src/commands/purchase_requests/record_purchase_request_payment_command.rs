use crate::{
    commands::{
        check_expected_version,
        purchase_requests::{
            find_purchase_request, find_purchase_request_items, save_purchase_request,
            unique_order_ids, PurchaseRequestChanged, PurchaseRequestDetails,
        },
        update_product_counters, Command,
    },
    db::DbPool,
    entities::{purchase_request, purchase_request_item},
    errors::ServiceError,
    events::{
        outbox::{enqueue, OutboxMessage, ProcurementCascade},
        Event, EventSender,
    },
    metrics::{record_command_failure, PR_PAYMENTS},
    models::{
        fulfillment::{reconcile_pr_payment, PaymentOutcome},
        PurchaseRequestStatus,
    },
};
use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Records the vendor payment made so far against a PR's proforma invoice.
/// `payment_amount` is the running total, not an increment.
#[derive(Debug, Clone)]
pub struct RecordPurchaseRequestPaymentCommand {
    pub purchase_request_id: Uuid,
    pub payment_amount: Decimal,
    pub expected_version: Option<i32>,
}

#[derive(Debug)]
pub(crate) struct PaymentApplied {
    pub purchase_request: purchase_request::Model,
    /// `None` when the request was already fully paid and nothing changed
    pub outcome: Option<PaymentOutcome>,
    pub outbox_event_id: Option<Uuid>,
    pub skipped_products: Vec<Uuid>,
}

#[async_trait::async_trait]
impl Command for RecordPurchaseRequestPaymentCommand {
    type Result = PurchaseRequestChanged;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_request_id = %self.purchase_request_id, amount = %self.payment_amount))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let command = self.clone();
        let (changed, outcome) = db_pool
            .transaction::<_, (PurchaseRequestChanged, Option<PaymentOutcome>), ServiceError>(
                |txn| Box::pin(async move { command.record_in_txn(txn).await }),
            )
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                record_command_failure("record_purchase_request_payment", &e);
                e
            })?;

        publish_payment(&event_sender, &changed, outcome).await;
        Ok(changed)
    }
}

impl RecordPurchaseRequestPaymentCommand {
    async fn record_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<(PurchaseRequestChanged, Option<PaymentOutcome>), ServiceError> {
        let current = find_purchase_request(txn, self.purchase_request_id).await?;
        check_expected_version(current.id, current.version, self.expected_version)?;
        let items = find_purchase_request_items(txn, current.id).await?;

        let applied = apply_payment(txn, current, &items, self.payment_amount).await?;
        Ok((
            PurchaseRequestChanged {
                purchase_request: PurchaseRequestDetails {
                    purchase_request: applied.purchase_request,
                    items,
                },
                outbox_event_id: applied.outbox_event_id,
                skipped_products: applied.skipped_products,
            },
            applied.outcome,
        ))
    }
}

/// Reconciles a payment with the PI amount and applies the resulting
/// transition. A full payment bumps `ordered_quantity` on every product and
/// queues the order cascade in the same transaction.
pub(crate) async fn apply_payment(
    txn: &DatabaseTransaction,
    current: purchase_request::Model,
    items: &[purchase_request_item::Model],
    payment_amount: Decimal,
) -> Result<PaymentApplied, ServiceError> {
    if !current.status.accepts_payment() {
        return Err(ServiceError::InvalidStatus(format!(
            "purchase request {} is {}; payments need a received PI",
            current.pr_number, current.status
        )));
    }

    let outcome = reconcile_pr_payment(current.pi_amount, payment_amount)?;

    if current.status == PurchaseRequestStatus::AwaitingDispatch {
        return match outcome {
            PaymentOutcome::Full => {
                debug!(pr_number = %current.pr_number, "already fully paid; nothing to do");
                Ok(PaymentApplied {
                    purchase_request: current,
                    outcome: None,
                    outbox_event_id: None,
                    skipped_products: Vec::new(),
                })
            }
            PaymentOutcome::Partial => Err(ServiceError::InvalidStatus(format!(
                "purchase request {} is already fully paid",
                current.pr_number
            ))),
        };
    }

    let purchase_request_id = current.id;
    match outcome {
        PaymentOutcome::Partial => {
            let saved = save_purchase_request(txn, current, |active| {
                active.status = Set(PurchaseRequestStatus::PartialPayment);
                active.payment_done = Set(false);
                active.payment_amount = Set(payment_amount);
            })
            .await?;
            Ok(PaymentApplied {
                purchase_request: saved,
                outcome: Some(outcome),
                outbox_event_id: None,
                skipped_products: Vec::new(),
            })
        }
        PaymentOutcome::Full => {
            let saved = save_purchase_request(txn, current, |active| {
                active.status = Set(PurchaseRequestStatus::AwaitingDispatch);
                active.payment_done = Set(true);
                active.payment_amount = Set(payment_amount);
            })
            .await?;

            let mut skipped_products = Vec::new();
            for item in items {
                let procured = item.procured_quantity();
                let updated = update_product_counters(txn, item.product_id, |product, active| {
                    active.ordered_quantity = Set(product.ordered_quantity + procured);
                })
                .await?;
                if updated.is_none() {
                    warn!(product_id = %item.product_id, "product missing; ordered quantity not updated");
                    skipped_products.push(item.product_id);
                }
            }

            let message = OutboxMessage::PurchaseRequestAwaitingDispatch(ProcurementCascade {
                purchase_request_id,
                order_ids: unique_order_ids(items),
            });
            let outbox_event_id = enqueue(txn, &message).await?;

            Ok(PaymentApplied {
                purchase_request: saved,
                outcome: Some(outcome),
                outbox_event_id: Some(outbox_event_id),
                skipped_products,
            })
        }
    }
}

pub(crate) async fn publish_payment(
    event_sender: &EventSender,
    changed: &PurchaseRequestChanged,
    outcome: Option<PaymentOutcome>,
) {
    let pr = &changed.purchase_request.purchase_request;
    let Some(outcome) = outcome else {
        return;
    };
    let label = match outcome {
        PaymentOutcome::Full => "full",
        PaymentOutcome::Partial => "partial",
    };
    PR_PAYMENTS.with_label_values(&[label]).inc();
    info!(
        pr_number = %pr.pr_number,
        status = %pr.status,
        payment_amount = %pr.payment_amount,
        "Purchase request payment recorded"
    );
    event_sender
        .send_or_log(Event::PurchaseRequestPaymentRecorded {
            purchase_request_id: pr.id,
            full_payment: outcome == PaymentOutcome::Full,
        })
        .await;
}

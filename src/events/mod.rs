use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{CancellationType, OrderStatus};

pub mod outbox;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event after the write it describes has committed. A closed
    /// channel is logged; the committed write stands.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

/// Things that happened in the fulfillment workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderPaymentUpdated {
        order_id: Uuid,
        amount_paid: Decimal,
    },
    OrderCancelled {
        order_id: Uuid,
        cancellation_type: CancellationType,
    },
    DispatchNoteCreated {
        dispatch_note_id: Uuid,
        order_id: Uuid,
        order_status: OrderStatus,
    },
    SellRecordCreated {
        sell_record_id: Uuid,
        dispatch_note_id: Uuid,
    },
    PaymentReceiptRecorded {
        receipt_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    },
    PurchaseRequestCreated(Uuid),
    PurchaseRequestUpdated(Uuid),
    PurchaseRequestPaymentRecorded {
        purchase_request_id: Uuid,
        full_payment: bool,
    },
    MaterialReceived {
        purchase_request_id: Uuid,
        skipped_products: Vec<Uuid>,
    },
    /// Linked orders were moved after a purchase request milestone
    ProcurementCascadeApplied {
        purchase_request_id: Uuid,
        target_status: OrderStatus,
        updated_orders: Vec<Uuid>,
        at: DateTime<Utc>,
    },
}

/// Drains the in-process channel. Handlers with side effects live in the
/// outbox; this loop is the log of record for everything else.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ProcurementCascadeApplied {
                purchase_request_id,
                target_status,
                updated_orders,
                ..
            } => info!(
                purchase_request_id = %purchase_request_id,
                target_status = %target_status,
                orders = updated_orders.len(),
                "procurement cascade applied"
            ),
            Event::OrderCancelled {
                order_id,
                cancellation_type,
            } => info!(order_id = %order_id, cancellation_type = %cancellation_type, "order cancelled"),
            other => info!(event = ?other, "domain event"),
        }
    }

    info!("Event channel closed; event processing loop stopped");
}

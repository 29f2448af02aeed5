pub mod common;
pub mod dispatch;
pub mod orders;
pub mod payment_receipts;
pub mod products;
pub mod purchase_requests;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::{outbox::OutboxProcessor, EventSender},
    services::{
        dispatch::DispatchService, orders::OrderService,
        payment_receipts::PaymentReceiptService, products::ProductService,
        purchase_requests::PurchaseRequestService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub dispatch: Arc<DispatchService>,
    pub purchase_requests: Arc<PurchaseRequestService>,
    pub payment_receipts: Arc<PaymentReceiptService>,
    pub products: Arc<ProductService>,
    pub outbox: Arc<OutboxProcessor>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let outbox = Arc::new(OutboxProcessor::new(
            db_pool.clone(),
            event_sender.clone(),
            config.outbox_max_attempts,
            config.outbox_batch_size,
        ));

        Self {
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                event_sender.clone(),
                config.gst_rate(),
            )),
            dispatch: Arc::new(DispatchService::new(
                db_pool.clone(),
                event_sender.clone(),
                config.allow_over_dispatch,
            )),
            purchase_requests: Arc::new(PurchaseRequestService::new(
                db_pool.clone(),
                event_sender.clone(),
                outbox.clone(),
            )),
            payment_receipts: Arc::new(PaymentReceiptService::new(
                db_pool.clone(),
                event_sender,
            )),
            products: Arc::new(ProductService::new(db_pool)),
            outbox,
        }
    }
}

pub mod fulfillment;
pub mod status;

pub use status::{
    CancellationType, OrderStatus, PaymentAdjustmentAction, PaymentStatus, PurchaseRequestStatus,
};

pub mod record_payment_receipt_command;

pub use record_payment_receipt_command::{
    PaymentReceiptRecorded, RecordPaymentReceiptCommand, RecordPaymentReceiptInput,
};

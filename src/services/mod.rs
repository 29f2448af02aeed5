// Workflow services used by the HTTP handlers
pub mod dispatch;
pub mod orders;
pub mod payment_receipts;
pub mod purchase_requests;

// Master data
pub mod products;

// Document numbering shared by the workflows
pub mod sequences;

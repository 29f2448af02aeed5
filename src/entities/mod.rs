pub mod dispatch_note;
pub mod dispatch_note_item;
pub mod document_sequence;
pub mod order;
pub mod order_group;
pub mod order_item;
pub mod outbox_event;
pub mod payment_receipt;
pub mod product;
pub mod purchase_request;
pub mod purchase_request_item;
pub mod sell_record;

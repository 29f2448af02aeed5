/*!
 * # Metrics Module
 *
 * Prometheus counters for the fulfillment workflows, exposed in text format
 * at `/metrics`.
 *
 * All collectors live in one process-wide [`Registry`]. They are created
 * lazily and registered on first use, so a counter that was never touched
 * still appears (at zero) once [`render`] has run.
 */

use axum::{http::header, http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ORDERS_CREATED: IntCounter =
        IntCounter::new("orders_created_total", "Total number of orders created")
            .expect("metric can be created");
    pub static ref ORDER_CANCELLATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("order_cancellations_total", "Total number of order cancellations"),
        &["cancellation_type"]
    )
    .expect("metric can be created");
    pub static ref DISPATCH_NOTES_CREATED: IntCounter = IntCounter::new(
        "dispatch_notes_created_total",
        "Total number of dispatch notes created"
    )
    .expect("metric can be created");
    pub static ref DISPATCH_CLAMPED_LINES: IntCounter = IntCounter::new(
        "dispatch_clamped_lines_total",
        "Dispatch lines cut down to the outstanding balance"
    )
    .expect("metric can be created");
    pub static ref PR_PAYMENTS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_request_payments_total",
            "Purchase request payments by outcome"
        ),
        &["outcome"]
    )
    .expect("metric can be created");
    pub static ref OUTBOX_DELIVERIES: IntCounterVec = IntCounterVec::new(
        Opts::new("outbox_deliveries_total", "Outbox events handled, by result"),
        &["result"]
    )
    .expect("metric can be created");
    pub static ref COMMAND_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("command_failures_total", "Failed workflow commands"),
        &["command", "error_type"]
    )
    .expect("metric can be created");
}

fn register_all() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ORDERS_CREATED.clone()),
        Box::new(ORDER_CANCELLATIONS.clone()),
        Box::new(DISPATCH_NOTES_CREATED.clone()),
        Box::new(DISPATCH_CLAMPED_LINES.clone()),
        Box::new(PR_PAYMENTS.clone()),
        Box::new(OUTBOX_DELIVERIES.clone()),
        Box::new(COMMAND_FAILURES.clone()),
    ];
    for collector in collectors {
        // AlreadyReg on repeated calls is expected
        let _ = REGISTRY.register(collector);
    }
}

/// Records a failed command under a short error label.
pub fn record_command_failure(command: &str, err: &crate::errors::ServiceError) {
    use crate::errors::ServiceError;
    let error_type = match err {
        ServiceError::NotFound(_) => "not_found",
        ServiceError::ValidationError(_) | ServiceError::BadRequest(_) => "validation",
        ServiceError::InvalidOperation(_) | ServiceError::InvalidStatus(_) => "invalid_state",
        ServiceError::PaymentAdjustmentRequired { .. } => "payment_adjustment_required",
        ServiceError::ConcurrentModification(_) | ServiceError::Conflict(_) => "conflict",
        ServiceError::DatabaseError(_) => "database",
        _ => "internal",
    };
    COMMAND_FAILURES
        .with_label_values(&[command, error_type])
        .inc();
}

/// Encodes every registered collector in the Prometheus text format.
pub fn render() -> Result<String, MetricsError> {
    register_all();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))
}

pub async fn metrics_handler() -> impl IntoResponse {
    match render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_output_contains_touched_counters() {
        DISPATCH_NOTES_CREATED.inc();
        PR_PAYMENTS.with_label_values(&["full"]).inc();
        let body = render().unwrap();
        assert!(body.contains("dispatch_notes_created_total"));
        assert!(body.contains("purchase_request_payments_total{outcome=\"full\"}"));
    }

    #[test]
    fn render_is_repeatable() {
        assert!(render().is_ok());
        assert!(render().is_ok());
    }
}

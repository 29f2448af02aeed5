use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Duration;
use fulfillment_api::{
    auth::Claims,
    config::AppConfig,
    db,
    events::{self, EventSender},
    AppState,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdefghij";

/// Application wired against a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller tweak the configuration.
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            "test".to_string(),
        );
        // Every pooled connection to sqlite::memory: is its own database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.cors_allow_any_origin = true;
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = fulfillment_api::build_router(state.clone());

        let token = Claims::new("tester-1", Duration::hours(1))
            .sign(TEST_SECRET)
            .expect("sign test token");

        Self {
            router,
            state,
            token,
            _event_task: event_task,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Sends a request with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }

    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (u16, Value) {
        let response = self.request(method, uri, body, Some(self.token())).await;
        let status = response.status().as_u16();
        (status, response_json(response).await)
    }

    /// Calls the API and returns `data`, panicking unless the status matches.
    pub async fn expect(&self, method: Method, uri: &str, body: Option<Value>, status: u16) -> Value {
        let (actual, json) = self.call(method, uri, body).await;
        assert_eq!(actual, status, "unexpected status for {}: {}", uri, json);
        json["data"].clone()
    }

    pub async fn create_product(&self, sku: &str, fresh_stock: i32) -> Value {
        self.expect(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "sku": sku, "name": format!("Product {}", sku), "fresh_stock": fresh_stock })),
            201,
        )
        .await
    }

    /// Creates an order with one group holding `(product_id, quantity, net_rate)` lines.
    pub async fn create_order(&self, lines: &[(&str, i32, &str)]) -> Value {
        let items: Vec<Value> = lines
            .iter()
            .map(|(product_id, quantity, rate)| {
                json!({ "product_id": product_id, "quantity": quantity, "net_rate": rate })
            })
            .collect();
        self.expect(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "company_id": uuid::Uuid::new_v4(),
                "party_id": uuid::Uuid::new_v4(),
                "party_name": "Acme Interiors",
                "gst_rate": "0",
                "groups": [{ "name": "Living room", "items": items }]
            })),
            201,
        )
        .await
    }

    pub async fn get_order(&self, order_id: &str) -> Value {
        self.expect(Method::GET, &format!("/api/v1/orders/{}", order_id), None, 200)
            .await
    }

    pub async fn get_product(&self, product_id: &str) -> Value {
        self.expect(Method::GET, &format!("/api/v1/products/{}", product_id), None, 200)
            .await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response")
}

/// Reads a decimal field that may be serialized as a string or a number.
pub fn dec(value: &Value) -> rust_decimal::Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}

pub fn str_of<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key]
        .as_str()
        .unwrap_or_else(|| panic!("missing string field {} in {}", key, value))
}

/// First item of the first group.
pub fn first_item(order: &Value) -> &Value {
    &order["groups"][0]["items"][0]
}

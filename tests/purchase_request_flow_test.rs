//! Purchase request lifecycle: PI, vendor payment, cascade to orders,
//! goods in transit and material receipt.

mod common;

use axum::http::Method;
use common::{dec, first_item, str_of, TestApp};
use fulfillment_api::{
    commands::{orders::ApplyProcurementCascadeCommand, Command},
    entities::outbox_event,
    events::outbox::{DeliveryOutcome, OutboxStatus},
    models::OrderStatus,
};
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use serde_json::{json, Value};
use uuid::Uuid;

struct Procurement {
    order_id: String,
    product_id: String,
    pr_id: String,
    pr_item_id: String,
}

/// Order for 10 units, a PR for all of them, and a PI for 8 worth 1000.
async fn procurement_with_pi(app: &TestApp) -> Procurement {
    let product = app.create_product(&format!("PR-{}", Uuid::new_v4().simple()), 0).await;
    let product_id = str_of(&product, "id").to_string();
    let order = app.create_order(&[(&product_id, 10, "150")]).await;
    let order_id = str_of(&order, "id").to_string();

    let pr = app
        .expect(
            Method::POST,
            "/api/v1/purchase-request",
            Some(json!({
                "vendor_name": "Teak Works",
                "items": [{ "order_id": order_id, "product_id": product_id, "quantity": 10 }]
            })),
            201,
        )
        .await;
    assert_eq!(pr["status"], "pending");
    assert!(str_of(&pr, "pr_number").starts_with("PR"));
    let pr_id = str_of(&pr, "id").to_string();
    let pr_item_id = str_of(&pr["items"][0], "id").to_string();
    assert_eq!(pr["items"][0]["order_item_id"], first_item(&order)["id"]);

    let updated = app
        .expect(
            Method::PUT,
            &format!("/api/v1/purchase-request/{}", pr_id),
            Some(json!({
                "pi_received": true,
                "pi_number": "PI-778",
                "pi_amount": "1000",
                "items": [{ "item_id": pr_item_id, "pi_received_quantity": 8 }]
            })),
            200,
        )
        .await;
    assert_eq!(updated["purchase_request"]["status"], "awaiting_payment");

    Procurement {
        order_id,
        product_id,
        pr_id,
        pr_item_id,
    }
}

async fn pay(app: &TestApp, pr_id: &str, amount: &str) -> (u16, Value) {
    app.call(
        Method::POST,
        &format!("/api/v1/purchase-request/{}/payment", pr_id),
        Some(json!({ "payment_amount": amount })),
    )
    .await
}

#[tokio::test]
async fn full_payment_cascades_orders_to_awaiting_dispatch() {
    let app = TestApp::new().await;
    let p = procurement_with_pi(&app).await;

    let (status, body) = pay(&app, &p.pr_id, "1000").await;
    assert_eq!(status, 200, "{}", body);
    let pr = &body["data"]["purchase_request"];
    assert_eq!(pr["status"], "awaiting_dispatch");
    assert_eq!(pr["payment_done"], true);

    let order = app.get_order(&p.order_id).await;
    assert_eq!(order["status"], "awaiting_dispatch");
    // PI quantity wins over the requested quantity
    assert_eq!(app.get_product(&p.product_id).await["ordered_quantity"], 8);
}

#[tokio::test]
async fn partial_payment_does_not_cascade() {
    let app = TestApp::new().await;
    let p = procurement_with_pi(&app).await;

    let (status, body) = pay(&app, &p.pr_id, "400").await;
    assert_eq!(status, 200, "{}", body);
    let pr = &body["data"]["purchase_request"];
    assert_eq!(pr["status"], "partial_payment");
    assert_eq!(pr["payment_done"], false);
    assert_eq!(dec(&pr["payment_amount"]), dec!(400));

    assert_eq!(app.get_order(&p.order_id).await["status"], "pending");
    assert_eq!(app.get_product(&p.product_id).await["ordered_quantity"], 0);

    let rows = outbox_event::Entity::find()
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert!(rows.is_empty());

    // The rest of the money completes it
    let (status, body) = pay(&app, &p.pr_id, "1000").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["purchase_request"]["status"], "awaiting_dispatch");
}

#[tokio::test]
async fn payment_needs_a_pi_first() {
    let app = TestApp::new().await;
    let product = app.create_product("NOPI-01", 0).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 2, "10")]).await;
    let pr = app
        .expect(
            Method::POST,
            "/api/v1/purchase-request",
            Some(json!({
                "items": [{ "order_id": str_of(&order, "id"), "product_id": product_id, "quantity": 2 }]
            })),
            201,
        )
        .await;

    let (status, _) = pay(&app, str_of(&pr, "id"), "100").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn pr_quantity_cannot_exceed_order_balance() {
    let app = TestApp::new().await;
    let product = app.create_product("OVER-01", 0).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 2, "10")]).await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/purchase-request",
            Some(json!({
                "items": [{ "order_id": str_of(&order, "id"), "product_id": product_id, "quantity": 3 }]
            })),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn lines_for_the_same_order_item_are_summed() {
    let app = TestApp::new().await;
    let product = app.create_product("SPLIT-01", 0).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 10, "10")]).await;
    let order_id = str_of(&order, "id");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/purchase-request",
            Some(json!({
                "items": [
                    { "order_id": order_id, "product_id": product_id, "quantity": 6 },
                    { "order_id": order_id, "product_id": product_id, "quantity": 6 }
                ]
            })),
        )
        .await;
    assert_eq!(status, 400);

    let split = app
        .expect(
            Method::POST,
            "/api/v1/purchase-request",
            Some(json!({
                "items": [
                    { "order_id": order_id, "product_id": product_id, "quantity": 6 },
                    { "order_id": order_id, "product_id": product_id, "quantity": 4 }
                ]
            })),
            201,
        )
        .await;
    assert_eq!(split["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn open_requests_count_against_the_order_balance() {
    let app = TestApp::new().await;
    let product = app.create_product("OPEN-01", 0).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 10, "10")]).await;
    let order_id = str_of(&order, "id");
    let body = |quantity: i32| {
        json!({
            "items": [{ "order_id": order_id, "product_id": product_id, "quantity": quantity }]
        })
    };

    let first = app
        .expect(Method::POST, "/api/v1/purchase-request", Some(body(6)), 201)
        .await;

    let (status, _) = app
        .call(Method::POST, "/api/v1/purchase-request", Some(body(10)))
        .await;
    assert_eq!(status, 400);
    app.expect(Method::POST, "/api/v1/purchase-request", Some(body(4)), 201)
        .await;
    let (status, _) = app
        .call(Method::POST, "/api/v1/purchase-request", Some(body(1)))
        .await;
    assert_eq!(status, 400);

    // A rejected request frees its quantity again
    app.expect(
        Method::POST,
        &format!("/api/v1/purchase-request/{}/reject", str_of(&first, "id")),
        Some(json!({ "reason": "vendor declined" })),
        200,
    )
    .await;
    app.expect(Method::POST, "/api/v1/purchase-request", Some(body(6)), 201)
        .await;
}

#[tokio::test]
async fn pi_figures_lock_once_paid() {
    let app = TestApp::new().await;
    let p = procurement_with_pi(&app).await;
    let (status, _) = pay(&app, &p.pr_id, "1000").await;
    assert_eq!(status, 200);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/v1/purchase-request/{}", p.pr_id),
            Some(json!({ "pi_amount": "1200" })),
        )
        .await;
    assert_eq!(status, 400);

    let (status, _) = pay(&app, &p.pr_id, "500").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn goods_flow_from_intrasite_to_completion() {
    let app = TestApp::new().await;
    let p = procurement_with_pi(&app).await;
    assert_eq!(pay(&app, &p.pr_id, "1000").await.0, 200);

    let changed = app
        .expect(
            Method::POST,
            &format!("/api/v1/purchase-request/{}/intrasite", p.pr_id),
            None,
            200,
        )
        .await;
    assert_eq!(changed["purchase_request"]["status"], "intrasite");
    assert_eq!(app.get_order(&p.order_id).await["status"], "intrasite");
    assert_eq!(app.get_product(&p.product_id).await["in_transit_quantity"], 8);

    // Completing before the goods arrive is refused
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/purchase-request/{}/complete", p.pr_id),
            None,
        )
        .await;
    assert_eq!(status, 400);

    let received = app
        .expect(
            Method::POST,
            &format!("/api/v1/purchase-request/{}/material-received", p.pr_id),
            Some(json!({
                "vendor_invoice_number": "VINV-55",
                "vendor_invoice_date": "2026-10-01",
                "items": [{
                    "item_id": p.pr_item_id,
                    "fresh_stock_received": 6,
                    "damaged_stock_received": 1,
                    "short_qty_received": 1
                }]
            })),
            200,
        )
        .await;
    let pr = &received["purchase_request"];
    assert_eq!(pr["status"], "intrasite");
    assert_eq!(pr["material_received"], true);
    assert_eq!(pr["items"][0]["fresh_stock_received"], 6);

    let product = app.get_product(&p.product_id).await;
    assert_eq!(product["fresh_stock"], 6);
    assert_eq!(product["damaged_stock"], 1);
    assert_eq!(product["in_transit_quantity"], 0);
    assert_eq!(product["available_for_order"], 5);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/purchase-request/{}/material-received", p.pr_id),
            Some(json!({
                "vendor_invoice_number": "VINV-56",
                "items": [{ "item_id": p.pr_item_id, "fresh_stock_received": 1 }]
            })),
        )
        .await;
    assert_eq!(status, 409);

    let completed = app
        .expect(
            Method::POST,
            &format!("/api/v1/purchase-request/{}/complete", p.pr_id),
            None,
            200,
        )
        .await;
    assert_eq!(completed["status"], "completed");
}

#[tokio::test]
async fn material_receipt_over_pi_quantity_changes_nothing() {
    let app = TestApp::new().await;
    let p = procurement_with_pi(&app).await;
    assert_eq!(pay(&app, &p.pr_id, "1000").await.0, 200);
    app.expect(
        Method::POST,
        &format!("/api/v1/purchase-request/{}/intrasite", p.pr_id),
        None,
        200,
    )
    .await;

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/purchase-request/{}/material-received", p.pr_id),
            Some(json!({
                "vendor_invoice_number": "VINV-90",
                "items": [{
                    "item_id": p.pr_item_id,
                    "fresh_stock_received": 8,
                    "short_qty_received": 1
                }]
            })),
        )
        .await;
    assert_eq!(status, 400);

    let pr = app
        .expect(Method::GET, &format!("/api/v1/purchase-request/{}", p.pr_id), None, 200)
        .await;
    assert_eq!(pr["material_received"], false);
    let product = app.get_product(&p.product_id).await;
    assert_eq!(product["fresh_stock"], 0);
    assert_eq!(product["in_transit_quantity"], 8);
}

#[tokio::test]
async fn review_approves_or_rejects_pending_requests() {
    let app = TestApp::new().await;
    let product = app.create_product("REV-01", 0).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 4, "10")]).await;
    let body = json!({
        "items": [{ "order_id": str_of(&order, "id"), "product_id": product_id, "quantity": 2 }]
    });

    let first = app
        .expect(Method::POST, "/api/v1/purchase-request", Some(body.clone()), 201)
        .await;
    let approved = app
        .expect(
            Method::POST,
            &format!("/api/v1/purchase-request/{}/approve", str_of(&first, "id")),
            None,
            200,
        )
        .await;
    assert_eq!(approved["status"], "approved");
    assert_eq!(approved["approved_by"], "tester-1");

    let second = app
        .expect(Method::POST, "/api/v1/purchase-request", Some(body), 201)
        .await;
    let second_id = str_of(&second, "id");
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/purchase-request/{}/reject", second_id),
            Some(json!({ "reason": "" })),
        )
        .await;
    assert_eq!(status, 400);

    let rejected = app
        .expect(
            Method::POST,
            &format!("/api/v1/purchase-request/{}/reject", second_id),
            Some(json!({ "reason": "vendor out of stock" })),
            200,
        )
        .await;
    assert_eq!(rejected["status"], "rejected");

    let listed = app
        .expect(Method::GET, "/api/v1/purchase-request?status=rejected", None, 200)
        .await;
    assert_eq!(listed["total"], 1);

    let (status, _) = app
        .call(Method::GET, "/api/v1/purchase-request?status=lost", None)
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn outbox_delivery_and_cascade_are_idempotent() {
    let app = TestApp::new().await;
    let p = procurement_with_pi(&app).await;
    assert_eq!(pay(&app, &p.pr_id, "1000").await.0, 200);

    let db = app.state.db.clone();
    let rows = outbox_event::Entity::find().all(db.as_ref()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, OutboxStatus::Delivered.to_string());

    let outbox = app.state.services.outbox.clone();
    assert_eq!(outbox.deliver(rows[0].id).await.unwrap(), DeliveryOutcome::Skipped);
    assert_eq!(outbox.drain_once().await.unwrap(), 0);

    let order_id: Uuid = p.order_id.parse().unwrap();
    let version_before = app.get_order(&p.order_id).await["version"].clone();
    let changed = ApplyProcurementCascadeCommand {
        purchase_request_id: p.pr_id.parse().unwrap(),
        target_status: OrderStatus::AwaitingDispatch,
        order_ids: vec![order_id],
    }
    .execute(db, app.state.event_sender.clone())
    .await
    .unwrap();
    assert!(changed.is_empty());

    let order = app.get_order(&p.order_id).await;
    assert_eq!(order["status"], "awaiting_dispatch");
    assert_eq!(order["version"], version_before);
}

#[tokio::test]
async fn cascade_never_pulls_a_dispatched_order_back() {
    let app = TestApp::new().await;
    let p = procurement_with_pi(&app).await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/dispatch",
            Some(json!({
                "order_id": p.order_id,
                "items": [{ "product_id": p.product_id, "quantity": 2 }]
            })),
        )
        .await;
    assert_eq!(status, 201);
    assert_eq!(app.get_order(&p.order_id).await["status"], "partially dispatched");

    assert_eq!(pay(&app, &p.pr_id, "1000").await.0, 200);
    assert_eq!(app.get_order(&p.order_id).await["status"], "partially dispatched");
}

async fn only_outbox_row(app: &TestApp) -> outbox_event::Model {
    let rows = outbox_event::Entity::find()
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    rows.into_iter().next().unwrap()
}

#[tokio::test]
async fn failed_cascade_keeps_payment_and_retries_until_exhausted() {
    let app = TestApp::with_config(|cfg| cfg.outbox_max_attempts = 2).await;
    let p = procurement_with_pi(&app).await;
    let db = app.state.db.clone();
    let outbox = app.state.services.outbox.clone();

    // Orders are unreachable while the payment is recorded
    db.execute_unprepared("ALTER TABLE orders RENAME TO orders_offline")
        .await
        .unwrap();

    let (status, body) = pay(&app, &p.pr_id, "1000").await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["purchase_request"]["status"], "awaiting_dispatch");

    let row = only_outbox_row(&app).await;
    assert_eq!(row.status, OutboxStatus::Pending.to_string());
    assert_eq!(row.attempts, 1);
    assert!(row.error_message.is_some());
    assert!(row.available_at > row.created_at + chrono::Duration::seconds(1));

    // Not due yet
    assert_eq!(outbox.drain_once().await.unwrap(), 0);
    assert_eq!(only_outbox_row(&app).await.attempts, 1);

    let mut due: outbox_event::ActiveModel = row.into();
    due.available_at = Set(Utc::now() - chrono::Duration::seconds(1));
    let row = due.update(db.as_ref()).await.unwrap();

    assert_eq!(outbox.deliver(row.id).await.unwrap(), DeliveryOutcome::Failed);
    let row = only_outbox_row(&app).await;
    assert_eq!(row.status, OutboxStatus::Failed.to_string());
    assert_eq!(row.attempts, 2);
    assert!(row
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("max attempts exceeded"));
    assert_eq!(outbox.drain_once().await.unwrap(), 0);

    db.execute_unprepared("ALTER TABLE orders_offline RENAME TO orders")
        .await
        .unwrap();
    assert_eq!(app.get_order(&p.order_id).await["status"], "pending");
    let pr = app
        .expect(Method::GET, &format!("/api/v1/purchase-request/{}", p.pr_id), None, 200)
        .await;
    assert_eq!(pr["status"], "awaiting_dispatch");
}

#[tokio::test]
async fn stale_claims_are_requeued_and_delivered() {
    let app = TestApp::new().await;
    let p = procurement_with_pi(&app).await;
    let db = app.state.db.clone();
    let outbox = app.state.services.outbox.clone();

    db.execute_unprepared("ALTER TABLE orders RENAME TO orders_offline")
        .await
        .unwrap();
    assert_eq!(pay(&app, &p.pr_id, "1000").await.0, 200);
    db.execute_unprepared("ALTER TABLE orders_offline RENAME TO orders")
        .await
        .unwrap();

    // A worker claimed the row and died
    let mut claimed: outbox_event::ActiveModel = only_outbox_row(&app).await.into();
    claimed.status = Set(OutboxStatus::Processing.to_string());
    claimed.available_at = Set(Utc::now() - chrono::Duration::seconds(1));
    claimed.updated_at = Set(Some(Utc::now() - chrono::Duration::minutes(10)));
    let row = claimed.update(db.as_ref()).await.unwrap();

    assert_eq!(outbox.deliver(row.id).await.unwrap(), DeliveryOutcome::Skipped);
    assert_eq!(outbox.requeue_stale().await.unwrap(), 1);
    assert_eq!(outbox.requeue_stale().await.unwrap(), 0);
    assert_eq!(
        only_outbox_row(&app).await.status,
        OutboxStatus::Pending.to_string()
    );

    assert_eq!(outbox.drain_once().await.unwrap(), 1);
    let row = only_outbox_row(&app).await;
    assert_eq!(row.status, OutboxStatus::Delivered.to_string());
    assert!(row.processed_at.is_some());
    assert_eq!(app.get_order(&p.order_id).await["status"], "awaiting_dispatch");
}

#[tokio::test]
async fn undecodable_outbox_rows_fail_without_retry() {
    let app = TestApp::new().await;
    let now = Utc::now();
    let row = outbox_event::ActiveModel {
        id: Set(Uuid::new_v4()),
        aggregate_type: Set("purchase_request".to_string()),
        aggregate_id: Set(None),
        event_type: Set("PurchaseRequestVanished".to_string()),
        payload: Set("{}".to_string()),
        status: Set(OutboxStatus::Pending.to_string()),
        attempts: Set(0),
        available_at: Set(now),
        processed_at: Set(None),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(None),
    }
    .insert(app.state.db.as_ref())
    .await
    .unwrap();

    let outbox = app.state.services.outbox.clone();
    assert_eq!(outbox.deliver(row.id).await.unwrap(), DeliveryOutcome::Failed);
    let row = only_outbox_row(&app).await;
    assert_eq!(row.status, OutboxStatus::Failed.to_string());
    assert_eq!(row.attempts, 1);
    assert!(row.error_message.is_some());
}

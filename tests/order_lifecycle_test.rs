//! End-to-end tests for orders, dispatch notes, sell records and payment receipts.

mod common;

use axum::http::Method;
use common::{dec, first_item, response_json, str_of, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn dispatch(app: &TestApp, order_id: &str, product_id: &str, quantity: i32) -> (u16, serde_json::Value) {
    app.call(
        Method::POST,
        "/api/v1/dispatch",
        Some(json!({
            "order_id": order_id,
            "vehicle_number": "KA-01-1234",
            "items": [{ "product_id": product_id, "quantity": quantity }]
        })),
    )
    .await
}

#[tokio::test]
async fn full_dispatch_moves_order_to_dispatching() {
    let app = TestApp::new().await;
    let product = app.create_product("SOFA-01", 20).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 10, "100")]).await;
    let order_id = str_of(&order, "id");
    assert_eq!(order["status"], "pending");
    assert_eq!(dec(&order["grand_total"]), dec!(1000));

    let (status, body) = dispatch(&app, order_id, product_id, 10).await;
    assert_eq!(status, 201, "{}", body);
    assert_eq!(body["data"]["order_status"], "dispatching");
    assert!(str_of(&body["data"]["dispatch_note"], "dn_number").starts_with("DN"));

    let order = app.get_order(order_id).await;
    let item = first_item(&order);
    assert_eq!(item["dispatched_quantity"], 10);
    assert_eq!(item["balance_quantity"], 0);
    assert_eq!(order["status"], "dispatching");
}

#[tokio::test]
async fn partial_dispatch_moves_order_to_partially_dispatched() {
    let app = TestApp::new().await;
    let product = app.create_product("SOFA-02", 20).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 10, "100")]).await;
    let order_id = str_of(&order, "id");

    let (status, _) = dispatch(&app, order_id, product_id, 4).await;
    assert_eq!(status, 201);

    let order = app.get_order(order_id).await;
    let item = first_item(&order);
    assert_eq!(item["dispatched_quantity"], 4);
    assert_eq!(item["balance_quantity"], 6);
    assert_eq!(order["status"], "partially dispatched");

    let notes = app
        .expect(Method::GET, &format!("/api/v1/orders/{}/dispatch-notes", order_id), None, 200)
        .await;
    assert_eq!(notes.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn over_dispatch_is_rejected_by_default() {
    let app = TestApp::new().await;
    let product = app.create_product("TABLE-01", 20).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 5, "250")]).await;
    let order_id = str_of(&order, "id");

    let (status, _) = dispatch(&app, order_id, product_id, 3).await;
    assert_eq!(status, 201);
    let (status, body) = dispatch(&app, order_id, product_id, 3).await;
    assert_eq!(status, 400, "{}", body);

    let order = app.get_order(order_id).await;
    assert_eq!(first_item(&order)["dispatched_quantity"], 3);
}

#[tokio::test]
async fn clamp_policy_cuts_dispatch_to_balance_with_warning() {
    let app = TestApp::with_config(|cfg| cfg.allow_over_dispatch = true).await;
    let product = app.create_product("TABLE-02", 20).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 5, "250")]).await;
    let order_id = str_of(&order, "id");

    let (status, body) = dispatch(&app, order_id, product_id, 8).await;
    assert_eq!(status, 201, "{}", body);
    assert!(!body["data"]["warnings"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["order_status"], "dispatching");

    let order = app.get_order(order_id).await;
    assert_eq!(first_item(&order)["dispatched_quantity"], 5);
}

#[tokio::test]
async fn cancelling_paid_order_with_refund_zeroes_money() {
    let app = TestApp::new().await;
    let product = app.create_product("LAMP-01", 0).await;
    let order = app.create_order(&[(str_of(&product, "id"), 10, "100")]).await;
    let order_id = str_of(&order, "id");

    let paid = app
        .expect(
            Method::PATCH,
            &format!("/api/v1/orders/{}/payment", order_id),
            Some(json!({ "amount_paid": "500" })),
            200,
        )
        .await;
    assert_eq!(paid["payment_status"], "partial");
    assert_eq!(dec(&paid["balance_amount"]), dec!(500));

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(json!({ "reason": "customer changed mind" })),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["requiresPaymentAdjustment"], true);

    let result = app
        .expect(
            Method::PATCH,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(json!({
                "reason": "customer changed mind",
                "payment_adjustment": { "action": "refund" }
            })),
            200,
        )
        .await;
    assert_eq!(result["cancellation_type"], "full");
    let order = &result["order"];
    assert_eq!(order["status"], "cancelled");
    assert_eq!(dec(&order["grand_total"]), dec!(0));
    assert_eq!(dec(&order["amount_paid"]), dec!(0));
    assert_eq!(order["payment_status"], "refunded");
    assert_eq!(order["cancelled_by"], "tester-1");
}

#[tokio::test]
async fn adjustment_on_an_unpaid_order_is_ignored() {
    let app = TestApp::new().await;
    let product = app.create_product("DESK-01", 0).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 2, "100")]).await;
    let target = app.create_order(&[(product_id, 1, "100")]).await;
    let order_id = str_of(&order, "id");
    let target_id = str_of(&target, "id");

    let result = app
        .expect(
            Method::PATCH,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(json!({
                "reason": "duplicate order",
                "payment_adjustment": { "action": "adjust", "target_order_id": target_id }
            })),
            200,
        )
        .await;
    assert!(result["adjusted_order"].is_null());
    let order = &result["order"];
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["payment_status"], "pending");
    assert!(order["payment_adjustment_action"].is_null());
    assert!(order["payment_adjustment_amount"].is_null());

    let target = app.get_order(target_id).await;
    assert_eq!(dec(&target["amount_paid"]), dec!(0));
    assert_eq!(target["version"], 1);
}

#[tokio::test]
async fn partial_cancellation_keeps_only_dispatched_value() {
    let app = TestApp::new().await;
    let chair = app.create_product("CHAIR-01", 50).await;
    let stool = app.create_product("STOOL-01", 50).await;
    let chair_id = str_of(&chair, "id");
    let order = app
        .create_order(&[(chair_id, 10, "50"), (str_of(&stool, "id"), 4, "20")])
        .await;
    let order_id = str_of(&order, "id");
    assert_eq!(dec(&order["grand_total"]), dec!(580));

    let (status, _) = dispatch(&app, order_id, chair_id, 3).await;
    assert_eq!(status, 201);

    let result = app
        .expect(
            Method::PATCH,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(json!({ "reason": "site closed" })),
            200,
        )
        .await;
    assert_eq!(result["cancellation_type"], "partial");

    let order = &result["order"];
    let items = order["groups"][0]["items"].as_array().unwrap();
    let chair_line = items.iter().find(|i| i["product_id"] == chair_id).unwrap();
    assert_eq!(chair_line["quantity"], 3);
    assert_eq!(chair_line["balance_quantity"], 0);
    assert_eq!(dec(&chair_line["total_amount"]), dec!(150));

    let stool_line = items.iter().find(|i| i["product_id"] != chair_id).unwrap();
    assert_eq!(stool_line["quantity"], 0);
    assert_eq!(dec(&stool_line["total_amount"]), dec!(0));

    assert_eq!(dec(&order["grand_total"]), dec!(150));
    assert_eq!(dec(&order["groups"][0]["total_amount"]), dec!(150));
}

#[tokio::test]
async fn adjust_moves_payment_to_another_order() {
    let app = TestApp::new().await;
    let product = app.create_product("BED-01", 0).await;
    let product_id = str_of(&product, "id");
    let cancelled = app.create_order(&[(product_id, 2, "400")]).await;
    let target = app.create_order(&[(product_id, 5, "400")]).await;
    let cancelled_id = str_of(&cancelled, "id");
    let target_id = str_of(&target, "id");

    app.expect(
        Method::PATCH,
        &format!("/api/v1/orders/{}/payment", cancelled_id),
        Some(json!({ "amount_paid": "300" })),
        200,
    )
    .await;

    let result = app
        .expect(
            Method::PATCH,
            &format!("/api/v1/orders/{}/cancel", cancelled_id),
            Some(json!({
                "reason": "merged into bigger order",
                "payment_adjustment": { "action": "adjust", "target_order_id": target_id }
            })),
            200,
        )
        .await;
    assert_eq!(result["adjusted_order"]["id"], target_id);

    let target = app.get_order(target_id).await;
    assert_eq!(dec(&target["amount_paid"]), dec!(300));
    assert_eq!(dec(&target["balance_amount"]), dec!(1700));
    assert_eq!(target["payment_status"], "partial");
}

#[tokio::test]
async fn adjust_without_target_is_rejected() {
    let app = TestApp::new().await;
    let product = app.create_product("BED-02", 0).await;
    let order = app.create_order(&[(str_of(&product, "id"), 1, "100")]).await;
    let order_id = str_of(&order, "id");
    app.expect(
        Method::PATCH,
        &format!("/api/v1/orders/{}/payment", order_id),
        Some(json!({ "amount_paid": "100" })),
        200,
    )
    .await;

    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(json!({ "reason": "x", "payment_adjustment": { "action": "adjust" } })),
        )
        .await;
    assert_eq!(status, 400);

    let order = app.get_order(order_id).await;
    assert_eq!(order["status"], "pending");
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let app = TestApp::new().await;
    let product = app.create_product("RUG-01", 0).await;
    let order = app.create_order(&[(str_of(&product, "id"), 1, "100")]).await;
    let order_id = str_of(&order, "id");
    let version = order["version"].as_i64().unwrap();

    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/api/v1/orders/{}/payment", order_id),
            Some(json!({ "amount_paid": "10", "expected_version": version + 5 })),
        )
        .await;
    assert_eq!(status, 409);

    let updated = app
        .expect(
            Method::PATCH,
            &format!("/api/v1/orders/{}/payment", order_id),
            Some(json!({ "amount_paid": "10", "expected_version": version })),
            200,
        )
        .await;
    assert_eq!(updated["version"].as_i64(), Some(version + 1));
}

#[tokio::test]
async fn manual_status_update_validates_names() {
    let app = TestApp::new().await;
    let product = app.create_product("RUG-02", 0).await;
    let order = app.create_order(&[(str_of(&product, "id"), 1, "100")]).await;
    let order_id = str_of(&order, "id");

    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "shipped" })),
        )
        .await;
    assert_eq!(status, 400);

    let updated = app
        .expect(
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "delivered" })),
            200,
        )
        .await;
    assert_eq!(updated["status"], "delivered");
}

#[tokio::test]
async fn sell_record_is_created_once_and_draws_down_stock() {
    let app = TestApp::new().await;
    let product = app.create_product("SHELF-01", 40).await;
    let product_id = str_of(&product, "id");
    let order = app.create_order(&[(product_id, 10, "75")]).await;

    let (status, body) = dispatch(&app, str_of(&order, "id"), product_id, 10).await;
    assert_eq!(status, 201);
    let note_id = str_of(&body["data"]["dispatch_note"], "id").to_string();
    let uri = format!("/api/v1/dispatch/{}/sell-record", note_id);

    let record = app.expect(Method::POST, &uri, None, 201).await;
    assert_eq!(record["dispatch_note_id"], note_id.as_str());
    assert_eq!(dec(&record["total_amount"]), dec!(750));

    let (status, _) = app.call(Method::POST, &uri, None).await;
    assert_eq!(status, 409);

    let note = app
        .expect(Method::GET, &format!("/api/v1/dispatch/{}", note_id), None, 200)
        .await;
    assert_eq!(note["sold"], true);
    assert_eq!(app.get_product(product_id).await["fresh_stock"], 30);
}

#[tokio::test]
async fn payment_receipts_accumulate_on_the_order() {
    let app = TestApp::new().await;
    let product = app.create_product("DESK-01", 0).await;
    let order = app.create_order(&[(str_of(&product, "id"), 4, "250")]).await;
    let order_id = str_of(&order, "id");

    for amount in ["200", "300"] {
        let recorded = app
            .expect(
                Method::POST,
                "/api/v1/payment-receipt",
                Some(json!({ "order_id": order_id, "amount": amount, "payment_mode": "neft" })),
                201,
            )
            .await;
        assert!(str_of(&recorded["receipt"], "receipt_number").starts_with("RCPT"));
    }

    let order = app.get_order(order_id).await;
    assert_eq!(dec(&order["amount_paid"]), dec!(500));
    assert_eq!(dec(&order["balance_amount"]), dec!(500));

    let receipts = app
        .expect(Method::GET, &format!("/api/v1/orders/{}/payment-receipts", order_id), None, 200)
        .await;
    assert_eq!(receipts.as_array().map(Vec::len), Some(2));

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/payment-receipt",
            Some(json!({ "order_id": order_id, "amount": "0" })),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status().as_u16(), 401);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Unauthorized: invalid token");
}

#[tokio::test]
async fn health_and_listing_work() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response_json(response).await["data"]["status"], "healthy");

    let product = app.create_product("LIST-01", 0).await;
    app.create_order(&[(str_of(&product, "id"), 1, "10")]).await;
    app.create_order(&[(str_of(&product, "id"), 2, "10")]).await;

    let page = app
        .expect(Method::GET, "/api/v1/orders?page=1&per_page=1&status=pending", None, 200)
        .await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"].as_array().map(Vec::len), Some(1));
}

//! End-to-end order flow over the HTTP API
//!
//! Drives the full lifecycle through the axum router: create an order,
//! generate a checkout preference, deliver gateway notifications, and read
//! the results back. The payment gateway is an in-process double; storage is
//! a real redb file in a temp directory.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use shop_server::collab::ProductCatalog;
use shop_server::gateway::{
    GatewayPayment, METADATA_ORDER_ID, PaymentGateway, Preference, PreferenceRequest,
};
use shop_server::{AppError, AppResult, Config, ErrorCode, OrderStore, ServerState};
use shared::models::Product;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

struct FakeGateway {
    counter: AtomicU32,
    payments: Mutex<HashMap<String, GatewayPayment>>,
}

impl FakeGateway {
    fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
            payments: Mutex::new(HashMap::new()),
        }
    }

    fn add_payment(&self, payment_id: &str, order_id: &str, status: &str, amount: f64) {
        let payment = GatewayPayment {
            id: payment_id.to_string(),
            status: status.to_string(),
            status_detail: "accredited".to_string(),
            transaction_amount: amount,
            currency_id: "COP".to_string(),
            payment_type_id: "credit_card".to_string(),
            authorization_code: Some("AUTH-77".to_string()),
            date_created: Some(chrono::Utc::now()),
            metadata: HashMap::from([(
                METADATA_ORDER_ID.to_string(),
                Value::String(order_id.to_string()),
            )]),
        };
        self.payments
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), payment);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_preference(&self, _request: &PreferenceRequest) -> AppResult<Preference> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Preference {
            id: format!("pref-{}", n),
            init_point: format!("https://gateway.test/checkout/pref-{}", n),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> AppResult<GatewayPayment> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| {
                AppError::new(ErrorCode::PaymentNotFound).with_detail("payment_id", payment_id)
            })
    }
}

struct TestApp {
    router: Router,
    state: ServerState,
    gateway: Arc<FakeGateway>,
    _work_dir: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let work_dir = tempfile::tempdir().unwrap();
    let config = Config::with_overrides(work_dir.path().to_string_lossy(), 0);

    let store = OrderStore::open(work_dir.path().join("shop.redb")).unwrap();
    let gateway = Arc::new(FakeGateway::new());
    let state = ServerState::assemble(config, store, gateway.clone()).unwrap();

    state
        .catalog
        .upsert_product(&Product {
            reference: "p1".to_string(),
            name: "Widget".to_string(),
            price: 1000.0,
            image_url: None,
            category: None,
            stock: 10,
        })
        .unwrap();

    TestApp {
        router: shop_server::api::router(state.clone()),
        state,
        gateway,
        _work_dir: work_dir,
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json_body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn create_order_body(customer: &str) -> Value {
    json!({
        "customer_id": customer,
        "line_items": [
            {"product_ref": "p1", "product_name": "Widget", "unit_price": 1000.0, "quantity": 2}
        ],
        "discount": 0.0,
        "tax": 0.0,
        "total": 2000.0
    })
}

#[tokio::test]
async fn full_order_flow_approved_payment() {
    let app = test_app();

    // Create order
    let (status, order) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(create_order_body("c1")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(order["status"], "AVAILABLE");

    // Generate checkout preference
    let uri = format!("/api/orders/{}/preference", order_id);
    let (status, checkout) = send(&app.router, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["preference_id"], "pref-1");
    assert!(
        checkout["redirect_url"]
            .as_str()
            .unwrap()
            .contains("pref-1")
    );

    // Approved payment lands via webhook
    app.gateway.add_payment("pay-1", &order_id, "approved", 2000.0);
    let (status, ack) = send(
        &app.router,
        "POST",
        "/api/payments/notifications",
        Some(json!({"type": "payment", "data": {"id": "pay-1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["code"], 0);

    // Order is paid, payment record attached
    let (status, fetched) = send(&app.router, "GET", &format!("/api/orders/{}", order_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "PAID");
    assert_eq!(fetched["payment"]["gateway_payment_id"], "pay-1");
    assert_eq!(fetched["gateway_preference_id"], "pref-1");

    // Inventory decremented exactly once, also across redelivery
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/payments/notifications",
        Some(json!({"type": "payment", "data": {"id": "pay-1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let stock = app
        .state
        .catalog
        .get_product("p1")
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 8);

    // Customer listing shows the settled order
    let (status, list) = send(&app.router, "GET", "/api/customers/c1/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_active_order_is_conflict() {
    let app = test_app();

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(create_order_body("c1")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(create_order_body("c1")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4004);
}

#[tokio::test]
async fn rejected_payment_cancels_order() {
    let app = test_app();

    let (_, order) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(create_order_body("c1")),
    )
    .await;
    let order_id = order["id"].as_str().unwrap().to_string();

    app.gateway.add_payment("pay-9", &order_id, "rejected", 2000.0);
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/payments/notifications",
        Some(json!({"type": "payment", "data": {"id": "pay-9"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = send(&app.router, "GET", &format!("/api/orders/{}", order_id), None).await;
    assert_eq!(fetched["status"], "CANCELLED");

    // Stock untouched and the customer can order again
    let stock = app
        .state
        .catalog
        .get_product("p1")
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 10);
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(create_order_body("c1")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn pending_then_approved_same_payment_settles_order() {
    let app = test_app();

    let (_, order) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(create_order_body("c1")),
    )
    .await;
    let order_id = order["id"].as_str().unwrap().to_string();

    // First notification arrives while the payment is still pending
    app.gateway.add_payment("pay-1", &order_id, "in_process", 2000.0);
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/payments/notifications",
        Some(json!({"type": "payment", "data": {"id": "pay-1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = send(&app.router, "GET", &format!("/api/orders/{}", order_id), None).await;
    assert_eq!(fetched["status"], "AVAILABLE");
    assert_eq!(fetched["payment"]["status"], "in_process");

    // The same payment id settles; the follow-up notification must apply
    app.gateway.add_payment("pay-1", &order_id, "approved", 2000.0);
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/payments/notifications",
        Some(json!({"type": "payment", "data": {"id": "pay-1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = send(&app.router, "GET", &format!("/api/orders/{}", order_id), None).await;
    assert_eq!(fetched["status"], "PAID");
    assert_eq!(fetched["payment"]["status"], "approved");
    let stock = app
        .state
        .catalog
        .get_product("p1")
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 8);
}

#[tokio::test]
async fn preference_for_paid_order_is_rejected() {
    let app = test_app();

    let (_, order) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(create_order_body("c1")),
    )
    .await;
    let order_id = order["id"].as_str().unwrap().to_string();

    app.gateway.add_payment("pay-1", &order_id, "approved", 2000.0);
    send(
        &app.router,
        "POST",
        "/api/payments/notifications",
        Some(json!({"type": "payment", "data": {"id": "pay-1"}})),
    )
    .await;

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/api/orders/{}/preference", order_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4002);
}

#[tokio::test]
async fn notification_for_unknown_order_requests_redelivery() {
    let app = test_app();
    app.gateway.add_payment("pay-1", "ghost-order", "approved", 100.0);

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/payments/notifications",
        Some(json!({"type": "payment", "data": {"id": "pay-1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    // Failure status only; no error detail leaks to the gateway
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn non_payment_notification_is_acknowledged() {
    let app = test_app();
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/payments/notifications",
        Some(json!({"type": "merchant_order", "data": {"id": "55"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_order_lookup_is_not_found() {
    let app = test_app();
    let (status, body) = send(&app.router, "GET", "/api/orders/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);
}

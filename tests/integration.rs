use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use food_dispatch::api::rest::router;
use food_dispatch::config::Config;
use food_dispatch::mail::MemoryMailer;
use food_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

const CUSTOMER_AT: (f64, f64) = (12.9716, 77.5946);
const COURIER_AT: (f64, f64) = (12.9720, 77.5950);

struct TestApp {
    app: Router,
    mailer: Arc<MemoryMailer>,
}

fn setup() -> TestApp {
    setup_with(Config::default())
}

fn setup_with(config: Config) -> TestApp {
    let mailer = Arc::new(MemoryMailer::new());
    let state = AppState::in_memory(config, mailer.clone());
    TestApp {
        app: router(Arc::new(state)),
        mailer,
    }
}

fn json_request(method: &str, uri: &str, caller: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(caller) = caller {
        builder = builder.header("x-user-id", caller);
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str, caller: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(caller) = caller {
        builder = builder.header("x-user-id", caller);
    }
    builder.body(Body::empty()).unwrap()
}

fn patch_request(uri: &str, caller: &str, body: Value) -> Request<Body> {
    json_request("PATCH", uri, Some(caller), body)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn create_user(app: &Router, email: &str, role: &str, at: Option<(f64, f64)>) -> String {
    let location = at.map(|(lat, lng)| json!({ "lat": lat, "lng": lng }));
    let (status, body) = call(
        app,
        json_request(
            "POST",
            "/users",
            None,
            json!({
                "fullname": email.split('@').next().unwrap(),
                "email": email,
                "mobile": "9000000000",
                "role": role,
                "location": location,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn create_shop(app: &Router, owner: &str) -> String {
    let (status, body) = call(
        app,
        json_request(
            "POST",
            "/shops",
            None,
            json!({ "name": "Dosa Corner", "owner": owner, "address": "MG Road" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn place_order(app: &Router, customer: &str, shop: &str) -> Value {
    let (status, body) = call(
        app,
        json_request(
            "POST",
            "/order",
            Some(customer),
            json!({
                "payment_method": "cod",
                "delivery_address": {
                    "text": "12 Residency Road",
                    "latitude": CUSTOMER_AT.0,
                    "longitude": CUSTOMER_AT.1,
                },
                "delivery_mobile": "9111111111",
                "cart_items": [
                    { "item": uuid(), "shop": shop, "name": "Masala Dosa", "price": 12000, "quantity": 2 },
                    { "item": uuid(), "shop": shop, "name": "Filter Coffee", "price": 4000, "quantity": 1 },
                ],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

fn uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

struct Scenario {
    customer: String,
    owner: String,
    shop: String,
    order_id: String,
    shop_order_id: String,
}

async fn scenario(app: &Router) -> Scenario {
    let customer = create_user(app, "asha@example.com", "user", None).await;
    let owner = create_user(app, "ravi@example.com", "owner", None).await;
    let shop = create_shop(app, &owner).await;
    let order = place_order(app, &customer, &shop).await;
    Scenario {
        customer,
        owner,
        shop,
        order_id: order["id"].as_str().unwrap().to_string(),
        shop_order_id: order["shop_orders"][0]["id"].as_str().unwrap().to_string(),
    }
}

async fn dispatch(app: &Router, s: &Scenario) -> (StatusCode, Value) {
    call(
        app,
        patch_request(
            &format!("/order/{}/shop/{}/status", s.order_id, s.shop),
            &s.owner,
            json!({ "status": "out_for_delivery" }),
        ),
    )
    .await
}

async fn accept(app: &Router, courier: &str, assignment: &str) -> (StatusCode, Value) {
    call(
        app,
        json_request(
            "POST",
            &format!("/delivery/assignments/{assignment}/accept"),
            Some(courier),
            json!({}),
        ),
    )
    .await
}

#[tokio::test]
async fn health_returns_ok() {
    let t = setup();
    let response = t.app.oneshot(get_request("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["assignments"], 0);
    assert_eq!(body["active_deliveries"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let t = setup();
    let response = t.app.oneshot(get_request("/metrics", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_assignments"));
}

#[tokio::test]
async fn create_user_rejects_bad_input() {
    let t = setup();

    let (status, body) = call(
        &t.app,
        json_request(
            "POST",
            "/users",
            None,
            json!({ "fullname": "  ", "email": "a@b.c", "role": "user" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = call(
        &t.app,
        json_request(
            "POST",
            "/users",
            None,
            json!({
                "fullname": "Far",
                "email": "far@b.c",
                "role": "deliveryboy",
                "location": { "lat": 123.0, "lng": 0.0 },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let t = setup();
    create_user(&t.app, "dup@example.com", "user", None).await;

    let (status, _) = call(
        &t.app,
        json_request(
            "POST",
            "/users",
            None,
            json!({ "fullname": "Dup", "email": "DUP@example.com", "role": "user" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shop_owner_must_have_owner_role() {
    let t = setup();
    let customer = create_user(&t.app, "c@example.com", "user", None).await;

    let (status, _) = call(
        &t.app,
        json_request(
            "POST",
            "/shops",
            None,
            json!({ "name": "Nope", "owner": customer }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_caller_header_is_unauthorized() {
    let t = setup();
    let (status, body) = call(&t.app, get_request("/order/my-orders", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn place_order_splits_by_shop_and_adds_fee() {
    let t = setup();
    let s = scenario(&t.app).await;

    let (status, order) = call(
        &t.app,
        get_request(&format!("/order/{}", s.order_id), Some(&s.customer)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(order["shop_orders"].as_array().unwrap().len(), 1);
    assert_eq!(order["shop_orders"][0]["subtotal"], 28_000);
    assert_eq!(order["shop_orders"][0]["status"], "pending");
    assert_eq!(order["delivery_fee"], 5_000);
    assert_eq!(order["total_amount"], 33_000);
    assert!(order["shop_orders"][0].get("delivery_code").is_none());

    let (_, mine) = call(&t.app, get_request("/order/my-orders", Some(&s.customer))).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, owned) = call(&t.app, get_request("/order/owner-orders", Some(&s.owner))).await;
    assert_eq!(owned.as_array().unwrap().len(), 1);

    let stranger = create_user(&t.app, "x@example.com", "user", None).await;
    let (status, _) = call(
        &t.app,
        get_request(&format!("/order/{}", s.order_id), Some(&stranger)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn dispatch_without_couriers_is_unavailable() {
    let t = setup();
    let s = scenario(&t.app).await;

    let (status, body) = dispatch(&t.app, &s).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "no_available_courier");
}

#[tokio::test]
async fn status_rules_are_enforced() {
    let t = setup();
    let s = scenario(&t.app).await;
    let uri = format!("/order/{}/shop/{}/status", s.order_id, s.shop);

    let (status, body) = call(
        &t.app,
        patch_request(&uri, &s.owner, json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = call(
        &t.app,
        patch_request(&uri, &s.customer, json!({ "status": "preparing" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &t.app,
        patch_request(&uri, &s.owner, json!({ "status": "preparing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shop_order"]["status"], "preparing");

    let (status, body) = call(
        &t.app,
        patch_request(&uri, &s.owner, json!({ "status": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn full_delivery_flow() {
    let t = setup();
    let s = scenario(&t.app).await;
    let courier = create_user(&t.app, "kiran@example.com", "deliveryboy", Some(COURIER_AT)).await;
    let far = create_user(&t.app, "far@example.com", "deliveryboy", Some((13.3, 77.9))).await;

    let (status, update) = dispatch(&t.app, &s).await;
    assert_eq!(status, StatusCode::OK, "{update}");
    assert_eq!(update["shop_order"]["status"], "out_for_delivery");
    let candidates = update["broadcasted_to"].as_array().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0]["id"], courier.as_str());
    let assignment = update["assignment"].as_str().unwrap().to_string();

    let (_, offers) = call(&t.app, get_request("/delivery/assignments", Some(&courier))).await;
    assert_eq!(offers.as_array().unwrap().len(), 1);
    assert_eq!(offers[0]["id"], assignment.as_str());
    assert_eq!(offers[0]["subtotal"], 28_000);

    let (_, offers) = call(&t.app, get_request("/delivery/assignments", Some(&far))).await;
    assert!(offers.as_array().unwrap().is_empty());

    let (status, accepted) = accept(&t.app, &courier, &assignment).await;
    assert_eq!(status, StatusCode::OK, "{accepted}");
    assert_eq!(accepted["assignment"]["status"], "assigned");
    assert_eq!(accepted["shop_order"]["assigned_courier"], courier.as_str());

    let (status, body) = accept(&t.app, &courier, &assignment).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "assignment_expired");

    let (status, current) = call(&t.app, get_request("/delivery/current", Some(&courier))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["shop_order"]["id"], s.shop_order_id.as_str());
    assert_eq!(current["customer"]["email"], "asha@example.com");
    assert_eq!(current["delivery_mobile"], "9111111111");

    let code_body = json!({ "order_id": s.order_id, "shop_order_id": s.shop_order_id });
    let (status, _) = call(
        &t.app,
        json_request("POST", "/order/delivery-code/send", Some(&far), code_body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, issued) = call(
        &t.app,
        json_request("POST", "/order/delivery-code/send", Some(&courier), code_body),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{issued}");
    assert_eq!(issued["mailed"], true);

    let code = t.mailer.last_code_for("asha@example.com").unwrap();
    assert_eq!(code.len(), 6);
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let (status, body) = call(
        &t.app,
        json_request(
            "POST",
            "/order/delivery-code/verify",
            Some(&courier),
            json!({ "order_id": s.order_id, "shop_order_id": s.shop_order_id, "code": wrong }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_code");

    let (status, delivered) = call(
        &t.app,
        json_request(
            "POST",
            "/order/delivery-code/verify",
            Some(&courier),
            json!({ "order_id": s.order_id, "shop_order_id": s.shop_order_id, "code": code }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{delivered}");
    assert_eq!(delivered["shop_order"]["status"], "delivered");
    assert!(delivered["shop_order"]["delivered_at"].is_string());

    let (status, _) = call(&t.app, get_request("/delivery/current", Some(&courier))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, health) = call(&t.app, get_request("/health", None)).await;
    assert_eq!(health["active_deliveries"], 0);
}

#[tokio::test]
async fn rebroadcast_replaces_open_offer() {
    let t = setup();
    let s = scenario(&t.app).await;
    let courier = create_user(&t.app, "k@example.com", "deliveryboy", Some(COURIER_AT)).await;

    let (_, update) = dispatch(&t.app, &s).await;
    let first = update["assignment"].as_str().unwrap().to_string();

    let (status, outcome) = call(
        &t.app,
        json_request(
            "POST",
            &format!("/order/{}/shop/{}/rebroadcast", s.order_id, s.shop),
            Some(&s.owner),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert_ne!(outcome["assignment"]["id"], first.as_str());

    let (status, body) = accept(&t.app, &courier, &first).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "assignment_expired");
}

#[tokio::test]
async fn force_deliver_is_disabled_without_token() {
    let t = setup();
    let s = scenario(&t.app).await;

    let (status, _) = call(
        &t.app,
        json_request(
            "POST",
            &format!(
                "/admin/order/{}/shop-order/{}/force-deliver",
                s.order_id, s.shop_order_id
            ),
            None,
            json!({ "reason": "customer unreachable" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn force_deliver_with_admin_token() {
    let t = setup_with(Config {
        admin_token: Some("s3cret".to_string()),
        ..Config::default()
    });
    let s = scenario(&t.app).await;
    let uri = format!(
        "/admin/order/{}/shop-order/{}/force-deliver",
        s.order_id, s.shop_order_id
    );

    let (status, _) = call(
        &t.app,
        json_request("POST", &uri, None, json!({ "reason": "support ticket 42" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("content-type", "application/json")
        .header("x-admin-token", "s3cret")
        .body(Body::from(
            json!({ "reason": "support ticket 42" }).to_string(),
        ))
        .unwrap();
    let (status, body) = call(&t.app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "delivered");
}

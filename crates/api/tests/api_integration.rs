//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use domain::{InMemoryDomainEventPublisher, OrderService};
use messaging::collaborators::payment::TransactionStatus;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::InMemoryOrderStore;
use serde_json::{Value, json};
use tower::ServiceExt;

use api::Runtime;
use api::config::Config;
use api::routes::orders::AppState;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let state = Arc::new(AppState {
        orders: OrderService::new(
            InMemoryOrderStore::new(),
            InMemoryDomainEventPublisher::new(),
        ),
    });
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &axum::Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn create_order(app: &axum::Router, user_id: i64, amount: f64) -> Value {
    let response = send(
        app,
        post_json(
            "/orders",
            &json!({ "userId": user_id, "productId": 3, "amount": amount }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = send(&app, get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_create_order_rounds_price() {
    let app = setup();

    let order = create_order(&app, 1, 19.995).await;

    assert_eq!(order["price"], "20.00");
    assert_eq!(order["status"], "CREATED");
    assert_eq!(order["userId"], 1);
    assert_eq!(order["productId"], 3);
    assert_eq!(order["version"], 1);
    assert!(order["id"].as_str().is_some());
}

#[tokio::test]
async fn test_create_order_rejects_negative_amount() {
    let app = setup();

    let response = send(
        &app,
        post_json(
            "/orders",
            &json!({ "userId": 1, "productId": 3, "amount": -5.0 }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].as_str().is_some());
}

#[tokio::test]
async fn test_create_order_rejects_non_positive_ids() {
    let app = setup();

    let response = send(
        &app,
        post_json(
            "/orders",
            &json!({ "userId": 0, "productId": 3, "amount": 5.0 }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from("{\"userId\": 1,"))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_and_get_order() {
    let app = setup();
    let created = create_order(&app, 2, 12.5).await;
    let id = created["id"].as_str().unwrap();

    let response = send(&app, get(&format!("/orders/{id}"))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let order = json_body(response).await;
    assert_eq!(order["id"], id);
    assert_eq!(order["price"], "12.50");
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();

    let response = send(
        &app,
        get("/orders/00000000-0000-0000-0000-000000000000"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let app = setup();

    let response = send(&app, get("/orders/not-a-uuid")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_filters_by_user_and_status() {
    let app = setup();
    create_order(&app, 10, 1.0).await;
    create_order(&app, 10, 2.0).await;
    let other = create_order(&app, 11, 3.0).await;
    let other_id = other["id"].as_str().unwrap();
    send(&app, post_empty(&format!("/orders/{other_id}/cancel"))).await;

    let by_user = json_body(send(&app, get("/orders?userId=10")).await).await;
    assert_eq!(by_user.as_array().unwrap().len(), 2);

    let cancelled = json_body(send(&app, get("/orders?status=CANCELLED")).await).await;
    let cancelled = cancelled.as_array().unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0]["id"], other_id);

    let page = json_body(send(&app, get("/orders?limit=1")).await).await;
    assert_eq!(page.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_orders_rejects_unknown_status() {
    let app = setup();

    let response = send(&app, get("/orders?status=SHIPPED")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_twice_conflicts() {
    let app = setup();
    let created = create_order(&app, 4, 9.99).await;
    let id = created["id"].as_str().unwrap();

    let first = send(&app, post_empty(&format!("/orders/{id}/cancel"))).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(json_body(first).await["status"], "CANCELLED");

    let second = send(&app, post_empty(&format!("/orders/{id}/cancel"))).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = json_body(second).await;
    assert_eq!(body["currentStatus"], "CANCELLED");
    assert_eq!(body["attemptedAction"], "cancel");
}

#[tokio::test]
async fn test_cancel_unknown_order_is_not_found() {
    let app = setup();

    let response = send(
        &app,
        post_empty("/orders/00000000-0000-0000-0000-000000000000/cancel"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();

    let response = send(&app, get("/metrics")).await;

    assert_eq!(response.status(), StatusCode::OK);
}

async fn wait_for_status(app: &axum::Router, id: &str, status: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let order = json_body(send(app, get(&format!("/orders/{id}"))).await).await;
            if order["status"] == status {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("order {id} never reached {status}"));
}

async fn start_runtime(stock: u32) -> Runtime<InMemoryOrderStore> {
    let config = Config {
        simulate_collaborators: true,
        simulator_initial_stock: stock,
        ..Config::default()
    };
    Runtime::start(InMemoryOrderStore::new(), &config)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_runtime_runs_saga_to_completion() {
    let runtime = start_runtime(10).await;
    let app = runtime.router(get_metrics_handle());

    let created = create_order(&app, 5, 25.0).await;
    wait_for_status(&app, created["id"].as_str().unwrap(), "COMPLETED").await;

    let payment = runtime.payment.as_ref().unwrap();
    assert_eq!(payment.balance(5).await.cents(), 97_500);
    runtime.shutdown().await;
}

#[tokio::test]
async fn test_balance_drops_on_charge_and_recovers_on_refund() {
    let runtime = start_runtime(1).await;
    let app = runtime.router(get_metrics_handle());

    let unknown = send(&app, get("/payments/balance/6")).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let first = create_order(&app, 6, 25.0).await;
    wait_for_status(&app, first["id"].as_str().unwrap(), "COMPLETED").await;

    let response = send(&app, get("/payments/balance/6")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["userId"], 6);
    assert_eq!(body["balance"], "975.00");

    // Stock is gone, so the second order is charged, rejected, and refunded.
    let second = create_order(&app, 6, 40.0).await;
    let second_id = second["id"].as_str().unwrap().to_string();
    wait_for_status(&app, &second_id, "CANCELLED").await;

    let payment = runtime.payment.as_ref().unwrap();
    let order_id = second_id.parse().unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while payment.transaction_status(order_id).await != Some(TransactionStatus::Refunded) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("refund was not applied");

    let body = json_body(send(&app, get("/payments/balance/6")).await).await;
    assert_eq!(body["balance"], "975.00");
    runtime.shutdown().await;
}

#[tokio::test]
async fn test_balance_route_without_simulators() {
    let config = Config {
        simulate_collaborators: false,
        ..Config::default()
    };
    let runtime = Runtime::start(InMemoryOrderStore::new(), &config)
        .await
        .unwrap();
    let app = runtime.router(get_metrics_handle());

    let missing = send(&app, get("/payments/balance/1")).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let invalid = send(&app, get("/payments/balance/abc")).await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    runtime.shutdown().await;
}

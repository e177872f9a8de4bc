//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{BookId, CustomerId, Money};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{Book, InMemoryStore, OrderStore};
use tower::ServiceExt;

use api::auth::StaticTokenVerifier;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const TOKEN: &str = "test-token";

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
    customer_id: CustomerId,
}

async fn setup() -> TestApp {
    let store = InMemoryStore::new();
    let verifier = Arc::new(StaticTokenVerifier::new());
    let customer_id = CustomerId::new();
    verifier.register(TOKEN, customer_id);

    let state = api::create_state(store.clone(), verifier);
    let app = api::create_app(state, get_metrics_handle());
    TestApp {
        app,
        store,
        customer_id,
    }
}

async fn seed_book(store: &InMemoryStore, price_cents: i64, stock: i64) -> BookId {
    let book = Book {
        id: BookId::new(),
        title: "Clean Architecture".to_string(),
        isbn: "978-0134494166".to_string(),
        price: Money::from_cents(price_cents),
        publication_year: 2017,
        stock,
    };
    store.insert_book(&book).await.unwrap();
    book.id
}

fn checkout_request(token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn history_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/orders/history");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let test = setup().await;

    let response = test
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_checkout_places_order_and_decrements_stock() {
    let test = setup().await;
    let book_id = seed_book(&test.store, 1500, 4).await;

    let response = test
        .app
        .oneshot(checkout_request(
            Some(TOKEN),
            serde_json::json!({
                "shipping_address": "12 Shelf Lane",
                "lines": [{"book_id": book_id.as_uuid(), "quantity": 2}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["total_amount_cents"], 3000);
    assert!(json["order_id"].is_string());

    assert_eq!(test.store.get_book(book_id).await.unwrap().unwrap().stock, 2);
}

#[tokio::test]
async fn test_checkout_ignores_client_supplied_total() {
    let test = setup().await;
    let book_id = seed_book(&test.store, 2000, 10).await;

    let response = test
        .app
        .oneshot(checkout_request(
            Some(TOKEN),
            serde_json::json!({
                "shipping_address": "1 Main St",
                "total_amount": 1,
                "lines": [{"book_id": book_id.as_uuid(), "quantity": 1, "price": 1}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["total_amount_cents"], 2000);
}

#[tokio::test]
async fn test_checkout_without_credential_is_unauthorized() {
    let test = setup().await;
    let book_id = seed_book(&test.store, 1000, 1).await;

    let response = test
        .app
        .oneshot(checkout_request(
            None,
            serde_json::json!({
                "shipping_address": "1 Main St",
                "lines": [{"book_id": book_id.as_uuid(), "quantity": 1}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(test.store.get_book(book_id).await.unwrap().unwrap().stock, 1);
}

#[tokio::test]
async fn test_checkout_with_unknown_credential_is_forbidden() {
    let test = setup().await;
    let book_id = seed_book(&test.store, 1000, 1).await;

    let response = test
        .app
        .oneshot(checkout_request(
            Some("wrong-token"),
            serde_json::json!({
                "shipping_address": "1 Main St",
                "lines": [{"book_id": book_id.as_uuid(), "quantity": 1}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_empty_cart_is_a_bad_request() {
    let test = setup().await;

    let response = test
        .app
        .oneshot(checkout_request(
            Some(TOKEN),
            serde_json::json!({"shipping_address": "1 Main St", "lines": []}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_zero_quantity_line_is_a_bad_request() {
    let test = setup().await;
    let book_id = seed_book(&test.store, 1000, 5).await;

    let response = test
        .app
        .oneshot(checkout_request(
            Some(TOKEN),
            serde_json::json!({
                "shipping_address": "1 Main St",
                "lines": [{"book_id": book_id.as_uuid(), "quantity": 0}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_book_conflicts() {
    let test = setup().await;

    let response = test
        .app
        .oneshot(checkout_request(
            Some(TOKEN),
            serde_json::json!({
                "shipping_address": "1 Main St",
                "lines": [{"book_id": uuid::Uuid::new_v4(), "quantity": 1}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_insufficient_stock_conflicts_and_reports_detail() {
    let test = setup().await;
    let book_id = seed_book(&test.store, 1000, 1).await;

    let response = test
        .app
        .oneshot(checkout_request(
            Some(TOKEN),
            serde_json::json!({
                "shipping_address": "1 Main St",
                "lines": [{"book_id": book_id.as_uuid(), "quantity": 3}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("requested 3"));
    assert!(message.contains("available 1"));

    assert_eq!(test.store.get_book(book_id).await.unwrap().unwrap().stock, 1);
}

#[tokio::test]
async fn test_history_returns_nested_orders_most_recent_first() {
    let test = setup().await;
    let book_id = seed_book(&test.store, 1200, 10).await;

    for quantity in [1u32, 2] {
        let response = test
            .app
            .clone()
            .oneshot(checkout_request(
                Some(TOKEN),
                serde_json::json!({
                    "shipping_address": "1 Main St",
                    "lines": [{"book_id": book_id.as_uuid(), "quantity": quantity}]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = test
        .app
        .oneshot(history_request(Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);

    // Most recent order (quantity 2) first.
    assert_eq!(orders[0]["total_amount_cents"], 2400);
    assert_eq!(orders[1]["total_amount_cents"], 1200);
    assert_eq!(orders[0]["status"], "Pending");

    let items = orders[0]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Clean Architecture");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["price_at_order_time_cents"], 1200);
}

#[tokio::test]
async fn test_history_without_credential_is_unauthorized() {
    let test = setup().await;

    let response = test.app.oneshot(history_request(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_history_for_fresh_customer_is_empty() {
    let test = setup().await;
    let _ = test.customer_id;

    let response = test
        .app
        .oneshot(history_request(Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

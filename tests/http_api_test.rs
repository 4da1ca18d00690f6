mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use rust_decimal_macros::dec;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use replenish_api::{
    app_router,
    services::purchase_orders::{CreatePurchaseOrderInput, PurchaseOrderItemInput},
};

use common::TestApp;

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = TestApp::new().await;
    let router = app_router(app.state.clone());

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .expect("health request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_endpoint_accepts_valid_payloads_and_rejects_empty_ones() {
    let app = TestApp::new().await;
    let router = app_router(app.state.clone());
    let supplier = app.seed_supplier(true).await;
    let product = app.seed_product(None).await;

    let payload = json!({
        "organization_id": Uuid::new_v4(),
        "supplier_id": supplier,
        "location_id": Uuid::new_v4(),
        "items": [{ "product_id": product, "quantity": "3", "unit_price": "2.50" }],
    });
    let response = router
        .clone()
        .oneshot(json_post("/api/v1/purchase-orders", payload))
        .await
        .expect("create request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let empty_items = json!({
        "organization_id": Uuid::new_v4(),
        "supplier_id": supplier,
        "location_id": Uuid::new_v4(),
        "items": [],
    });
    let response = router
        .oneshot(json_post("/api/v1/purchase-orders", empty_items))
        .await
        .expect("invalid create request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lifecycle_routes_map_service_outcomes_to_statuses() {
    let app = TestApp::new().await;
    let router = app_router(app.state.clone());
    let supplier = app.seed_supplier(true).await;
    let product = app.seed_product(None).await;

    let po_id = app
        .state
        .services
        .purchase_orders
        .create_purchase_order(CreatePurchaseOrderInput {
            organization_id: Uuid::new_v4(),
            supplier_id: supplier,
            po_type: replenish_api::entities::purchase_order::PurchaseOrderType::Inbound,
            location_id: Uuid::new_v4(),
            items: vec![PurchaseOrderItemInput {
                product_id: product,
                quantity: dec!(1),
                unit_price: dec!(1.00),
            }],
            tax_amount: None,
            shipping_cost: None,
            discount: None,
            idempotency_key: None,
            created_by: None,
            expected_delivery_date: None,
            notes: None,
        })
        .await
        .expect("create po")
        .po_id;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/purchase-orders/{}", po_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("get request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(json_post(
            &format!("/api/v1/purchase-orders/{}/submit", po_id),
            json!({}),
        ))
        .await
        .expect("submit request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Submitting twice is an illegal transition.
    let response = router
        .clone()
        .oneshot(json_post(
            &format!("/api/v1/purchase-orders/{}/submit", po_id),
            json!({}),
        ))
        .await
        .expect("repeated submit request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/purchase-orders/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("missing po request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

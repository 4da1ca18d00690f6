use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{purchase_order, purchase_order_line, purchase_order::PurchaseOrderType},
    errors::ServiceError,
    services::purchase_orders::{
        CreatePurchaseOrderInput, CreatePurchaseOrderResult, PurchaseOrderItemInput,
    },
    services::receiving::{ItemCondition, ReceiveItemInput, ReceiveResult},
    AppState,
};

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// Request and response DTOs

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseOrderRequest {
    pub organization_id: Uuid,
    pub supplier_id: Uuid,
    #[serde(default = "default_po_type")]
    pub po_type: PurchaseOrderType,
    pub location_id: Uuid,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<PurchaseOrderItemRequest>,
    pub tax_amount: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub created_by: Option<Uuid>,
    pub expected_delivery_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn default_po_type() -> PurchaseOrderType {
    PurchaseOrderType::Inbound
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiveItemsRequest {
    pub location_id: Uuid,
    pub received_by: Option<Uuid>,
    pub items: Vec<ReceiveItemRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiveItemRequest {
    pub line_id: Uuid,
    pub quantity: Decimal,
    pub condition: ItemCondition,
    pub quality_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseOrderResponse {
    #[serde(flatten)]
    pub purchase_order: purchase_order::Model,
    pub lines: Vec<purchase_order_line::Model>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/:id", get(get_purchase_order))
        .route("/:id/submit", post(submit_purchase_order))
        .route("/:id/approve", post(approve_purchase_order))
        .route("/:id/order", post(mark_ordered))
        .route("/:id/cancel", post(cancel_purchase_order))
        .route("/:id/receive", post(receive_items))
}

async fn create_purchase_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<(StatusCode, Json<CreatePurchaseOrderResult>), ServiceError> {
    payload.validate()?;

    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let input = CreatePurchaseOrderInput {
        organization_id: payload.organization_id,
        supplier_id: payload.supplier_id,
        po_type: payload.po_type,
        location_id: payload.location_id,
        items: payload
            .items
            .into_iter()
            .map(|item| PurchaseOrderItemInput {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
        tax_amount: payload.tax_amount,
        shipping_cost: payload.shipping_cost,
        discount: payload.discount,
        idempotency_key,
        created_by: payload.created_by,
        expected_delivery_date: payload.expected_delivery_date,
        notes: payload.notes,
    };

    let result = state.services.purchase_orders.create_purchase_order(input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseOrderResponse>, ServiceError> {
    let po = state
        .services
        .purchase_orders
        .get_purchase_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("purchase order {} not found", id)))?;
    let lines = state
        .services
        .purchase_orders
        .get_purchase_order_lines(id)
        .await?;
    Ok(Json(PurchaseOrderResponse {
        purchase_order: po,
        lines,
    }))
}

async fn submit_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.receiving.submit_purchase_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.receiving.approve_purchase_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_ordered(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.receiving.mark_ordered(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.receiving.cancel_purchase_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn receive_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReceiveItemsRequest>,
) -> Result<Json<ReceiveResult>, ServiceError> {
    let items = payload
        .items
        .into_iter()
        .map(|item| ReceiveItemInput {
            line_id: item.line_id,
            quantity: item.quantity,
            condition: item.condition,
            quality_notes: item.quality_notes,
        })
        .collect();

    let result = state
        .services
        .receiving
        .receive_items(id, payload.location_id, items, payload.received_by)
        .await?;
    Ok(Json(result))
}

//! Replenish API Library
//!
//! Inventory replenishment core: idempotent purchase order creation, a
//! partial-receipt state machine that accumulates per-location stock, and a
//! rerun-safe cost backfill for sold items.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use axum::{response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the full service graph over one connection pool.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let inventory = services::inventory::InventoryService::new(db.clone());
        let purchase_orders = services::purchase_orders::PurchaseOrderService::new(
            db.clone(),
            event_sender.clone(),
        );
        let receiving = services::receiving::ReceivingService::new(
            db.clone(),
            inventory.clone(),
            event_sender.clone(),
        );
        let cost_resolution =
            services::cost_resolution::CostResolutionService::new(db.clone(), event_sender.clone())
                .with_page_size(config.backfill_page_size);

        let services = handlers::AppServices {
            purchase_orders: Arc::new(purchase_orders),
            receiving: Arc::new(receiving),
            inventory: Arc::new(inventory),
            cost_resolution: Arc::new(cost_resolution),
        };

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Builds the application router with middleware applied.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", handlers::api_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

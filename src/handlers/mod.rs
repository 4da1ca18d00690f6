pub mod cost;
pub mod purchase_orders;

use std::sync::Arc;

use axum::Router;

use crate::services::{
    cost_resolution::CostResolutionService, inventory::InventoryService,
    purchase_orders::PurchaseOrderService, receiving::ReceivingService,
};
use crate::AppState;

/// Service container handed to every handler through [`AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub receiving: Arc<ReceivingService>,
    pub inventory: Arc<InventoryService>,
    pub cost_resolution: Arc<CostResolutionService>,
}

/// All versioned API routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/purchase-orders", purchase_orders::routes())
        .nest("/cost-backfill", cost::routes())
}

use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};

use crate::{
    errors::ServiceError,
    services::cost_resolution::{BackfillScope, BackfillSummary, CogsSummary},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/run", post(run_backfill))
        .route("/recalculate-cogs", post(recalculate_cogs))
}

async fn run_backfill(
    State(state): State<AppState>,
    scope: Option<Json<BackfillScope>>,
) -> Result<Json<BackfillSummary>, ServiceError> {
    let scope = scope.map(|Json(s)| s).unwrap_or_default();
    let summary = state.services.cost_resolution.run_backfill(scope).await?;
    Ok(Json(summary))
}

async fn recalculate_cogs(
    State(state): State<AppState>,
    scope: Option<Json<BackfillScope>>,
) -> Result<Json<CogsSummary>, ServiceError> {
    let scope = scope.map(|Json(s)| s).unwrap_or_default();
    let summary = state
        .services
        .cost_resolution
        .recalculate_order_cogs(scope)
        .await?;
    Ok(Json(summary))
}

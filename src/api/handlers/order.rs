//! Thin HTTP adapter over the submission port (C4/C5/C6, tied together
//! by `OrderFlowOrchestrator`). Full request validation/auth is out of
//! scope (spec's Non-goals); this layer only deserializes and forwards.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::order::{OrderInput, OrderResponse};
use crate::AppState;

pub async fn create_order(State(state): State<Arc<AppState>>, Json(input): Json<OrderInput>) -> Response {
    match state.orchestrator.process_order(input).await {
        Ok(order) => Json(OrderResponse::from(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path((market_id, outcome_index, order_id)): Path<(Uuid, u8, Uuid)>,
) -> Response {
    let cancelled = state.orchestrator.cancel_order(market_id, outcome_index, order_id).await;
    Json(serde_json::json!({ "cancelled": cancelled })).into_response()
}

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(handlers::order::create_order))
        .route(
            "/orders/:market_id/:outcome_index/:order_id",
            delete(handlers::order::cancel_order),
        )
        .route("/markets/stats", get(handlers::market::list_market_stats))
        .route("/markets/:market_id/quote", get(handlers::market::quote))
        .route(
            "/markets/:market_id/:outcome_index/orderbook",
            get(handlers::market::orderbook_snapshot),
        )
}

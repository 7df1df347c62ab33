//! Thin HTTP adapter over the quote port (C3, direct) and the stats
//! aggregator (C7) plus live order-book snapshots (C2). Full request
//! validation is out of scope (spec's Non-goals).

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::decimal::DEFAULT_PRECISION;
use crate::services::lmsr;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MarketIdsQuery {
    pub ids: String,
}

pub async fn list_market_stats(State(state): State<Arc<AppState>>, Query(query): Query<MarketIdsQuery>) -> Response {
    let ids: Vec<Uuid> = query
        .ids
        .split(',')
        .filter_map(|s| Uuid::parse_str(s.trim()).ok())
        .collect();

    match state.stats.stats(&ids).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub outcome_index: usize,
    pub quantity: Decimal,
    pub side: String,
}

/// Quote the LMSR cost of buying/selling `quantity` shares of one
/// outcome, given the market's current quantity vector and liquidity
/// parameter. Read-only; never mutates book or market state.
pub async fn quote(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Query(query): Query<QuoteQuery>,
) -> Response {
    let summaries = match state.stats.summaries(&[market_id]).await {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };
    let Some(_market) = summaries.into_iter().next() else {
        return crate::error::EngineError::NotFound(format!("market {market_id} not found")).into_response();
    };

    // The stats aggregator only surfaces derived prices, not the raw `q`
    // vector (Market.quantities is #[sqlx(skip)] — see SPEC_FULL.md §D),
    // so quoting re-fetches the market row directly.
    let row = match sqlx::query_as::<_, (Vec<Decimal>, Decimal)>(
        "SELECT quantities, liquidity_param FROM markets WHERE id = $1",
    )
    .bind(market_id)
    .fetch_optional(&state.db.pool)
    .await
    {
        Ok(Some(row)) => row,
        Ok(None) => return crate::error::EngineError::NotFound(format!("market {market_id} not found")).into_response(),
        Err(e) => return crate::error::EngineError::from(e).into_response(),
    };
    let (q, b) = row;

    let result = if query.side.eq_ignore_ascii_case("sell") {
        lmsr::quote_sell(&q, query.outcome_index, query.quantity, b, DEFAULT_PRECISION)
    } else {
        lmsr::quote_buy(&q, query.outcome_index, query.quantity, b, DEFAULT_PRECISION)
    };

    match result {
        Ok(quote) => Json(serde_json::json!({
            "instantPrice": quote.instant_price,
            "tradeCost": quote.trade_cost,
            "qAfter": quote.q_after,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn orderbook_snapshot(State(state): State<Arc<AppState>>, Path((market_id, outcome_index)): Path<(Uuid, u8)>) -> Response {
    match state.books.get(market_id, outcome_index) {
        Some(book) => Json(book.snapshot(50)).into_response(),
        None => Json(serde_json::json!({ "bids": [], "asks": [] })).into_response(),
    }
}

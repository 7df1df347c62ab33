//! Market stats aggregation (read-side only): persisted trade aggregates
//! batched by market id, combined with live order-book depth.
//!
//! Grounded on the teacher's batched-by-id lookup idiom for "fetch many
//! ids at once" and on `Orderbook::snapshot`/`order_index` for the
//! live-depth half. No
//! single teacher file aggregates both halves together — the teacher's
//! stats are per-symbol perp tickers, not per-market LMSR summaries — so
//! the combination itself is new.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use crate::decimal::DEFAULT_PRECISION;
use crate::error::EngineError;
use crate::models::market::{MarketStatus, MarketSummary, OutcomeSummary};
use crate::models::trade::TradeRecord;
use crate::services::lmsr;
use crate::services::matching::registry::BookRegistry;

#[derive(FromRow)]
struct MarketRow {
    id: Uuid,
    question: String,
    outcome_labels: Vec<String>,
    liquidity_param: Decimal,
    quantities: sqlx::types::Json<Vec<Decimal>>,
    status: MarketStatus,
    volume: Decimal,
}

/// One row of the persisted-aggregate half of `MarketStats` — everything
/// that isn't the live book.
#[derive(FromRow)]
struct TradeAggregateRow {
    market_id: Uuid,
    total_traded_value: Option<Decimal>,
    last_trade_at: Option<DateTime<Utc>>,
    trade_count: i64,
    unique_counterparties: i64,
    distinct_agents: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MarketDepth {
    pub active_order_count: i64,
    pub bid_liquidity: Decimal,
    pub ask_liquidity: Decimal,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MarketStats {
    pub market_id: Uuid,
    pub total_traded_value: Decimal,
    pub last_trade_at: Option<DateTime<Utc>>,
    pub trade_count: i64,
    pub unique_counterparties: i64,
    pub distinct_agents: i64,
    /// News ingestion is an external collaborator this crate never
    /// implements (spec's Non-goals); surfaced as zero until that
    /// collaborator is wired in.
    pub news_item_count: i64,
    pub depth: MarketDepth,
}

pub struct MarketStatsAggregator {
    pool: PgPool,
    books: Arc<BookRegistry>,
}

impl MarketStatsAggregator {
    pub fn new(pool: PgPool, books: Arc<BookRegistry>) -> Self {
        Self { pool, books }
    }

    /// Fetch and price every market in `market_ids` with a single query
    /// — the N+1 the teacher's `MarketCache::get_market` avoids by
    /// caching individual lookups, this avoids at the SQL layer instead
    /// since LMSR pricing needs every outcome's `q` anyway.
    pub async fn summaries(&self, market_ids: &[Uuid]) -> Result<Vec<MarketSummary>, EngineError> {
        let rows = sqlx::query_as::<_, MarketRow>(
            r#"
            SELECT id, question, outcome_labels, liquidity_param, quantities, status, volume
            FROM markets
            WHERE id = ANY($1)
            "#,
        )
        .bind(market_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|row| self.summarize(row)).collect()
    }

    fn summarize(&self, row: MarketRow) -> Result<MarketSummary, EngineError> {
        let q = row.quantities.0;
        let prices = lmsr::prices(&q, row.liquidity_param, DEFAULT_PRECISION)?;

        let outcomes = row
            .outcome_labels
            .iter()
            .zip(prices)
            .enumerate()
            .map(|(index, (label, price))| OutcomeSummary {
                index: index as u8,
                label: label.clone(),
                price,
            })
            .collect();

        Ok(MarketSummary {
            id: row.id,
            question: row.question,
            outcomes,
            status: row.status,
            volume: row.volume,
        })
    }

    /// Batched `MarketStats` for every id in `market_ids`: one aggregate
    /// query against `trades`/`orders` plus one in-memory walk over the
    /// live books, instead of a query per market.
    pub async fn stats(&self, market_ids: &[Uuid]) -> Result<Vec<MarketStats>, EngineError> {
        let rows = sqlx::query_as::<_, TradeAggregateRow>(
            r#"
            SELECT
                t.market_id AS market_id,
                SUM(t.price * t.quantity) AS total_traded_value,
                MAX(t.executed_at) AS last_trade_at,
                COUNT(*) AS trade_count,
                COUNT(DISTINCT COALESCE(o.user_id, o.agent_id)) FILTER (WHERE o.user_id IS NOT NULL OR o.agent_id IS NOT NULL) AS unique_counterparties,
                COUNT(DISTINCT o.agent_id) FILTER (WHERE o.agent_id IS NOT NULL) AS distinct_agents
            FROM trades t
            JOIN orders o ON o.id IN (t.maker_order_id, t.taker_order_id)
            WHERE t.market_id = ANY($1)
            GROUP BY t.market_id
            "#,
        )
        .bind(market_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut stats: Vec<MarketStats> = market_ids
            .iter()
            .map(|&market_id| MarketStats {
                market_id,
                total_traded_value: Decimal::ZERO,
                last_trade_at: None,
                trade_count: 0,
                unique_counterparties: 0,
                distinct_agents: 0,
                news_item_count: 0,
                depth: self.live_depth(market_id),
            })
            .collect();

        for row in rows {
            if let Some(entry) = stats.iter_mut().find(|s| s.market_id == row.market_id) {
                entry.total_traded_value = row.total_traded_value.unwrap_or(Decimal::ZERO);
                entry.last_trade_at = row.last_trade_at;
                entry.trade_count = row.trade_count;
                entry.unique_counterparties = row.unique_counterparties;
                entry.distinct_agents = row.distinct_agents;
            }
        }

        Ok(stats)
    }

    /// Live depth summed across every outcome book currently held for
    /// `market_id` — books are not persisted/rehydrated (SPEC_FULL.md
    /// §D.3), so the in-memory registry is the only source of truth for
    /// resting liquidity.
    fn live_depth(&self, market_id: Uuid) -> MarketDepth {
        let mut active_order_count = 0i64;
        let mut bid_liquidity = Decimal::ZERO;
        let mut ask_liquidity = Decimal::ZERO;

        for (book_market_id, outcome_index) in self.books.keys() {
            if book_market_id != market_id {
                continue;
            }
            let Some(book) = self.books.get(book_market_id, outcome_index) else {
                continue;
            };
            let snapshot = book.snapshot(usize::MAX);
            for level in &snapshot.bids {
                active_order_count += level.order_count as i64;
                bid_liquidity += level.price * level.quantity;
            }
            for level in &snapshot.asks {
                active_order_count += level.order_count as i64;
                ask_liquidity += level.price * level.quantity;
            }
        }

        MarketDepth {
            active_order_count,
            bid_liquidity,
            ask_liquidity,
        }
    }

    pub async fn recent_trades(&self, market_id: Uuid, limit: i64) -> Result<Vec<TradeRecord>, EngineError> {
        let trades = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT id, market_id, outcome_index, maker_order_id, taker_order_id,
                   taker_side, price, quantity, maker_owner, taker_owner, executed_at
            FROM trades
            WHERE market_id = $1
            ORDER BY executed_at DESC
            LIMIT $2
            "#,
        )
        .bind(market_id)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.pool)
        .await?;
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_depth_starts_at_zero_for_unknown_market() {
        let books = Arc::new(BookRegistry::new());
        let depth_source = books.clone();
        assert!(depth_source.get(Uuid::new_v4(), 0).is_none());
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use uuid::Uuid;

use super::order::Side;

mod datetime_as_millis {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(dt.timestamp_millis())
    }
}

/// A single fill produced by `services::matching::orderbook`. One taker
/// order can generate several of these against several resting makers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedTrade {
    pub id: Uuid,
    pub market_id: Uuid,
    pub outcome_index: u8,
    pub maker_order_id: Uuid,
    pub taker_order_id: Uuid,
    pub taker_side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Owner of the resting order this fill matched against, if any.
    pub maker_owner: Option<Uuid>,
    /// Owner of the order that crossed the book to produce this fill,
    /// if any.
    pub taker_owner: Option<Uuid>,
    pub executed_at: DateTime<Utc>,
}

/// Persisted row for an executed trade, written by `services::persistence`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradeRecord {
    pub id: Uuid,
    pub market_id: Uuid,
    pub outcome_index: i16,
    pub maker_order_id: Uuid,
    pub taker_order_id: Uuid,
    pub taker_side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub maker_owner: Option<Uuid>,
    pub taker_owner: Option<Uuid>,
    #[serde(serialize_with = "datetime_as_millis::serialize")]
    pub executed_at: DateTime<Utc>,
}

impl From<&ExecutedTrade> for TradeRecord {
    fn from(t: &ExecutedTrade) -> Self {
        Self {
            id: t.id,
            market_id: t.market_id,
            outcome_index: t.outcome_index as i16,
            maker_order_id: t.maker_order_id,
            taker_order_id: t.taker_order_id,
            taker_side: t.taker_side,
            price: t.price,
            quantity: t.quantity,
            maker_owner: t.maker_owner,
            taker_owner: t.taker_owner,
            executed_at: t.executed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeHistoryQuery {
    pub market_id: Option<Uuid>,
    pub outcome_index: Option<u8>,
    pub limit: Option<i64>,
}

impl TradeHistoryQuery {
    pub fn get_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }
}

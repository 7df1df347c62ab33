//! Shared types for the order book and submission serializer.
//!
//! Adapted from `services::matching::types` in the teacher: `PriceLevel`
//! keeps the same fixed-point `i64` representation and `Ord` impl, and
//! `OrderEntry`/`MatchResult`/`OrderbookSnapshot` keep their shape,
//! generalized from leveraged perpetual orders to plain prediction-market
//! share orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

pub use crate::models::order::{OrderType, Side, TimeInForce};

/// Fixed-point price, scaled by 10^8 so `BTreeMap` ordering is exact
/// integer comparison rather than `Decimal`'s slower comparison path —
/// identical scale and rationale to the teacher's `PriceLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceLevel(pub i64);

const PRICE_SCALE: i64 = 100_000_000;

impl PriceLevel {
    pub fn from_decimal(price: Decimal) -> Self {
        let scaled = price * Decimal::from(PRICE_SCALE);
        PriceLevel(scaled.to_string().parse::<i64>().unwrap_or(0))
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(PRICE_SCALE)
    }
}

impl PartialOrd for PriceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// A resting (or about-to-rest) order inside one outcome's book.
#[derive(Debug, Clone)]
pub struct OrderEntry {
    pub order_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub owner: Option<Uuid>,
    pub side: Side,
    pub price: PriceLevel,
    pub quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub arrival_seq: i64,
    pub created_at: DateTime<Utc>,
}

/// One fill produced while matching a single incoming order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeExecution {
    pub trade_id: Uuid,
    pub maker_order_id: Uuid,
    pub taker_order_id: Uuid,
    pub taker_side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub maker_owner: Option<Uuid>,
    pub taker_owner: Option<Uuid>,
    pub executed_at: DateTime<Utc>,
}

/// Result of matching one incoming order against the book.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub order_id: Uuid,
    pub status: crate::models::order::OrderStatus,
    pub filled_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub trades: Vec<TradeExecution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    pub order_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub market_id: Uuid,
    pub outcome_index: u8,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
    pub last_trade_price: Option<Decimal>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookUpdate {
    pub market_id: Uuid,
    pub outcome_index: u8,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_level_roundtrip() {
        let p = PriceLevel::from_decimal(dec!(0.65));
        assert_eq!(p.to_decimal(), dec!(0.65));
    }

    #[test]
    fn price_level_orders_like_decimal() {
        let low = PriceLevel::from_decimal(dec!(0.10));
        let high = PriceLevel::from_decimal(dec!(0.90));
        assert!(low < high);
    }
}

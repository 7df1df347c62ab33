//! Topic parsing and wire event shapes for the pub/sub fan-out (C6).
//!
//! Adapted from `websocket::channels::Channel::parse` in the teacher:
//! kept the colon-separated parsing idiom, retargeted from per-symbol
//! perp channels (`kline:BTCUSDT:5m`, `orderbook.BTCUSDT`) to the fixed
//! topic set spec.md §4.6 names.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::Side;
use crate::services::matching::types::DepthLevel;

/// The fixed topic set a connection can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// All markets: listings/creations/status changes.
    Markets,
    /// One market's aggregate updates (stats, status).
    Market(Uuid),
    /// One agent's own order/trade updates.
    Agent(Uuid),
    /// Cross-market price ticks.
    PriceFeed,
    /// Unscoped broadcast, delivered to every connected client.
    WsBroadcast,
}

impl Topic {
    pub fn parse(topic_str: &str) -> Option<Self> {
        if topic_str == "markets" {
            return Some(Topic::Markets);
        }
        if topic_str == "price_feed" {
            return Some(Topic::PriceFeed);
        }
        if topic_str == "ws:broadcast" {
            return Some(Topic::WsBroadcast);
        }
        if let Some(id) = topic_str.strip_prefix("market:") {
            return Uuid::parse_str(id).ok().map(Topic::Market);
        }
        if let Some(id) = topic_str.strip_prefix("agent:") {
            return Uuid::parse_str(id).ok().map(Topic::Agent);
        }
        None
    }

    pub fn to_string(&self) -> String {
        match self {
            Topic::Markets => "markets".to_string(),
            Topic::Market(id) => format!("market:{id}"),
            Topic::Agent(id) => format!("agent:{id}"),
            Topic::PriceFeed => "price_feed".to_string(),
            Topic::WsBroadcast => "ws:broadcast".to_string(),
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Topic::Agent(_))
    }
}

/// One published event. Carries its own topic so the local broadcast
/// loop and the broker re-publish step can each filter/route without
/// re-deriving it from the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    OrderBookUpdate {
        market_id: Uuid,
        outcome_index: u8,
        bids: Vec<DepthLevel>,
        asks: Vec<DepthLevel>,
        timestamp: i64,
    },
    TradeExecuted {
        market_id: Uuid,
        outcome_index: u8,
        trade_id: Uuid,
        price: Decimal,
        quantity: Decimal,
        taker_side: Side,
        timestamp: i64,
    },
    MarketUpdated {
        market_id: Uuid,
        volume: Decimal,
        prices: Vec<Decimal>,
        timestamp: i64,
    },
    AgentUpdated {
        agent_id: Uuid,
        market_id: Uuid,
        order_id: Uuid,
        timestamp: i64,
    },
    PriceUpdate {
        market_id: Uuid,
        outcome_index: u8,
        price: Decimal,
        timestamp: i64,
    },
}

impl Event {
    /// Every topic this event should be delivered on. Most events fan
    /// out to more than one topic (a trade is both a market event and,
    /// when either side belongs to an agent, an agent event).
    pub fn topics(&self) -> Vec<Topic> {
        match self {
            Event::OrderBookUpdate { market_id, .. } => vec![Topic::Market(*market_id)],
            Event::TradeExecuted { market_id, .. } => {
                vec![Topic::Market(*market_id), Topic::PriceFeed]
            }
            Event::MarketUpdated { market_id, .. } => {
                vec![Topic::Markets, Topic::Market(*market_id)]
            }
            Event::AgentUpdated { agent_id, .. } => vec![Topic::Agent(*agent_id)],
            Event::PriceUpdate { market_id, .. } => {
                vec![Topic::Market(*market_id), Topic::PriceFeed]
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Subscribed { topic: String },
    Unsubscribed { topic: String },
    Event(Event),
    Pong,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_topics() {
        assert_eq!(Topic::parse("markets"), Some(Topic::Markets));
        assert_eq!(Topic::parse("price_feed"), Some(Topic::PriceFeed));
        assert_eq!(Topic::parse("ws:broadcast"), Some(Topic::WsBroadcast));
    }

    #[test]
    fn parses_scoped_topics() {
        let id = Uuid::new_v4();
        assert_eq!(Topic::parse(&format!("market:{id}")), Some(Topic::Market(id)));
        assert_eq!(Topic::parse(&format!("agent:{id}")), Some(Topic::Agent(id)));
    }

    #[test]
    fn rejects_unknown_topic() {
        assert_eq!(Topic::parse("nonsense"), None);
    }

    #[test]
    fn agent_topic_is_private() {
        let id = Uuid::new_v4();
        assert!(Topic::Agent(id).is_private());
        assert!(!Topic::Markets.is_private());
    }
}

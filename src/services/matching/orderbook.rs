//! Price-time-priority order book for one (market, outcome) pair.
//!
//! Adapted near-verbatim from `services::matching::orderbook::Orderbook`
//! in the teacher: `RwLock<BTreeMap<PriceLevel, VecDeque<OrderEntry>>>`
//! ladders per side, a `DashMap` order index for O(1) cancel lookup, and
//! `AtomicI64` for the hot last-trade-price scalar. Re-keyed from a
//! ticker `symbol` to `(market_id, outcome_index)` and re-typed from
//! leveraged perp orders to plain prediction-market share orders.

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::RwLock;
use uuid::Uuid;

use crate::models::order::{OrderStatus, OrderType, Side, TimeInForce};

use super::types::{DepthLevel, MatchResult, OrderEntry, OrderbookSnapshot, PriceLevel, TradeExecution};

pub struct Orderbook {
    pub market_id: Uuid,
    pub outcome_index: u8,
    bids: RwLock<BTreeMap<PriceLevel, VecDeque<OrderEntry>>>,
    asks: RwLock<BTreeMap<PriceLevel, VecDeque<OrderEntry>>>,
    order_index: DashMap<Uuid, (Side, PriceLevel)>,
    last_trade_price: AtomicI64,
    order_count: AtomicI64,
    arrival_counter: AtomicI64,
}

/// Input to `Orderbook::submit`, already assigned an id and arrival
/// sequence number by `services::matching::serializer`.
pub struct IncomingOrder {
    pub order_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub owner: Option<Uuid>,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub arrival_seq: i64,
}

impl Orderbook {
    pub fn new(market_id: Uuid, outcome_index: u8) -> Self {
        Self {
            market_id,
            outcome_index,
            bids: RwLock::new(BTreeMap::new()),
            asks: RwLock::new(BTreeMap::new()),
            order_index: DashMap::new(),
            last_trade_price: AtomicI64::new(0),
            order_count: AtomicI64::new(0),
            arrival_counter: AtomicI64::new(0),
        }
    }

    /// Monotonic per-book arrival counter, used as the FIFO tie-break
    /// key the serializer stamps onto each order before it reaches
    /// `submit`.
    pub fn next_arrival_seq(&self) -> i64 {
        self.arrival_counter.fetch_add(1, AtomicOrdering::Relaxed)
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids
            .read()
            .unwrap()
            .keys()
            .next_back()
            .map(|p| p.to_decimal())
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks
            .read()
            .unwrap()
            .keys()
            .next()
            .map(|p| p.to_decimal())
    }

    pub fn last_trade_price(&self) -> Option<Decimal> {
        let raw = self.last_trade_price.load(AtomicOrdering::Relaxed);
        if raw == 0 {
            None
        } else {
            Some(PriceLevel(raw).to_decimal())
        }
    }

    /// Match (and, if anything remains and is allowed to rest, insert)
    /// one incoming order. Mirrors spec.md §4.2's crossing rules:
    /// a BID crosses while `best_ask <= taker_price`, an ASK crosses
    /// while `best_bid >= taker_price`, and MARKET/IOC orders cross
    /// unconditionally (ignoring any price limit) until liquidity or
    /// quantity runs out. Terminal status for what's left over: fully
    /// filled is FILLED; a GTC limit with leftover rests as LIVE or
    /// PARTIALLY_FILLED; a MARKET order that can't fully fill is
    /// CANCELLED if it got any fill at all, REJECTED otherwise; any
    /// other non-resting order (a limit with IOC) is CANCELLED
    /// regardless of how much filled first.
    pub fn submit(&self, incoming: IncomingOrder) -> MatchResult {
        let mut trades = Vec::new();
        let mut remaining = incoming.quantity;
        let taker_price = incoming.price.map(PriceLevel::from_decimal);
        let crosses_unconditionally =
            incoming.order_type == OrderType::Market || incoming.time_in_force == TimeInForce::Ioc;

        match incoming.side {
            Side::Bid => {
                let mut asks = self.asks.write().unwrap();
                while remaining > Decimal::ZERO {
                    let Some((&level, _)) = asks.iter().next() else {
                        break;
                    };
                    if !crosses_unconditionally {
                        if let Some(limit) = taker_price {
                            if level.0 > limit.0 {
                                break;
                            }
                        }
                    }
                    let queue = asks.get_mut(&level).unwrap();
                    remaining = Self::fill_against_level(
                        &incoming,
                        level,
                        queue,
                        remaining,
                        &mut trades,
                        &self.order_index,
                        &self.order_count,
                    );
                    if queue.is_empty() {
                        asks.remove(&level);
                    }
                }
            }
            Side::Ask => {
                let mut bids = self.bids.write().unwrap();
                while remaining > Decimal::ZERO {
                    let Some((&level, _)) = bids.iter().next_back() else {
                        break;
                    };
                    if !crosses_unconditionally {
                        if let Some(limit) = taker_price {
                            if level.0 < limit.0 {
                                break;
                            }
                        }
                    }
                    let queue = bids.get_mut(&level).unwrap();
                    remaining = Self::fill_against_level(
                        &incoming,
                        level,
                        queue,
                        remaining,
                        &mut trades,
                        &self.order_index,
                        &self.order_count,
                    );
                    if queue.is_empty() {
                        bids.remove(&level);
                    }
                }
            }
        }

        if let Some(last) = trades.last() {
            self.last_trade_price
                .store(PriceLevel::from_decimal(last.price).0, AtomicOrdering::Relaxed);
        }

        let filled_quantity = incoming.quantity - remaining;
        let can_rest = remaining > Decimal::ZERO
            && incoming.order_type == OrderType::Limit
            && incoming.time_in_force == TimeInForce::Gtc;

        let status = if remaining == Decimal::ZERO {
            OrderStatus::Filled
        } else if can_rest {
            if filled_quantity > Decimal::ZERO {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::Live
            }
        } else if incoming.order_type == OrderType::Market {
            if filled_quantity > Decimal::ZERO {
                OrderStatus::Cancelled
            } else {
                OrderStatus::Rejected
            }
        } else {
            // Limit + IOC that didn't rest: cancelled regardless of
            // whether it filled anything first.
            OrderStatus::Cancelled
        };

        if can_rest {
            let Some(limit) = taker_price else {
                unreachable!("limit orders always carry a price")
            };
            let entry = OrderEntry {
                order_id: incoming.order_id,
                agent_id: incoming.agent_id,
                owner: incoming.owner,
                side: incoming.side,
                price: limit,
                quantity: incoming.quantity,
                remaining_quantity: remaining,
                arrival_seq: incoming.arrival_seq,
                created_at: Utc::now(),
            };
            self.insert_resting(entry);
        }

        MatchResult {
            order_id: incoming.order_id,
            status,
            filled_quantity,
            remaining_quantity: remaining,
            trades,
        }
    }

    fn fill_against_level(
        incoming: &IncomingOrder,
        level: PriceLevel,
        queue: &mut VecDeque<OrderEntry>,
        mut remaining: Decimal,
        trades: &mut Vec<TradeExecution>,
        order_index: &DashMap<Uuid, (Side, PriceLevel)>,
        order_count: &AtomicI64,
    ) -> Decimal {
        while remaining > Decimal::ZERO {
            let Some(maker) = queue.front_mut() else {
                break;
            };
            let trade_qty = remaining.min(maker.remaining_quantity);
            maker.remaining_quantity -= trade_qty;
            remaining -= trade_qty;

            trades.push(TradeExecution {
                trade_id: Uuid::new_v4(),
                maker_order_id: maker.order_id,
                taker_order_id: incoming.order_id,
                taker_side: incoming.side,
                price: level.to_decimal(),
                quantity: trade_qty,
                maker_owner: maker.owner,
                taker_owner: incoming.owner,
                executed_at: Utc::now(),
            });

            if maker.remaining_quantity == Decimal::ZERO {
                let maker_id = maker.order_id;
                queue.pop_front();
                order_index.remove(&maker_id);
                order_count.fetch_sub(1, AtomicOrdering::Relaxed);
            } else {
                break;
            }
        }
        remaining
    }

    fn insert_resting(&self, entry: OrderEntry) {
        self.order_index
            .insert(entry.order_id, (entry.side, entry.price));
        let mut book = match entry.side {
            Side::Bid => self.bids.write().unwrap(),
            Side::Ask => self.asks.write().unwrap(),
        };
        book.entry(entry.price).or_default().push_back(entry);
        self.order_count.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Cancel a live, resting order. Returns `true` if it was found and
    /// removed. A terminal order (already filled/cancelled) returns
    /// `false` rather than an error — idempotent cancel.
    pub fn cancel(&self, order_id: Uuid) -> bool {
        let Some((_, (side, price))) = self.order_index.remove(&order_id) else {
            return false;
        };
        let mut book = match side {
            Side::Bid => self.bids.write().unwrap(),
            Side::Ask => self.asks.write().unwrap(),
        };
        if let Some(queue) = book.get_mut(&price) {
            queue.retain(|o| o.order_id != order_id);
            if queue.is_empty() {
                book.remove(&price);
            }
        }
        self.order_count.fetch_sub(1, AtomicOrdering::Relaxed);
        true
    }

    /// Aggregate depth snapshot: bids descending by price, asks
    /// ascending, each level summed across its resting orders — same
    /// contract as the teacher's `Orderbook::snapshot`.
    pub fn snapshot(&self, depth: usize) -> OrderbookSnapshot {
        let bids = self.bids.read().unwrap();
        let asks = self.asks.read().unwrap();

        let bid_levels = bids
            .iter()
            .rev()
            .take(depth)
            .map(|(price, queue)| level_summary(*price, queue))
            .collect();
        let ask_levels = asks
            .iter()
            .take(depth)
            .map(|(price, queue)| level_summary(*price, queue))
            .collect();

        OrderbookSnapshot {
            market_id: self.market_id,
            outcome_index: self.outcome_index,
            bids: bid_levels,
            asks: ask_levels,
            last_trade_price: self.last_trade_price(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

fn level_summary(price: PriceLevel, queue: &VecDeque<OrderEntry>) -> DepthLevel {
    let quantity = queue.iter().fold(Decimal::ZERO, |acc, o| acc + o.remaining_quantity);
    DepthLevel {
        price: price.to_decimal(),
        quantity,
        order_count: queue.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn maker(book: &Orderbook, side: Side, price: Decimal, qty: Decimal, seq: i64) -> Uuid {
        let id = Uuid::new_v4();
        book.submit(IncomingOrder {
            order_id: id,
            agent_id: None,
            owner: None,
            side,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(price),
            quantity: qty,
            arrival_seq: seq,
        });
        id
    }

    #[test]
    fn resting_limit_order_shows_up_in_best_bid() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        maker(&book, Side::Bid, dec!(0.40), dec!(100), 1);
        assert_eq!(book.best_bid(), Some(dec!(0.40)));
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn crossing_bid_matches_resting_ask_at_maker_price() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        maker(&book, Side::Ask, dec!(0.55), dec!(50), 1);

        let result = book.submit(IncomingOrder {
            order_id: Uuid::new_v4(),
            agent_id: None,
            owner: None,
            side: Side::Bid,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(dec!(0.60)),
            quantity: dec!(20),
            arrival_seq: 2,
        });

        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].price, dec!(0.55));
        assert_eq!(result.trades[0].quantity, dec!(20));
    }

    #[test]
    fn fifo_within_price_level() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        let first = maker(&book, Side::Ask, dec!(0.50), dec!(10), 1);
        let _second = maker(&book, Side::Ask, dec!(0.50), dec!(10), 2);

        let result = book.submit(IncomingOrder {
            order_id: Uuid::new_v4(),
            agent_id: None,
            owner: None,
            side: Side::Bid,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(dec!(0.50)),
            quantity: dec!(10),
            arrival_seq: 3,
        });

        assert_eq!(result.trades[0].maker_order_id, first);
    }

    #[test]
    fn market_order_with_no_liquidity_is_rejected() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        let result = book.submit(IncomingOrder {
            order_id: Uuid::new_v4(),
            agent_id: None,
            owner: None,
            side: Side::Bid,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Ioc,
            price: None,
            quantity: dec!(10),
            arrival_seq: 1,
        });
        assert_eq!(result.status, OrderStatus::Rejected);
        assert_eq!(result.filled_quantity, dec!(0));
    }

    #[test]
    fn ioc_partial_fill_does_not_rest() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        maker(&book, Side::Ask, dec!(0.50), dec!(5), 1);

        let result = book.submit(IncomingOrder {
            order_id: Uuid::new_v4(),
            agent_id: None,
            owner: None,
            side: Side::Bid,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Ioc,
            price: Some(dec!(0.50)),
            quantity: dec!(10),
            arrival_seq: 2,
        });

        assert_eq!(result.status, OrderStatus::Cancelled);
        assert_eq!(result.filled_quantity, dec!(5));
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn market_order_with_partial_fill_is_cancelled_not_partially_filled() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        maker(&book, Side::Ask, dec!(0.50), dec!(5), 1);

        let result = book.submit(IncomingOrder {
            order_id: Uuid::new_v4(),
            agent_id: None,
            owner: None,
            side: Side::Bid,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Ioc,
            price: None,
            quantity: dec!(10),
            arrival_seq: 2,
        });

        assert_eq!(result.status, OrderStatus::Cancelled);
        assert_eq!(result.filled_quantity, dec!(5));
    }

    #[test]
    fn cancel_removes_resting_order() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        let id = maker(&book, Side::Bid, dec!(0.30), dec!(10), 1);
        assert!(book.cancel(id));
        assert_eq!(book.best_bid(), None);
        assert!(!book.cancel(id));
    }

    #[test]
    fn snapshot_orders_bids_descending_and_asks_ascending() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        maker(&book, Side::Bid, dec!(0.30), dec!(10), 1);
        maker(&book, Side::Bid, dec!(0.40), dec!(10), 2);
        maker(&book, Side::Ask, dec!(0.60), dec!(10), 3);
        maker(&book, Side::Ask, dec!(0.55), dec!(10), 4);

        let snap = book.snapshot(10);
        assert_eq!(snap.bids[0].price, dec!(0.40));
        assert_eq!(snap.bids[1].price, dec!(0.30));
        assert_eq!(snap.asks[0].price, dec!(0.55));
        assert_eq!(snap.asks[1].price, dec!(0.60));
    }

    #[test]
    fn s1_equal_price_crossing_fills_both_sides_completely() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        let order_a = maker(&book, Side::Ask, dec!(100), dec!(10), 1);

        let result = book.submit(IncomingOrder {
            order_id: Uuid::new_v4(),
            agent_id: None,
            owner: None,
            side: Side::Bid,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(dec!(100)),
            quantity: dec!(10),
            arrival_seq: 2,
        });

        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].maker_order_id, order_a);
        assert_eq!(result.trades[0].price, dec!(100));
        assert_eq!(result.trades[0].quantity, dec!(10));

        let snap = book.snapshot(10);
        assert!(snap.bids.is_empty());
        assert!(snap.asks.is_empty());
    }

    #[test]
    fn s2_partial_maker_leaves_remainder_resting() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        maker(&book, Side::Ask, dec!(100), dec!(10), 1);

        let result = book.submit(IncomingOrder {
            order_id: Uuid::new_v4(),
            agent_id: None,
            owner: None,
            side: Side::Bid,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(dec!(100)),
            quantity: dec!(5),
            arrival_seq: 2,
        });

        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].price, dec!(100));
        assert_eq!(result.trades[0].quantity, dec!(5));

        let snap = book.snapshot(10);
        assert_eq!(snap.asks.len(), 1);
        assert_eq!(snap.asks[0].price, dec!(100));
        assert_eq!(snap.asks[0].quantity, dec!(5));
    }

    #[test]
    fn s3_two_level_fill_consumes_best_price_first() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        maker(&book, Side::Ask, dec!(101), dec!(10), 1);
        maker(&book, Side::Ask, dec!(100), dec!(10), 2);

        let result = book.submit(IncomingOrder {
            order_id: Uuid::new_v4(),
            agent_id: None,
            owner: None,
            side: Side::Bid,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(dec!(101)),
            quantity: dec!(15),
            arrival_seq: 3,
        });

        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].price, dec!(100));
        assert_eq!(result.trades[0].quantity, dec!(10));
        assert_eq!(result.trades[1].price, dec!(101));
        assert_eq!(result.trades[1].quantity, dec!(5));

        let snap = book.snapshot(10);
        assert_eq!(snap.asks.len(), 1);
        assert_eq!(snap.asks[0].price, dec!(101));
        assert_eq!(snap.asks[0].quantity, dec!(5));
    }

    #[test]
    fn s4_time_priority_fills_earlier_resting_order_first() {
        let book = Orderbook::new(Uuid::new_v4(), 0);
        let a1 = maker(&book, Side::Ask, dec!(100), dec!(5), 1);
        let a2 = maker(&book, Side::Ask, dec!(100), dec!(5), 2);

        let result = book.submit(IncomingOrder {
            order_id: Uuid::new_v4(),
            agent_id: None,
            owner: None,
            side: Side::Bid,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(dec!(100)),
            quantity: dec!(7),
            arrival_seq: 3,
        });

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].maker_order_id, a1);
        assert_eq!(result.trades[0].quantity, dec!(5));
        assert_eq!(result.trades[1].maker_order_id, a2);
        assert_eq!(result.trades[1].quantity, dec!(2));

        let snap = book.snapshot(10);
        assert_eq!(snap.asks.len(), 1);
        assert_eq!(snap.asks[0].quantity, dec!(3));
    }
}

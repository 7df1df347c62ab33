//! Per-(market, outcome) FIFO submission serializer.
//!
//! The order book itself (`Orderbook`) is internally thread-safe, but
//! spec.md requires at-most-one in-flight matcher per book key so two
//! concurrently submitted orders for the same key are matched in a
//! single well-defined order rather than racing. Different keys must
//! still run fully in parallel.
//!
//! Grounded on `services::matching::orchestrator::OrderFlowOrchestrator::
//! process_order`'s shape (synchronous engine call, then a non-blocking
//! `tokio::spawn` hand-off to persistence so the caller isn't held up by
//! the database) — generalized here with a `DashMap<BookKey,
//! tokio::sync::Mutex<()>>` turn-lock registry, the same concurrent-map
//! idiom `Orderbook::order_index` uses for its own hot lookups.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::order::{Order, OrderInput, OrderStatus, OrderType};

use super::orderbook::IncomingOrder;
use super::registry::{BookKey, BookRegistry};
use super::types::MatchResult;

/// Outcome of a single `submit` call: the order as it now stands plus
/// whatever trades were produced matching it.
pub struct SubmissionResult {
    pub order: Order,
    pub match_result: MatchResult,
}

pub struct SubmissionSerializer {
    books: Arc<BookRegistry>,
    turns: DashMap<BookKey, Arc<Mutex<()>>>,
}

impl SubmissionSerializer {
    pub fn new(books: Arc<BookRegistry>) -> Self {
        Self {
            books,
            turns: DashMap::new(),
        }
    }

    fn turn_for(&self, key: BookKey) -> Arc<Mutex<()>> {
        self.turns.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Validate, assign an id/arrival sequence, and match `input`
    /// against its book — holding that book's turn lock for the
    /// duration so no other submission for the same (market, outcome)
    /// interleaves with it. Submissions for different keys never
    /// contend on this lock and proceed fully in parallel.
    pub async fn submit(&self, input: OrderInput) -> Result<SubmissionResult, EngineError> {
        validate(&input)?;

        let key = (input.market_id, input.outcome_index);
        let turn = self.turn_for(key);
        let _guard = turn.lock().await;

        let book = self.books.get_or_create(input.market_id, input.outcome_index);
        let order_id = Uuid::new_v4();
        let arrival_seq = book.next_arrival_seq();
        let now = chrono::Utc::now();

        let match_result = book.submit(IncomingOrder {
            order_id,
            agent_id: input.agent_id,
            owner: input.owner(),
            side: input.side,
            order_type: input.order_type,
            time_in_force: input.time_in_force,
            price: input.price,
            quantity: input.quantity,
            arrival_seq,
        });

        let order = Order {
            id: order_id,
            user_id: input.user_id,
            agent_id: input.agent_id,
            market_id: input.market_id,
            outcome_index: input.outcome_index as i16,
            side: input.side,
            order_type: input.order_type,
            time_in_force: input.time_in_force,
            price: input.price,
            quantity: input.quantity,
            filled_quantity: match_result.filled_quantity,
            status: match_result.status,
            settlement_envelope: input.settlement_envelope,
            arrival_seq,
            created_at: now,
            updated_at: now,
        };

        Ok(SubmissionResult { order, match_result })
    }

    /// Cancel a resting order. The caller is expected to know which book
    /// the order lives on; an unknown (market, outcome) pair is treated
    /// as "nothing to cancel" rather than an error, matching `Orderbook
    /// ::cancel`'s idempotent contract.
    pub async fn cancel(&self, market_id: Uuid, outcome_index: u8, order_id: Uuid) -> bool {
        let key = (market_id, outcome_index);
        let turn = self.turn_for(key);
        let _guard = turn.lock().await;

        match self.books.get(market_id, outcome_index) {
            Some(book) => book.cancel(order_id),
            None => false,
        }
    }
}

fn validate(input: &OrderInput) -> Result<(), EngineError> {
    if input.quantity <= rust_decimal::Decimal::ZERO {
        return Err(EngineError::Validation("quantity must be positive".into()));
    }
    match input.order_type {
        OrderType::Limit => {
            let Some(price) = input.price else {
                return Err(EngineError::Validation(
                    "limit orders require a price".into(),
                ));
            };
            if price <= rust_decimal::Decimal::ZERO {
                return Err(EngineError::Validation(
                    "limit price must be positive".into(),
                ));
            }
        }
        OrderType::Market => {
            if input.price.is_some() {
                return Err(EngineError::Validation(
                    "market orders must not carry a price".into(),
                ));
            }
        }
    }
    Ok(())
}

/// A terminal match result never produces a `Live` status directly out
/// of `submit`; this helper is used by callers that need to know
/// whether an order settled fully in-band.
pub fn is_terminal(status: OrderStatus) -> bool {
    status.is_terminal()
}

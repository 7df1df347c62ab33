//! Ties the submission serializer (C4) to persistence (C5) and the
//! event fan-out (C6): the single entry point callers use to submit or
//! cancel an order.
//!
//! Grounded on `services::matching::orchestrator::OrderFlowOrchestrator`:
//! same "match synchronously, persist asynchronously" shape — `submit`
//! calls the serializer in-band and returns as soon as it has a result,
//! handing the persistence job and the event broadcast off without
//! making the caller wait on the database or the broker.

use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::order::{Order, OrderInput};
use crate::models::trade::ExecutedTrade;
use crate::services::matching::types::TradeExecution;
use crate::websocket::channels::Event;

use super::registry::BookRegistry;
use super::serializer::SubmissionSerializer;
use crate::services::persistence::{PersistenceHandle, PersistenceJob};

pub struct OrderFlowOrchestrator {
    serializer: SubmissionSerializer,
    books: Arc<BookRegistry>,
    persistence: PersistenceHandle,
    events: tokio::sync::broadcast::Sender<Event>,
}

impl OrderFlowOrchestrator {
    pub fn new(
        books: Arc<BookRegistry>,
        persistence: PersistenceHandle,
        events: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        Self {
            serializer: SubmissionSerializer::new(books.clone()),
            books,
            persistence,
            events,
        }
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Submit one order: match it against its book, hand the result to
    /// persistence without waiting on it, broadcast locally, and return.
    /// This non-blocking persistence hand-off is the same contract the
    /// teacher's `process_order` makes — the caller is never held up by
    /// the database.
    pub async fn process_order(&self, input: OrderInput) -> Result<Order, EngineError> {
        let result = self.serializer.submit(input).await?;
        let order = result.order.clone();

        let trades: Vec<ExecutedTrade> = result
            .match_result
            .trades
            .iter()
            .map(|t| to_executed_trade(&order, t))
            .collect();

        self.persistence
            .enqueue(PersistenceJob {
                order: order.clone(),
                trades: trades.clone(),
            })
            .await;

        self.broadcast_after_submit(&order, &trades);

        Ok(order)
    }

    pub async fn cancel_order(&self, market_id: Uuid, outcome_index: u8, order_id: Uuid) -> bool {
        self.serializer.cancel(market_id, outcome_index, order_id).await
    }

    fn broadcast_after_submit(&self, order: &Order, trades: &[ExecutedTrade]) {
        let book = self.books.get_or_create(order.market_id, order.outcome_index as u8);
        let snapshot = book.snapshot(50);

        let book_event = Event::OrderBookUpdate {
            market_id: order.market_id,
            outcome_index: order.outcome_index as u8,
            bids: snapshot.bids,
            asks: snapshot.asks,
            timestamp: snapshot.timestamp,
        };
        self.publish_local(book_event);

        for trade in trades {
            let event = Event::TradeExecuted {
                market_id: trade.market_id,
                outcome_index: trade.outcome_index,
                trade_id: trade.id,
                price: trade.price,
                quantity: trade.quantity,
                taker_side: trade.taker_side,
                timestamp: trade.executed_at.timestamp_millis(),
            };
            self.publish_local(event);
        }

        if let Some(agent_id) = order.agent_id {
            self.publish_local(Event::AgentUpdated {
                agent_id,
                market_id: order.market_id,
                order_id: order.id,
                timestamp: chrono::Utc::now().timestamp_millis(),
            });
        }
    }

    /// Deliver to every in-process WebSocket connection immediately.
    /// The broker (Redis) re-publish for other nodes happens separately
    /// in `main.rs`'s background forwarding task, matching the
    /// teacher's "local broadcast first, then re-publish" ordering in
    /// its own `tokio::spawn` loops over `subscribe_trades`/
    /// `subscribe_orderbook`.
    fn publish_local(&self, event: Event) {
        if self.events.send(event).is_err() {
            warn!("no active subscribers for local event broadcast");
        }
    }
}

fn to_executed_trade(order: &Order, t: &TradeExecution) -> ExecutedTrade {
    ExecutedTrade {
        id: t.trade_id,
        market_id: order.market_id,
        outcome_index: order.outcome_index as u8,
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

//! Lazily-created book-per-(market, outcome) registry.
//!
//! Grounded on the same `DashMap`-as-concurrent-index idiom the teacher
//! uses for `Orderbook::order_index`; here it maps book keys to `Arc<
//! Orderbook>` instead of order ids to price levels.

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::orderbook::Orderbook;

pub type BookKey = (Uuid, u8);

#[derive(Default)]
pub struct BookRegistry {
    books: DashMap<BookKey, Arc<Orderbook>>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, market_id: Uuid, outcome_index: u8) -> Arc<Orderbook> {
        self.books
            .entry((market_id, outcome_index))
            .or_insert_with(|| Arc::new(Orderbook::new(market_id, outcome_index)))
            .clone()
    }

    pub fn get(&self, market_id: Uuid, outcome_index: u8) -> Option<Arc<Orderbook>> {
        self.books.get(&(market_id, outcome_index)).map(|e| e.clone())
    }

    pub fn keys(&self) -> Vec<BookKey> {
        self.books.iter().map(|e| *e.key()).collect()
    }
}

//! Prediction market and outcome model.
//!
//! A market has a fixed number of outcomes indexed `0..outcome_count`.
//! Each outcome trades on its own price-time-priority book (see
//! `services::matching::orderbook`) and participates in the market's
//! single LMSR cost function over the outcome-quantity vector `q`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle: `Draft -> Open -> Closed`, with `Resolving` as the window
/// between trading close and final resolution and `Disputed` as an
/// off-path branch out of `Resolving`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "market_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Draft,
    Open,
    Resolving,
    Closed,
    Disputed,
}

impl MarketStatus {
    pub fn accepts_orders(&self) -> bool {
        matches!(self, MarketStatus::Open)
    }
}

/// A single outcome's label. Quantities/prices live alongside the market,
/// not on the outcome itself, so this stays small.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub index: u8,
    pub label: String,
}

/// Persisted market row. `liquidity_param` is LMSR's `b`; `quantities` is
/// the outcome-quantity vector `q` the cost function is evaluated over.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Market {
    pub id: Uuid,
    pub question: String,
    pub outcome_labels: Vec<String>,
    pub liquidity_param: Decimal,
    #[sqlx(skip)]
    pub quantities: Vec<Decimal>,
    pub status: MarketStatus,
    pub volume: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Market {
    pub fn outcome_count(&self) -> usize {
        self.outcome_labels.len()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcome_labels
            .iter()
            .enumerate()
            .map(|(i, label)| Outcome {
                index: i as u8,
                label: label.clone(),
            })
            .collect()
    }
}

/// Response shape for market listings; mirrors `Market` but strips the
/// internal `q` vector in favour of derived per-outcome prices, computed
/// by the caller from `services::lmsr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub id: Uuid,
    pub question: String,
    pub outcomes: Vec<OutcomeSummary>,
    pub status: MarketStatus,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub index: u8,
    pub label: String,
    pub price: Decimal,
}

//! Net per-owner holding in one outcome of one market.
//!
//! A position isn't touched by the matching core directly — C2/C4 only
//! produce fills — but it's the row C3's quantity-vector builder reads
//! when an embedder wants the LMSR `q` vector expressed per holder
//! rather than as the single market-wide aggregate `Market.quantities`
//! already carries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::order::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "position_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
    Liquidated,
}

impl PositionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, PositionStatus::Open)
    }
}

/// Net holding for `(market_id, outcome_index, owner)`. `side` tracks
/// which way the net quantity sits (LONG once bought shares exceed sold
/// shares), `collateral_locked` is the margin still tied up against it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub id: Uuid,
    pub market_id: Uuid,
    pub outcome_index: i16,
    pub owner: Uuid,
    pub side: Side,
    pub quantity: Decimal,
    pub collateral_locked: Decimal,
    pub status: PositionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Signed quantity for q-vector assembly: positive for LONG,
    /// negative for SHORT.
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            Side::Bid => self.quantity,
            Side::Ask => -self.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(side: Side, quantity: Decimal) -> Position {
        Position {
            id: Uuid::new_v4(),
            market_id: Uuid::new_v4(),
            outcome_index: 0,
            owner: Uuid::new_v4(),
            side,
            quantity,
            collateral_locked: Decimal::ZERO,
            status: PositionStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn long_position_has_positive_signed_quantity() {
        assert_eq!(position(Side::Bid, dec!(5)).signed_quantity(), dec!(5));
    }

    #[test]
    fn short_position_has_negative_signed_quantity() {
        assert_eq!(position(Side::Ask, dec!(5)).signed_quantity(), dec!(-5));
    }
}

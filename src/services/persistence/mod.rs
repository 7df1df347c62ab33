//! Durable persistence worker: takes matched orders/trades off the hot
//! path and writes them to Postgres without blocking the caller of
//! `services::matching::serializer::SubmissionSerializer::submit`.
//!
//! Grounded on `services::matching::orchestrator`'s `persist_trade`/
//! `persist_order`/`batch_persist_trades` (the `ON CONFLICT (id) DO
//! NOTHING` idempotency pattern and the transactional `pool.begin()` /
//! `tx.commit()` batch shape), stripped of position/leverage/referral
//! side effects, plus a bounded-retry-with-backoff loop modeled on
//! `cache::redis_client::RedisClient::with_retry`.

use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::models::order::Order;
use crate::models::trade::{ExecutedTrade, TradeRecord};

/// One persistence job: the order as it now stands plus every trade
/// produced while matching it.
pub struct PersistenceJob {
    pub order: Order,
    pub trades: Vec<ExecutedTrade>,
}

#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<PersistenceJob>,
}

impl PersistenceHandle {
    /// Non-blocking enqueue — mirrors the teacher's
    /// `tokio::spawn(persist...)` fire-and-forget hand-off in
    /// `process_order`, except backed by a bounded channel so a stalled
    /// database applies backpressure instead of unbounded memory growth.
    pub async fn enqueue(&self, job: PersistenceJob) {
        if self.sender.send(job).await.is_err() {
            error!("persistence worker channel closed; job dropped");
        }
    }
}

pub struct PersistenceWorker {
    pool: PgPool,
    max_retries: u32,
    base_backoff: Duration,
}

pub fn spawn(pool: PgPool, queue_capacity: usize) -> PersistenceHandle {
    let (sender, receiver) = mpsc::channel(queue_capacity);
    let worker = PersistenceWorker {
        pool,
        max_retries: 5,
        base_backoff: Duration::from_millis(100),
    };
    tokio::spawn(worker.run(receiver));
    PersistenceHandle { sender }
}

impl PersistenceWorker {
    async fn run(self, mut receiver: mpsc::Receiver<PersistenceJob>) {
        info!("persistence worker started");
        while let Some(job) = receiver.recv().await {
            if let Err(e) = self.persist_with_retry(&job).await {
                error!(order_id = %job.order.id, error = %e, "persistence exhausted retries, dead-lettering");
                self.dead_letter(&job, &e.to_string()).await;
            }
        }
        warn!("persistence worker channel closed, worker exiting");
    }

    async fn persist_with_retry(&self, job: &PersistenceJob) -> Result<(), sqlx::Error> {
        let mut attempt = 0;
        loop {
            match self.persist(job).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 >= self.max_retries => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "persistence attempt failed, retrying");
                    tokio::time::sleep(self.base_backoff * (attempt + 1)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn persist(&self, job: &PersistenceJob) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, agent_id, market_id, outcome_index, side, order_type,
                                 time_in_force, price, quantity, filled_quantity, status,
                                 settlement_envelope, arrival_seq, created_at, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            ON CONFLICT (id) DO UPDATE SET
                filled_quantity = EXCLUDED.filled_quantity,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(job.order.id)
        .bind(job.order.user_id)
        .bind(job.order.agent_id)
        .bind(job.order.market_id)
        .bind(job.order.outcome_index)
        .bind(job.order.side)
        .bind(job.order.order_type)
        .bind(job.order.time_in_force)
        .bind(job.order.price)
        .bind(job.order.quantity)
        .bind(job.order.filled_quantity)
        .bind(job.order.status)
        .bind(&job.order.settlement_envelope)
        .bind(job.order.arrival_seq)
        .bind(job.order.created_at)
        .bind(job.order.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut volume_delta = Decimal::ZERO;
        for trade in &job.trades {
            let record = TradeRecord::from(trade);
            sqlx::query(
                r#"
                INSERT INTO trades (id, market_id, outcome_index, maker_order_id, taker_order_id,
                                     taker_side, price, quantity, maker_owner, taker_owner, executed_at)
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(record.id)
            .bind(record.market_id)
            .bind(record.outcome_index)
            .bind(record.maker_order_id)
            .bind(record.taker_order_id)
            .bind(record.taker_side)
            .bind(record.price)
            .bind(record.quantity)
            .bind(record.maker_owner)
            .bind(record.taker_owner)
            .bind(record.executed_at)
            .execute(&mut *tx)
            .await?;

            volume_delta += record.price * record.quantity;
        }

        if volume_delta > Decimal::ZERO {
            // Atomic SQL-level increment rather than read-modify-write —
            // volume is defined as sum(price*quantity) over persisted
            // trades (SPEC_FULL.md §D.2), so this must never race with a
            // concurrent persistence job for the same market.
            sqlx::query("UPDATE markets SET volume = volume + $1, updated_at = NOW() WHERE id = $2")
                .bind(volume_delta)
                .bind(job.order.market_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    async fn dead_letter(&self, job: &PersistenceJob, error: &str) {
        let result = sqlx::query(
            r#"
            INSERT INTO persistence_dead_letters (order_id, payload, error, failed_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(job.order.id)
        .bind(serde_json::json!({
            "order": &job.order,
        }))
        .bind(error)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(order_id = %job.order.id, error = %e, "failed to write dead letter; raising alarm");
        }
        metrics::counter!("persistence_dead_letters_total").increment(1);
    }
}

/// Batch-insert path for back-filling trades in one transaction —
/// grounded on `orchestrator::batch_persist_trades`'s transactional
/// loop. Used by offline recovery tooling, not the hot path.
pub async fn batch_persist_trades(pool: &PgPool, trades: &[ExecutedTrade]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for trade in trades {
        let record = TradeRecord::from(trade);
        sqlx::query(
            r#"
            INSERT INTO trades (id, market_id, outcome_index, maker_order_id, taker_order_id,
                                 taker_side, price, quantity, maker_owner, taker_owner, executed_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.market_id)
        .bind(record.outcome_index)
        .bind(record.maker_order_id)
        .bind(record.taker_order_id)
        .bind(record.taker_side)
        .bind(record.price)
        .bind(record.quantity)
        .bind(record.maker_owner)
        .bind(record.taker_owner)
        .bind(record.executed_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

#[cfg(test)]
mod tests {
    // Persistence behavior is exercised against a real Postgres instance
    // in integration tests, not here — same boundary the teacher draws
    // in `orchestrator`'s own (empty) test module.
}

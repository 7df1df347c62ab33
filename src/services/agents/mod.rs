//! Thin agent job scheduler: recurring or one-off triggers that ask an
//! external decision policy what to do, then submit the result back
//! through the same public entry point user orders use.
//!
//! No teacher file implements this — `main.rs`'s background
//! `tokio::spawn` loops (subscribe/interval/select) are the closest
//! analogue, generalized here into a keyed job table instead of a single
//! fixed loop per service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::order::{OrderInput, OrderType, Side, TimeInForce};
use crate::services::matching::orchestrator::OrderFlowOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentAction {
    Skip,
    Buy,
    Sell,
}

/// What an `AgentPolicy` decided to do, and when to check back in.
#[derive(Debug, Clone)]
pub struct AgentDecision {
    pub action: AgentAction,
    pub outcome_index: Option<u8>,
    pub quantity: Option<Decimal>,
    pub next_follow_up_in_ms: Option<u64>,
}

impl AgentDecision {
    pub fn skip(next_follow_up_in_ms: u64) -> Self {
        Self {
            action: AgentAction::Skip,
            outcome_index: None,
            quantity: None,
            next_follow_up_in_ms: Some(next_follow_up_in_ms),
        }
    }
}

pub struct AgentContext {
    pub agent_id: Uuid,
    pub market_id: Uuid,
}

/// External decision policy — an LLM-driven market-question/trading
/// brain, or anything else. Generating decisions is explicitly out of
/// scope (spec's Non-goals); this crate only depends on the trait.
#[async_trait]
pub trait AgentPolicy: Send + Sync {
    async fn decide(&self, ctx: &AgentContext) -> AgentDecision;
}

/// Always skips, with a one-minute follow-up. Used for tests and
/// whenever `AGENT_TRADING_ENABLED=false`.
pub struct NullPolicy;

#[async_trait]
impl AgentPolicy for NullPolicy {
    async fn decide(&self, _ctx: &AgentContext) -> AgentDecision {
        AgentDecision::skip(60_000)
    }
}

const DEFAULT_TRADE_QUANTITY: &str = "1";
const TRADE_FOLLOW_UP_MS: u64 = 5 * 60_000;

/// Recurring or one-off job identity. Recurring jobs are keyed
/// `${agentId}-${marketId}` so a new submission replaces any pending
/// repeat; one-off jobs carry a time suffix so they never collide with
/// a recurring job for the same pair.
fn recurring_key(agent_id: Uuid, market_id: Uuid) -> String {
    format!("{agent_id}-{market_id}")
}

fn one_off_key(agent_id: Uuid, market_id: Uuid) -> String {
    format!("{agent_id}-{market_id}-{}", Utc::now().timestamp_millis())
}

pub struct AgentScheduler {
    orchestrator: Arc<OrderFlowOrchestrator>,
    policy: Arc<dyn AgentPolicy>,
    jobs: DashMap<String, JoinHandle<()>>,
    trading_enabled: bool,
}

impl AgentScheduler {
    pub fn new(
        orchestrator: Arc<OrderFlowOrchestrator>,
        policy: Arc<dyn AgentPolicy>,
        trading_enabled: bool,
    ) -> Self {
        Self {
            orchestrator,
            policy,
            jobs: DashMap::new(),
            trading_enabled,
        }
    }

    /// Start (or restart) a recurring schedule for `(agent_id,
    /// market_id)`. Replaces any job already registered under the same
    /// key, mirroring spec.md §4.8's "a new submission replaces any
    /// pending repeat".
    pub fn schedule_recurring(&self, agent_id: Uuid, market_id: Uuid) {
        let key = recurring_key(agent_id, market_id);
        self.spawn_loop(key, agent_id, market_id);
    }

    /// Fire a single decision immediately, under a job id that can never
    /// collide with a recurring schedule for the same pair.
    pub fn schedule_one_off(&self, agent_id: Uuid, market_id: Uuid) {
        let key = one_off_key(agent_id, market_id);
        self.spawn_once(key, agent_id, market_id);
    }

    pub fn cancel_recurring(&self, agent_id: Uuid, market_id: Uuid) {
        let key = recurring_key(agent_id, market_id);
        if let Some((_, handle)) = self.jobs.remove(&key) {
            handle.abort();
        }
    }

    fn spawn_loop(&self, key: String, agent_id: Uuid, market_id: Uuid) {
        let orchestrator = self.orchestrator.clone();
        let policy = self.policy.clone();
        let trading_enabled = self.trading_enabled;
        let jobs = &self.jobs;

        let handle = tokio::spawn(async move {
            loop {
                let decision = policy
                    .decide(&AgentContext { agent_id, market_id })
                    .await;
                let follow_up = act_on_decision(&orchestrator, agent_id, market_id, &decision, trading_enabled).await;
                tokio::time::sleep(std::time::Duration::from_millis(follow_up)).await;
            }
        });

        if let Some(old) = jobs.insert(key, handle) {
            old.abort();
        }
    }

    fn spawn_once(&self, key: String, agent_id: Uuid, market_id: Uuid) {
        let orchestrator = self.orchestrator.clone();
        let policy = self.policy.clone();
        let trading_enabled = self.trading_enabled;

        let handle = tokio::spawn(async move {
            let decision = policy
                .decide(&AgentContext { agent_id, market_id })
                .await;
            act_on_decision(&orchestrator, agent_id, market_id, &decision, trading_enabled).await;
        });
        self.jobs.insert(key, handle);
    }

    /// Snapshot of currently-registered job keys, for diagnostics.
    pub fn job_keys(&self) -> Vec<String> {
        self.jobs.iter().map(|e| e.key().clone()).collect()
    }
}

impl Drop for AgentScheduler {
    fn drop(&mut self) {
        for entry in self.jobs.iter() {
            entry.value().abort();
        }
    }
}

/// Executes one decision: a skip just returns its follow-up delay, a
/// buy/sell builds an `OrderInput` and re-enters `OrderFlowOrchestrator`
/// through its public `process_order` — the identical port user
/// submissions go through.
async fn act_on_decision(
    orchestrator: &Arc<OrderFlowOrchestrator>,
    agent_id: Uuid,
    market_id: Uuid,
    decision: &AgentDecision,
    trading_enabled: bool,
) -> u64 {
    match decision.action {
        AgentAction::Skip => decision.next_follow_up_in_ms.unwrap_or(TRADE_FOLLOW_UP_MS),
        AgentAction::Buy | AgentAction::Sell => {
            let Some(outcome_index) = decision.outcome_index else {
                warn!(%agent_id, %market_id, "trade decision missing outcome_index, skipping");
                return decision.next_follow_up_in_ms.unwrap_or(TRADE_FOLLOW_UP_MS);
            };
            let quantity = decision
                .quantity
                .unwrap_or_else(|| DEFAULT_TRADE_QUANTITY.parse().unwrap());

            if !trading_enabled {
                info!(%agent_id, %market_id, outcome_index, %quantity, action = ?decision.action, "agent trading disabled, logging decision only");
                return decision.next_follow_up_in_ms.unwrap_or(TRADE_FOLLOW_UP_MS);
            }

            let side = match decision.action {
                AgentAction::Buy => Side::Bid,
                AgentAction::Sell => Side::Ask,
                AgentAction::Skip => unreachable!(),
            };

            let input = OrderInput {
                user_id: None,
                agent_id: Some(agent_id),
                market_id,
                outcome_index,
                side,
                order_type: OrderType::Market,
                time_in_force: TimeInForce::Ioc,
                price: None,
                quantity,
                settlement_envelope: None,
            };

            match orchestrator.process_order(input).await {
                Ok(order) => info!(%agent_id, %market_id, order_id = %order.id, "agent order submitted"),
                Err(e) => warn!(%agent_id, %market_id, error = %e, "agent order submission failed"),
            }

            decision.next_follow_up_in_ms.unwrap_or(TRADE_FOLLOW_UP_MS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_policy_always_skips() {
        let policy = NullPolicy;
        let ctx = AgentContext {
            agent_id: Uuid::new_v4(),
            market_id: Uuid::new_v4(),
        };
        let decision = policy.decide(&ctx).await;
        assert_eq!(decision.action, AgentAction::Skip);
        assert!(decision.next_follow_up_in_ms.is_some());
    }

    #[test]
    fn recurring_key_is_stable_for_same_pair() {
        let agent = Uuid::new_v4();
        let market = Uuid::new_v4();
        assert_eq!(recurring_key(agent, market), recurring_key(agent, market));
    }

    #[test]
    fn one_off_keys_are_distinct_from_recurring() {
        let agent = Uuid::new_v4();
        let market = Uuid::new_v4();
        let recurring = recurring_key(agent, market);
        let one_off = one_off_key(agent, market);
        assert_ne!(recurring, one_off);
        assert!(one_off.starts_with(&recurring));
    }
}

//! Stable boundary traits. The core is wired together concretely in
//! `main.rs`, but a real HTTP/auth/settlement layer embedding this
//! crate should be able to depend on these traits instead of reaching
//! into `matching`/`agents` internals directly.
//!
//! `QuotePort` has no trait here: C3 (`services::lmsr`) is already pure
//! and synchronous, so its free functions are the port.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::models::order::OrderInput;
use crate::websocket::channels::Event;

use super::matching::serializer::{SubmissionResult, SubmissionSerializer};
use super::matching::OrderFlowOrchestrator;

/// Submit an order and get back its resulting state plus whatever
/// matched synchronously. Implemented by C4 (`SubmissionSerializer`);
/// `OrderFlowOrchestrator` wraps this with persistence/event hand-off.
#[async_trait]
pub trait SubmissionPort: Send + Sync {
    async fn submit(&self, input: OrderInput) -> Result<SubmissionResult, EngineError>;
}

#[async_trait]
impl SubmissionPort for SubmissionSerializer {
    async fn submit(&self, input: OrderInput) -> Result<SubmissionResult, EngineError> {
        SubmissionSerializer::submit(self, input).await
    }
}

/// Subscribe to the full, unfiltered event stream; callers filter by
/// `Event::topics()` themselves (this is what `websocket::handler` does
/// per connection).
pub trait EventPort: Send + Sync {
    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event>;
}

impl EventPort for OrderFlowOrchestrator {
    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.subscribe_events()
    }
}

//! Order Matching Module
//!
//! Price-time-priority matching per (market, outcome), serialized
//! per-key so at most one matcher runs against a given book at once
//! (`serializer`), with persistence and event fan-out tied in by
//! `orchestrator`.

pub mod orchestrator;
pub mod orderbook;
pub mod registry;
pub mod serializer;
pub mod types;

pub use orchestrator::OrderFlowOrchestrator;
pub use orderbook::Orderbook;
pub use registry::BookRegistry;
pub use serializer::SubmissionSerializer;

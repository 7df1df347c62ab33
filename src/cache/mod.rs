pub mod pubsub;
pub mod redis_client;

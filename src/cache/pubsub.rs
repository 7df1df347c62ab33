//! Redis-backed broker publish — the cross-process half of C6's fan-out.
//!
//! Adapted from `cache::pubsub::{Publisher, PubSubManager}` in the
//! teacher: same `publish`/`publish_json` shape over `RedisClient`, but
//! collapsed from a handful of per-symbol channel helpers
//! (`publish_trade`, `publish_orderbook`, ...) down to a single
//! `publish_event` keyed by `websocket::channels::Topic`, since every
//! event this core emits already carries its own topic set.

use redis::RedisError;
use std::sync::Arc;

use super::redis_client::RedisClient;
use crate::websocket::channels::{Event, Topic};

fn channel_name(topic: &Topic) -> String {
    format!("channel:{}", topic.to_string())
}

/// Every channel pattern this core ever publishes to. `Topic::Market`
/// and `Topic::Agent` are parameterized by id, so there's no fixed
/// channel list to subscribe to individually — a remote listener
/// `PSUBSCRIBE`s to these patterns instead.
fn channel_patterns() -> Vec<String> {
    vec![
        channel_name(&Topic::Markets),
        "channel:market:*".to_string(),
        "channel:agent:*".to_string(),
        channel_name(&Topic::PriceFeed),
        channel_name(&Topic::WsBroadcast),
    ]
}

/// Pub/Sub publisher for broadcasting events to other processes sharing
/// the same Redis broker.
pub struct Publisher {
    redis: Arc<RedisClient>,
}

impl Publisher {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    pub async fn publish(&self, channel: &str, message: &str) -> Result<i32, RedisError> {
        self.redis.publish(channel, message.to_string()).await
    }

    /// Publish one event to every topic it belongs to
    /// (`Event::topics`). The local in-process broadcast in
    /// `websocket::handler` is always delivered before this is called —
    /// see `services::matching::orchestrator`.
    pub async fn publish_event(&self, event: &Event) -> Result<(), RedisError> {
        let json = serde_json::to_string(event).map_err(|e| {
            RedisError::from((
                redis::ErrorKind::IoError,
                "Serialization error",
                e.to_string(),
            ))
        })?;
        for topic in event.topics() {
            self.publish(&channel_name(&topic), &json).await?;
        }
        Ok(())
    }
}

/// Subscriber configuration, unchanged from the teacher.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub buffer_size: usize,
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            auto_reconnect: true,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Convenience wrapper bundling a publisher with the subscriber
/// configuration other nodes use to mirror events back in over Redis's
/// own pub/sub connection (`redis::aio::PubSub`, opened per-subscriber
/// rather than through the shared `ConnectionManager`).
pub struct PubSubManager {
    publisher: Publisher,
    redis: Arc<RedisClient>,
    redis_url: String,
    subscriber_config: SubscriberConfig,
}

impl PubSubManager {
    pub fn new(redis: Arc<RedisClient>, redis_url: &str) -> Self {
        Self {
            publisher: Publisher::new(redis.clone()),
            redis,
            redis_url: redis_url.to_string(),
            subscriber_config: SubscriberConfig::default(),
        }
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    pub fn subscriber_config(&self) -> &SubscriberConfig {
        &self.subscriber_config
    }

    pub fn channel_for(&self, topic: &Topic) -> String {
        channel_name(topic)
    }

    /// Open the subscriber connection across every channel pattern this
    /// core publishes to, and forward every message that deserializes
    /// into an `Event` onto `sink` — the local broadcast channel peer
    /// server instances re-deliver events on. Runs until the connection
    /// drops (network error, server restart); the caller is expected to
    /// reopen it afterwards, honoring `subscriber_config().
    /// reconnect_delay_ms`.
    ///
    /// A node hears its own published events come back over this same
    /// path; that's an accepted second local broadcast of an
    /// already-delivered event (see DESIGN.md), not a re-publish loop —
    /// this method only ever writes to `sink`, never back to Redis.
    pub async fn run_remote_listener(&self, sink: tokio::sync::broadcast::Sender<Event>) -> Result<(), RedisError> {
        use futures::StreamExt;

        let mut pubsub = self.redis.subscribe_patterns(&channel_patterns()).await?;
        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read pub/sub message payload");
                    continue;
                }
            };
            match serde_json::from_str::<Event>(&payload) {
                Ok(event) => {
                    if sink.send(event).is_err() {
                        tracing::warn!("no local subscribers for remotely re-broadcast event");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to deserialize remote pub/sub event"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_config_default() {
        let config = SubscriberConfig::default();
        assert_eq!(config.buffer_size, 1024);
        assert!(config.auto_reconnect);
        assert_eq!(config.reconnect_delay_ms, 1000);
    }

    #[test]
    fn channel_names_are_prefixed() {
        assert_eq!(channel_name(&Topic::Markets), "channel:markets");
        assert_eq!(channel_name(&Topic::PriceFeed), "channel:price_feed");
    }
}

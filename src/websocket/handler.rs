//! Per-connection WebSocket loop: subscribe/unsubscribe to topics (C6),
//! receive fanned-out events, and a heartbeat that disconnects a dead
//! peer.
//!
//! Grounded on `handle_socket`'s `tokio::select!` shape in the teacher
//! (broadcast receivers + incoming client messages + periodic interval
//! ticks), generalized from the teacher's several per-feed receivers
//! (trades/orderbook/kline/order-updates) down to the single topic-typed
//! `Event` broadcast C6 publishes on. The teacher has no missed-pong
//! disconnect timer; authored fresh from spec.md's delivery contract
//! using the same `tokio::time::interval` idiom already in use here.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::websocket::channels::{ClientMessage, Event, ServerMessage, Topic};
use crate::AppState;

pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscriptions: HashSet<Topic> = HashSet::new();
    let mut events = state.orchestrator.subscribe_events();

    let heartbeat_period = Duration::from_millis(state.config.heartbeat_interval_ms);
    let mut heartbeat = tokio::time::interval(heartbeat_period);
    let mut last_activity = Instant::now();

    info!("websocket connection opened");

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let Some(incoming) = incoming else {
                    debug!("websocket stream closed by peer");
                    break;
                };
                match incoming {
                    Ok(Message::Text(text)) => {
                        last_activity = Instant::now();
                        if let Some(reply) = handle_client_text(&text, &mut subscriptions) {
                            if send_json(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        last_activity = Instant::now();
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Pong(_)) => {
                        last_activity = Instant::now();
                    }
                    Ok(Message::Close(_)) => {
                        debug!("client sent close frame");
                        break;
                    }
                    Ok(Message::Binary(_)) => {
                        // No binary protocol is defined; ignore rather than drop the
                        // connection, matching the "malformed messages yield a typed
                        // error event, connection is not dropped" contract for text.
                    }
                    Err(e) => {
                        warn!(error = %e, "websocket receive error");
                        break;
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if subscriptions.iter().any(|t| event.topics().contains(t)) {
                            if send_json(&mut sender, &ServerMessage::Event(event)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket connection lagged behind event broadcast");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if last_activity.elapsed() >= heartbeat_period * 2 {
                    info!("no pong or client activity within heartbeat window, closing connection");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("websocket connection closed");
}

fn handle_client_text(text: &str, subscriptions: &mut HashSet<Topic>) -> Option<ServerMessage> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            return Some(ServerMessage::Error {
                message: format!("malformed message: {e}"),
            })
        }
    };

    match message {
        ClientMessage::Subscribe { topic } => match Topic::parse(&topic) {
            Some(parsed) => {
                subscriptions.insert(parsed);
                Some(ServerMessage::Subscribed { topic })
            }
            None => Some(ServerMessage::Error {
                message: format!("unknown topic '{topic}'"),
            }),
        },
        ClientMessage::Unsubscribe { topic } => {
            if let Some(parsed) = Topic::parse(&topic) {
                subscriptions.remove(&parsed);
            }
            Some(ServerMessage::Unsubscribed { topic })
        }
        ClientMessage::Ping => Some(ServerMessage::Pong),
    }
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string());
    sender.send(Message::Text(payload)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_to_known_topic_tracks_it() {
        let mut subs = HashSet::new();
        let reply = handle_client_text(r#"{"type":"Subscribe","topic":"markets"}"#, &mut subs);
        assert!(matches!(reply, Some(ServerMessage::Subscribed { .. })));
        assert!(subs.contains(&Topic::Markets));
    }

    #[test]
    fn subscribe_to_unknown_topic_yields_typed_error_without_state_change() {
        let mut subs = HashSet::new();
        let reply = handle_client_text(r#"{"type":"Subscribe","topic":"nonsense"}"#, &mut subs);
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
        assert!(subs.is_empty());
    }

    #[test]
    fn unsubscribe_removes_topic() {
        let mut subs = HashSet::new();
        subs.insert(Topic::Markets);
        let reply = handle_client_text(r#"{"type":"Unsubscribe","topic":"markets"}"#, &mut subs);
        assert!(matches!(reply, Some(ServerMessage::Unsubscribed { .. })));
        assert!(!subs.contains(&Topic::Markets));
    }

    #[test]
    fn ping_yields_pong() {
        let mut subs = HashSet::new();
        let reply = handle_client_text(r#"{"type":"Ping"}"#, &mut subs);
        assert!(matches!(reply, Some(ServerMessage::Pong)));
    }
}

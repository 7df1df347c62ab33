use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cache;
mod config;
mod db;
mod decimal;
mod error;
mod metrics;
mod models;
mod services;
mod websocket;

use crate::api::middleware::metrics_middleware;
use crate::cache::pubsub::PubSubManager;
use crate::cache::redis_client::RedisClient;
use crate::config::AppConfig;
use crate::db::Database;
use crate::services::agents::{AgentScheduler, NullPolicy};
use crate::services::matching::registry::BookRegistry;
use crate::services::matching::OrderFlowOrchestrator;
use crate::services::persistence;
use crate::services::stats::MarketStatsAggregator;
use crate::websocket::channels::Event;

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub books: Arc<BookRegistry>,
    pub orchestrator: Arc<OrderFlowOrchestrator>,
    pub stats: Arc<MarketStatsAggregator>,
    pub agents: Arc<AgentScheduler>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "predicate_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    tracing::info!("Starting predicate-core v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connected");

    let prometheus_handle = metrics::init_metrics();

    let redis = match &config.broker_url {
        Some(url) => match RedisClient::from_url(url).await {
            Ok(client) => {
                tracing::info!("Redis broker connected at {}", url);
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), running without cross-process fan-out", e);
                None
            }
        },
        None => {
            tracing::warn!("No BROKER_URL configured, running without cross-process fan-out");
            None
        }
    };
    let pubsub = redis
        .clone()
        .map(|redis| Arc::new(PubSubManager::new(redis, config.broker_url.as_deref().unwrap_or(""))));

    let books = Arc::new(BookRegistry::new());

    let persistence_handle = persistence::spawn(db.pool.clone(), config.persistence_queue_capacity);
    tracing::info!("Persistence worker spawned");

    let (events_tx, _events_rx) = tokio::sync::broadcast::channel::<Event>(1024);
    let broker_forward_rx = events_tx.subscribe();
    let remote_listener_tx = events_tx.clone();

    let orchestrator = Arc::new(OrderFlowOrchestrator::new(books.clone(), persistence_handle, events_tx));

    // Re-publish every locally-broadcast event to the shared Redis broker
    // so peer server instances can mirror it to their own sockets — the
    // "local delivery happens before broker publish" ordering the fan-out
    // contract requires (local delivery already happened synchronously
    // inside `OrderFlowOrchestrator::publish_local`).
    if let Some(pubsub) = pubsub.clone() {
        let mut receiver = broker_forward_rx;
        tokio::spawn(async move {
            tracing::info!("Redis broker forwarding worker started");
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Err(e) = pubsub.publisher().publish_event(&event).await {
                            tracing::warn!(error = %e, "failed to re-publish event to Redis broker");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("broker forwarding worker lagged {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::warn!("Redis broker forwarding worker stopped");
        });
    } else {
        drop(broker_forward_rx);
    }

    // Mirror the other half of the fan-out: events published by peer
    // instances arrive over Redis and are re-broadcast onto this node's
    // own local channel so every connected WebSocket sees them, not
    // just the instance that originally matched the trade.
    if let Some(pubsub) = pubsub.clone() {
        tokio::spawn(async move {
            tracing::info!("Redis broker listening worker started");
            loop {
                if let Err(e) = pubsub.run_remote_listener(remote_listener_tx.clone()).await {
                    tracing::warn!(error = %e, "remote event listener connection failed");
                }
                if !pubsub.subscriber_config().auto_reconnect {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(
                    pubsub.subscriber_config().reconnect_delay_ms,
                ))
                .await;
            }
            tracing::warn!("Redis broker listening worker stopped");
        });
    }

    let stats = Arc::new(MarketStatsAggregator::new(db.pool.clone(), books.clone()));

    // No concrete decision policy ships with this crate (spec's
    // Non-goals) — `NullPolicy` skips every tick, so the scheduler is
    // inert until a real `AgentPolicy` is wired in by the caller.
    let agents = Arc::new(AgentScheduler::new(
        orchestrator.clone(),
        Arc::new(NullPolicy),
        config.agent_trading_enabled,
    ));
    tracing::info!(agent_trading_enabled = config.agent_trading_enabled, "agent scheduler initialized");

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        books,
        orchestrator,
        stats,
        agents,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(move || render_metrics(prometheus_handle.clone())))
        .nest("/api/v1", api::routes::create_router())
        .nest("/ws", websocket::routes::create_router(state.clone()))
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn render_metrics(handle: metrics_exporter_prometheus::PrometheusHandle) -> String {
    handle.render()
}

async fn health_check() -> &'static str {
    "OK"
}

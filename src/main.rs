use actix::prelude::*;
use actix_web::{web, App, HttpServer};
use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_relay::actors::HealthMonitorActor;
use order_relay::api::{self, AppState};
use order_relay::broadcast::Broadcaster;
use order_relay::config::Config;
use order_relay::domain::catalog::parse_seed;
use order_relay::domain::order::OrderService;
use order_relay::metrics::Metrics;
use order_relay::notifications::{JsonFilePreferenceStore, LogAlertSink, SeedBaseline, ViewerSession};
use order_relay::store::{connect_postgres, InMemoryOrderStore, OrderStore, PostgresOrderStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=order_relay=trace cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_relay=debug"))
        )
        .init();

    let config = Config::parse();
    tracing::info!(
        policy = %config.transition_policy,
        broadcast_capacity = config.broadcast_capacity,
        "🚀 Starting order relay"
    );

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Order store ===
    let store: Arc<dyn OrderStore> = match &config.database_url {
        Some(url) => {
            let pool = connect_postgres(url, config.db_max_connections)
                .await
                .context("connecting to PostgreSQL")?;
            let store = PostgresOrderStore::new(pool);
            store.migrate().await.context("applying database schema")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory and lost on restart");
            Arc::new(InMemoryOrderStore::new())
        }
    };

    // === 3. Engine and broadcaster ===
    let broadcaster = Broadcaster::new(config.broadcast_capacity, metrics.clone());
    let service = OrderService::new(
        store.clone(),
        broadcaster.clone(),
        config.transition_policy,
        metrics.clone(),
    );

    if let Some(path) = &config.seed_catalog {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading catalog seed {}", path.display()))?;
        let items = parse_seed(&raw).context("parsing catalog seed")?;
        let count = items.len();
        for item in items {
            service.upsert_catalog_item(item).await?;
        }
        tracing::info!(count, path = %path.display(), "Seeded catalog");
    }

    // === 4. Actors ===
    let health = HealthMonitorActor::new(store.clone(), broadcaster.clone(), config.health_interval()).start();

    // Held for the lifetime of the server.
    let _console_session = if config.console_alerts {
        let session = ViewerSession::connect(
            "console",
            service.subscribe(),
            config.debounce(),
            Arc::new(JsonFilePreferenceStore::new(&config.preferences_dir)),
            Arc::new(LogAlertSink),
            metrics.clone(),
        )
        .await?;
        let current = service.list(&[]).await?;
        session.do_send(SeedBaseline(current.iter().map(|order| order.id).collect()));
        tracing::info!(known_orders = current.len(), "🔔 Console alerts enabled");
        Some(session)
    } else {
        None
    };

    // === 5. HTTP server ===
    let state = AppState {
        service,
        health,
        metrics,
    };

    tracing::info!("🌐 Listening on http://{}:{}", config.bind_addr, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(api::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    tracing::info!("🛑 Order relay stopped");
    Ok(())
}

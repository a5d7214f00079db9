//! orgtree-server — standalone REST server.
//!
//! Reads config from env vars (see `config.rs`); `.env` is loaded first.

use std::sync::Arc;

use orgtree_core::queue::TaskQueue;
use orgtree_postgres::PgStores;
use orgtree_server::config::Config;
use orgtree_server::middleware::jwt::JwtConfig;
use orgtree_server::router::build_router;
use orgtree_server::state::AppState;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orgtree_server=debug".into()),
        )
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    tracing::info!("Connected to database");

    let stores = PgStores::new(pool);

    // The propagation worker that pushes policies to managed endpoints is
    // an external collaborator; it consumes this channel. The drain below
    // logs each hand-off so the queue keeps moving until one is attached.
    let (queue, mut tasks) = TaskQueue::new();
    tokio::spawn(async move {
        while let Some(task) = tasks.recv().await {
            tracing::info!(
                task_id = %task.task_id,
                op = task.op.as_str(),
                kind = %task.kind,
                "propagation task handed off"
            );
        }
    });

    let state = AppState::new(
        Arc::new(stores.nodes),
        Arc::new(stores.jobs),
        Arc::new(queue),
        config.default_pagesize,
    );

    let jwt_config = JwtConfig::from_secret(config.jwt_secret.as_bytes());
    let app = build_router(state, jwt_config);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {}: {e}", config.bind_addr));
    tracing::info!("orgtree-server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("server error");
}

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recast::config::ServerConfig;
use recast::fanout::DEFAULT_QUEUE_CAPACITY;
use recast::game::{HttpOptionGenerator, OptionGenerator, PlaceholderOptionGenerator};
use recast::lobby::{self, repository::PostgresLobbyStore};
use recast::session::{self, TokenConfig, DEFAULT_EXPIRATION_DAYS};
use recast::websockets;
use recast::{AppState, InMemoryLobbyStore, LobbyStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    info!("Starting Re:cast lobby server");

    let store: Arc<dyn LobbyStore> = if config.uses_memory_store() {
        info!("Using in-memory lobby store");
        Arc::new(InMemoryLobbyStore::new())
    } else {
        let pool = sqlx::PgPool::connect(&config.database_url).await?;
        let store = PostgresLobbyStore::new(pool);
        store.migrate().await?;
        info!("Using Postgres lobby store");
        Arc::new(store)
    };

    let generator: Arc<dyn OptionGenerator> = match &config.generator_url {
        Some(url) => Arc::new(HttpOptionGenerator::new(
            url.clone(),
            config.generator_api_key.clone(),
            config.generator_timeout(),
        )?),
        None => {
            warn!("OPTION_GENERATOR_URL not set, using placeholder options");
            Arc::new(PlaceholderOptionGenerator)
        }
    };

    let app_state = AppState::new(
        store,
        generator,
        config.game_rules(),
        TokenConfig::new(config.jwt_secret.clone(), DEFAULT_EXPIRATION_DAYS),
        DEFAULT_QUEUE_CAPACITY,
    );

    tokio::spawn(lobby::start_cleanup_task(
        app_state.janitor(),
        config.cleanup_config(),
    ));

    let app = Router::new()
        .route("/health", get(lobby::health))
        .route("/session", post(session::create_session))
        .route("/lobby", post(lobby::create_lobby))
        .route("/lobby/:code", get(lobby::get_lobby))
        .route("/ws/:code", get(websockets::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(listen_addr = %config.listen_addr, "Server running");
    axum::serve(listener, app).await?;
    Ok(())
}

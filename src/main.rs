//! Folio server
//!
//! Serves the inference relay and the life statistics API.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::config::Config;
use folio::engine::SqliteStore;
use folio::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let db_path = config.database_path();
    let store = Arc::new(SqliteStore::new(&db_path).await?);
    tracing::info!("Key/value store at {}", db_path.display());

    // No overall timeout: generation streams can run for minutes.
    let http = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .build()?;

    let app = folio::app(AppState::new(http, store));

    tracing::info!("Folio API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

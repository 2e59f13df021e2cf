use std::sync::Arc;
use tracing::info;

use mongo_helper::{config::Config, db::Database, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::from_env()?;
    let db = Database::new(&config).await?;
    db.connect().await?;

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });
    let app = mongo_helper::create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    info!("Server starting on {}", config.server_address);

    axum::serve(listener, app).await?;

    Ok(())
}

use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cyclefit_backend::{config::AppConfig, cycle::CycleScheduler, routes, store};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let store = store::connect(&config.database_url, config.max_connections).await?;
    let scheduler = Arc::new(CycleScheduler::new(store));

    let app = routes::router(scheduler).layer(TraceLayer::new_for_http());

    tracing::info!("🧠 Server running at {}", config.bind_addr);

    axum::serve(
        tokio::net::TcpListener::bind(config.bind_addr).await?,
        app.into_make_service(),
    )
    .await?;

    Ok(())
}

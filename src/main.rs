use std::{sync::Arc, time::Duration};

use marquee::{AppState, catalog_client, config::Config, db, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,marquee=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent("marquee/0.1")
        .timeout(Duration::from_secs(30))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let catalog = catalog_client(&config, http)?;

    let state =
        Arc::new(AppState::new(db, catalog, &config.auth, config.ingest.clone()));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");

    if config.ingest.on_startup {
        let ingestor = state.ingestor.clone();
        tokio::spawn(async move {
            ingestor.run().await;
        });
    }

    axum::serve(listener, router(state)).await?;

    Ok(())
}

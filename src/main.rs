use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use relay_admin::config::Config;
use relay_admin::profile::ProfileRepository;
use relay_admin::server::{self, AppState};
use relay_admin::store::DocumentStore;
use relay_admin::translate::TranslateClient;
use relay_admin::validator::Validator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_admin=info".parse()?),
        )
        .init();

    info!("Starting relay-admin");

    // Load configuration from environment
    let config = Arc::new(Config::from_env()?);

    // Construct-once client handles; everything downstream receives these by
    // injection.
    let store = DocumentStore::new(&config.database_path)?;
    let repo = ProfileRepository::new(store);
    let validator = Validator::new(repo.clone());
    let translate = TranslateClient::new(
        reqwest::Client::new(),
        config.translate_api_url.clone(),
        config.translate_api_key.clone(),
        config.translate_formality,
    );

    let state = AppState {
        config: config.clone(),
        repo,
        validator,
        translate,
    };

    let app = server::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use vk_identity_oauth2::{InMemoryStateStore, VkProvider};
use vk_login_server::config::AppConfig;
use vk_login_server::routes::{AppState, router};
use vk_login_server::{spawn_flow_sweeper, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = AppConfig::load()?;
    telemetry::init_tracing(config.environment);
    info!(
        "Starting VK login server ({:?}, debug: {})",
        config.environment,
        config.debug()
    );

    let provider = Arc::new(
        VkProvider::new(
            config.provider.clone(),
            config.settings.oauth2_config(),
            Arc::new(InMemoryStateStore::new()),
        )
        .context("Failed to create VK provider")?,
    );

    let _sweeper = spawn_flow_sweeper(provider.clone(), config.settings.sweep_interval());

    let app = router(AppState { provider });

    let addr = config.settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Sign in at http://{}/auth/vk/login", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

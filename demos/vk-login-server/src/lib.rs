//! Minimal axum host for the VK provider: issues redirects, handles the
//! callback and returns the normalized profile.

pub mod config;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vk_identity_oauth2::VkProvider;

/// Periodically drop flows whose redirect was never answered.
pub fn spawn_flow_sweeper(provider: Arc<VkProvider>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            match provider.sweep_expired_flows().await {
                Ok(0) => {}
                Ok(removed) => debug!("Swept {} expired login flows", removed),
                Err(e) => warn!("Failed to sweep expired login flows: {}", e),
            }
        }
    })
}

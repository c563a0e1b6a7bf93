//! Configuration for the login server
//!
//! Listener and flow settings are layered: defaults, then an optional
//! `vk-login.toml` (or the file named by `VK_LOGIN_CONFIG_FILE`), then
//! `VK_LOGIN__*` environment variables, e.g. `VK_LOGIN__SERVER__PORT=8080`.
//! VK credentials are read separately from `AUTH_VK_ID` / `AUTH_VK_SECRET`.

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info};
use vk_identity_oauth2::{
    MAX_STATE_TTL_SECONDS, OAuth2Config, RuntimeEnvironment, VkProviderConfig,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub server: ListenConfig,
    pub flow: FlowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Host to bind to (default: 127.0.0.1)
    pub host: IpAddr,
    /// Port to bind to (default: 3000)
    pub port: u16,
}

/// Login flow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// How long an issued redirect stays redeemable
    pub state_ttl_seconds: u64,
    /// Timeout for each call to VK
    pub http_timeout_seconds: u64,
    /// How often abandoned flows are swept
    pub sweep_interval_seconds: u64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        let defaults = OAuth2Config::default();
        Self {
            state_ttl_seconds: defaults.state_ttl_seconds,
            http_timeout_seconds: defaults.http_timeout_seconds,
            sweep_interval_seconds: 60,
        }
    }
}

impl ServerSettings {
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        let config_path =
            std::env::var("VK_LOGIN_CONFIG_FILE").unwrap_or_else(|_| "vk-login.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            info!("Loading configuration from {}", config_path);
            builder = builder.add_source(File::with_name(&config_path));
        } else {
            debug!("No config file found at {}, using defaults", config_path);
        }

        builder = builder.add_source(
            Environment::with_prefix("VK_LOGIN")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: ServerSettings = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.server.port != 0, "server.port must not be 0");
        anyhow::ensure!(
            (1..=MAX_STATE_TTL_SECONDS).contains(&self.flow.state_ttl_seconds),
            "flow.state_ttl_seconds must be between 1 and {}",
            MAX_STATE_TTL_SECONDS
        );
        anyhow::ensure!(
            self.flow.http_timeout_seconds > 0,
            "flow.http_timeout_seconds must be positive"
        );
        anyhow::ensure!(
            self.flow.sweep_interval_seconds > 0,
            "flow.sweep_interval_seconds must be positive"
        );
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    pub fn oauth2_config(&self) -> OAuth2Config {
        OAuth2Config::new()
            .with_state_ttl(self.flow.state_ttl_seconds)
            .with_http_timeout(self.flow.http_timeout_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.flow.sweep_interval_seconds)
    }
}

/// Everything the server needs at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: ServerSettings,
    pub provider: VkProviderConfig,
    pub environment: RuntimeEnvironment,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Ok(Self {
            settings: ServerSettings::load()?,
            provider: VkProviderConfig::from_env().context("Failed to load VK credentials")?,
            environment: RuntimeEnvironment::from_env(),
        })
    }

    pub fn debug(&self) -> bool {
        self.environment.is_debug()
    }
}

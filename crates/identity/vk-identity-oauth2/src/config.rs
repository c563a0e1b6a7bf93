//! Provider and flow configuration.

use crate::error::{OAuth2Error, OAuth2Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

pub const VK_PROVIDER_ID: &str = "vk";
pub const VK_AUTHORIZATION_ENDPOINT: &str = "https://id.vk.com/authorize";
pub const VK_TOKEN_ENDPOINT: &str = "https://id.vk.com/oauth2/auth";
pub const VK_USERINFO_ENDPOINT: &str =
    "https://api.vk.com/method/users.get?fields=photo_100&v=5.131";
pub const DEVICE_ID_PARAM: &str = "device_id";

pub const ENV_CLIENT_ID: &str = "AUTH_VK_ID";
pub const ENV_CLIENT_SECRET: &str = "AUTH_VK_SECRET";
pub const ENV_REDIRECT_URI: &str = "AUTH_VK_REDIRECT_URI";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/auth/vk/callback";

/// VK provider settings. Built once at startup and shared read-only.
#[derive(Clone, Serialize, Deserialize)]
pub struct VkProviderConfig {
    pub provider_id: String,
    pub client_id: String,
    /// Kept for hosts that need it; the PKCE exchange does not send it.
    pub client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Name of the non-standard parameter carried from redirect to exchange
    pub side_channel_param: String,
    /// Extra static parameters for the authorization redirect
    pub auth_params: HashMap<String, String>,
}

impl fmt::Debug for VkProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VkProviderConfig")
            .field("provider_id", &self.provider_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("userinfo_endpoint", &self.userinfo_endpoint)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("side_channel_param", &self.side_channel_param)
            .field("auth_params", &self.auth_params)
            .finish()
    }
}

impl VkProviderConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: VK_PROVIDER_ID.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorization_endpoint: VK_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: VK_TOKEN_ENDPOINT.to_string(),
            userinfo_endpoint: VK_USERINFO_ENDPOINT.to_string(),
            redirect_uri: redirect_uri.into(),
            scopes: vec!["email".to_string()],
            side_channel_param: DEVICE_ID_PARAM.to_string(),
            auth_params: HashMap::new(),
        }
    }

    /// Read credentials from `AUTH_VK_ID`, `AUTH_VK_SECRET` and `AUTH_VK_REDIRECT_URI`.
    pub fn from_env() -> OAuth2Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> OAuth2Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    OAuth2Error::ConfigError(format!("{} environment variable is required", key))
                })
        };

        let client_id = required(ENV_CLIENT_ID)?;
        let client_secret = required(ENV_CLIENT_SECRET)?;
        let redirect_uri =
            lookup(ENV_REDIRECT_URI).unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        let config = Self::new(client_id, client_secret, redirect_uri);
        config.validate()?;
        Ok(config)
    }

    pub fn with_endpoints(
        mut self,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        userinfo_endpoint: impl Into<String>,
    ) -> Self {
        self.authorization_endpoint = authorization_endpoint.into();
        self.token_endpoint = token_endpoint.into();
        self.userinfo_endpoint = userinfo_endpoint.into();
        self
    }

    pub fn with_auth_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_params.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> OAuth2Result<()> {
        if self.client_id.is_empty() {
            return Err(OAuth2Error::ConfigError("client_id must not be empty".to_string()));
        }
        if self.side_channel_param.is_empty() {
            return Err(OAuth2Error::ConfigError(
                "side_channel_param must not be empty".to_string(),
            ));
        }
        for endpoint in [
            &self.authorization_endpoint,
            &self.token_endpoint,
            &self.userinfo_endpoint,
            &self.redirect_uri,
        ] {
            Url::parse(endpoint)?;
        }
        Ok(())
    }
}

/// Longest a flow may wait for its callback (one day).
pub const MAX_STATE_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Flow-level settings shared by every provider.
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    pub state_ttl_seconds: u64,
    pub http_timeout_seconds: u64,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            state_ttl_seconds: 600, // 10 minutes
            http_timeout_seconds: 30,
        }
    }
}

impl OAuth2Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state_ttl(mut self, seconds: u64) -> Self {
        self.state_ttl_seconds = seconds;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    pub fn validate(&self) -> OAuth2Result<()> {
        if self.state_ttl_seconds == 0 || self.state_ttl_seconds > MAX_STATE_TTL_SECONDS {
            return Err(OAuth2Error::ConfigError(format!(
                "state_ttl_seconds must be between 1 and {}, got {}",
                MAX_STATE_TTL_SECONDS, self.state_ttl_seconds
            )));
        }
        if self.http_timeout_seconds == 0 {
            return Err(OAuth2Error::ConfigError(
                "http_timeout_seconds must not be 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deployment environment, read from `APP_ENV` (or `RUST_ENV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    Development,
    Test,
    #[default]
    Production,
}

impl RuntimeEnvironment {
    pub fn from_env() -> Self {
        std::env::var("APP_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }

    /// Unknown names fall back to production.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => RuntimeEnvironment::Development,
            "test" => RuntimeEnvironment::Test,
            _ => RuntimeEnvironment::Production,
        }
    }

    pub fn is_debug(self) -> bool {
        self == RuntimeEnvironment::Development
    }
}

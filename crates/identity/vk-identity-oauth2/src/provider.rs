//! VK identity provider: ties the client, the flow tracker and the host hooks together.

use crate::callback::{CallbackRequest, TokenRequestContext};
use crate::client::{AuthorizationRedirect, OAuth2Client};
use crate::config::{OAuth2Config, VkProviderConfig};
use crate::error::{OAuth2Error, OAuth2Result};
use crate::flow::{FlowStage, FlowTracker};
use crate::profile::normalize_profile;
use crate::state::OAuth2StateStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use vk_identity_core::{
    IdentityError, IdentityProvider, IdentityResult, OAuthProviderHooks, TokenRequestOutput,
    TokenSet, UserProfile, VerifiedIdentity,
};

/// Static description the host uses to list and label the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub checks: Vec<String>,
}

/// Payload accepted by [`IdentityProvider::verify`]
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VkAuthPayload {
    /// Start the flow; the response carries the authorization URL
    StartFlow { device_id: Option<String> },
    /// Complete the flow from the callback's raw query string
    Callback { query: String },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VkResponse {
    AuthorizationUrl { url: String, state: String },
    Error { message: String },
}

/// Result of a completed login
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    pub tokens: TokenSet,
    pub profile: UserProfile,
}

#[derive(Clone)]
pub struct VkProvider {
    provider_config: Arc<VkProviderConfig>,
    client: OAuth2Client,
}

impl VkProvider {
    pub fn new(
        provider_config: VkProviderConfig,
        config: OAuth2Config,
        state_store: Arc<dyn OAuth2StateStore>,
    ) -> OAuth2Result<Self> {
        provider_config.validate()?;
        config.validate()?;
        let client = OAuth2Client::new(
            state_store,
            config.state_ttl_seconds,
            config.http_timeout_seconds,
        )?;

        Ok(Self {
            provider_config: Arc::new(provider_config),
            client,
        })
    }

    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: self.provider_config.provider_id.clone(),
            name: "VK".to_string(),
            kind: "oauth".to_string(),
            version: "2.0".to_string(),
            checks: vec!["pkce".to_string(), "state".to_string()],
        }
    }

    pub fn provider_config(&self) -> &VkProviderConfig {
        &self.provider_config
    }

    /// Issue the authorization redirect, optionally carrying a `device_id`.
    pub async fn start_flow(&self, device_id: Option<String>) -> OAuth2Result<AuthorizationRedirect> {
        let redirect = self
            .client
            .generate_authorization_url(&self.provider_config, device_id)
            .await?;

        info!("Started VK login flow {}", redirect.state);
        Ok(redirect)
    }

    /// Handle the provider's redirect back: validate, exchange, fetch, normalize.
    pub async fn complete_flow(&self, callback: CallbackRequest) -> OAuth2Result<CompletedLogin> {
        let mut flow = FlowTracker::resume(callback.params.state().unwrap_or("<missing>"));

        match self.run_callback(&mut flow, &callback).await {
            Ok(login) => {
                flow.advance(FlowStage::Authenticated)?;
                info!("VK login flow {} authenticated user {}", flow.state(), login.profile.id);
                Ok(login)
            }
            Err(err) => Err(flow.fail(err)),
        }
    }

    async fn run_callback(
        &self,
        flow: &mut FlowTracker,
        callback: &CallbackRequest,
    ) -> OAuth2Result<CompletedLogin> {
        flow.advance(FlowStage::CallbackReceived)?;

        let context = self
            .client
            .prepare_token_request(&self.provider_config, callback)
            .await?;

        flow.advance(FlowStage::ExchangePending)?;

        let TokenRequestOutput { tokens } = self.request_token(context).await?;
        let raw_profile = self
            .client
            .get_user_info(&self.provider_config, &tokens.access_token)
            .await?;
        let profile = self.profile(raw_profile)?;

        Ok(CompletedLogin { tokens, profile })
    }

    /// Drop flows whose redirect was never answered.
    pub async fn sweep_expired_flows(&self) -> OAuth2Result<usize> {
        self.client.state_store().cleanup_expired().await
    }

    fn to_verified_identity(&self, profile: UserProfile) -> VerifiedIdentity {
        let mut metadata = serde_json::Map::new();
        if let Some(image) = &profile.image {
            metadata.insert(
                "image".to_string(),
                serde_json::Value::String(image.clone()),
            );
        }

        VerifiedIdentity {
            provider_id: format!("oauth2:{}", self.provider_config.provider_id),
            subject: profile.id.to_string(),
            email: profile.email,
            display_name: Some(profile.name).filter(|name| !name.is_empty()),
            metadata: if metadata.is_empty() {
                None
            } else {
                Some(serde_json::Value::Object(metadata))
            },
        }
    }
}

#[async_trait]
impl OAuthProviderHooks for VkProvider {
    type Context = TokenRequestContext;
    type Error = OAuth2Error;

    async fn request_token(
        &self,
        context: TokenRequestContext,
    ) -> Result<TokenRequestOutput, OAuth2Error> {
        let tokens = self.client.exchange_code(&context).await?;
        Ok(TokenRequestOutput { tokens })
    }

    fn profile(&self, raw_profile: serde_json::Value) -> Result<UserProfile, OAuth2Error> {
        normalize_profile(raw_profile)
    }
}

#[async_trait]
impl IdentityProvider for VkProvider {
    fn provider_id(&self) -> &str {
        &self.provider_config.provider_id
    }

    async fn verify(&self, auth_payload: serde_json::Value) -> IdentityResult<VerifiedIdentity> {
        let payload: VkAuthPayload =
            serde_json::from_value(auth_payload).map_err(|_| IdentityError::InvalidPayload)?;

        match payload {
            VkAuthPayload::StartFlow { device_id } => {
                // The authorization URL travels back as a provider error
                let response = match self.start_flow(device_id).await {
                    Ok(redirect) => VkResponse::AuthorizationUrl {
                        url: redirect.url,
                        state: redirect.state,
                    },
                    Err(err) => VkResponse::Error {
                        message: err.to_string(),
                    },
                };
                let response_json = serde_json::to_string(&response)?;
                Err(IdentityError::ProviderError(response_json))
            }
            VkAuthPayload::Callback { query } => {
                let login = self
                    .complete_flow(CallbackRequest::from_raw_query(query))
                    .await
                    .map_err(|e| IdentityError::ProviderError(e.to_string()))?;
                Ok(self.to_verified_identity(login.profile))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REDIRECT_URI;
    use crate::state::InMemoryStateStore;
    use vk_identity_core::ProfileId;

    fn create_test_provider() -> VkProvider {
        let provider_config = VkProviderConfig::new("51234567", "secret", DEFAULT_REDIRECT_URI);
        VkProvider::new(
            provider_config,
            OAuth2Config::default(),
            Arc::new(InMemoryStateStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_descriptor() {
        let provider = create_test_provider();
        let descriptor = provider.descriptor();
        assert_eq!(descriptor.id, "vk");
        assert_eq!(descriptor.name, "VK");
        assert_eq!(descriptor.version, "2.0");
        assert_eq!(descriptor.checks, vec!["pkce", "state"]);

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["type"], "oauth");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut provider_config = VkProviderConfig::new("51234567", "secret", DEFAULT_REDIRECT_URI);
        provider_config.token_endpoint = "::not a url::".to_string();

        let result = VkProvider::new(
            provider_config,
            OAuth2Config::default(),
            Arc::new(InMemoryStateStore::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_start_flow_via_verify() {
        let provider = create_test_provider();

        let payload = serde_json::json!({
            "type": "StartFlow",
            "device_id": "device-1"
        });

        match provider.verify(payload).await {
            Err(IdentityError::ProviderError(response_json)) => {
                let response: VkResponse = serde_json::from_str(&response_json).unwrap();
                match response {
                    VkResponse::AuthorizationUrl { url, state } => {
                        assert!(url.starts_with("https://id.vk.com/authorize?"));
                        assert!(url.contains("response_type=code"));
                        assert!(url.contains("device_id=device-1"));
                        assert!(!state.is_empty());
                    }
                    other => panic!("Expected AuthorizationUrl response, got {:?}", other),
                }
            }
            other => panic!("Expected ProviderError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let provider = create_test_provider();
        let result = provider
            .verify(serde_json::json!({ "type": "Unknown" }))
            .await;
        assert!(matches!(result, Err(IdentityError::InvalidPayload)));
    }

    #[test]
    fn test_profile_hook_and_identity_mapping() {
        let provider = create_test_provider();
        let profile = provider
            .profile(serde_json::json!({
                "id": 42,
                "first_name": "Ada",
                "last_name": "Lovelace",
                "photo_100": "http://x/y.png"
            }))
            .unwrap();
        assert_eq!(profile.id, ProfileId::Numeric(42));

        let identity = provider.to_verified_identity(profile);
        assert_eq!(identity.provider_id, "oauth2:vk");
        assert_eq!(identity.subject, "42");
        assert_eq!(identity.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(identity.email, None);
        assert_eq!(identity.metadata.unwrap()["image"], "http://x/y.png");
    }

    #[test]
    fn test_identity_mapping_without_name() {
        let provider = create_test_provider();
        let profile = provider.profile(serde_json::json!({ "id": 1 })).unwrap();
        let identity = provider.to_verified_identity(profile);
        assert_eq!(identity.display_name, None);
        assert!(identity.metadata.is_none());
    }
}

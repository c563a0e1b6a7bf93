//! VK ID client: authorization redirect, code exchange and user lookup.

use crate::callback::{CallbackRequest, TokenRequestContext};
use crate::config::VkProviderConfig;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::pkce::PkceChallenge;
use crate::state::{OAuth2State, OAuth2StateStore};
use crate::types::TokenResponse;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use vk_identity_core::TokenSet;

/// Where to send the browser, and the state token that correlates the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRedirect {
    pub url: String,
    pub state: String,
}

#[derive(Clone)]
pub struct OAuth2Client {
    http_client: Client,
    state_store: Arc<dyn OAuth2StateStore>,
    state_ttl_seconds: u64,
}

impl OAuth2Client {
    pub fn new(
        state_store: Arc<dyn OAuth2StateStore>,
        state_ttl_seconds: u64,
        http_timeout_seconds: u64,
    ) -> OAuth2Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(http_timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            state_store,
            state_ttl_seconds,
        })
    }

    pub fn state_store(&self) -> &Arc<dyn OAuth2StateStore> {
        &self.state_store
    }

    /// Build the authorization URL and persist the flow under its state token.
    ///
    /// `side_channel` is appended to the URL under the provider's
    /// `side_channel_param` and stored with the flow, so the exchange can
    /// reattach it after the host has stripped it from the callback.
    pub async fn generate_authorization_url(
        &self,
        provider_config: &VkProviderConfig,
        side_channel: Option<String>,
    ) -> OAuth2Result<AuthorizationRedirect> {
        let mut url = Url::parse(&provider_config.authorization_endpoint)?;
        let pkce = PkceChallenge::new();
        let side_channel = side_channel.filter(|value| !value.is_empty());

        let state = OAuth2State::new(
            provider_config.provider_id.clone(),
            provider_config.redirect_uri.clone(),
            pkce.code_verifier.clone(),
            side_channel.clone(),
            self.state_ttl_seconds,
        );
        let state_param = state.state.clone();

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &provider_config.client_id);
            params.append_pair("redirect_uri", &provider_config.redirect_uri);
            params.append_pair("state", &state_param);

            if !provider_config.scopes.is_empty() {
                params.append_pair("scope", &provider_config.scopes.join(" "));
            }

            params.append_pair("code_challenge", &pkce.code_challenge);
            params.append_pair("code_challenge_method", pkce.method());

            for (key, value) in &provider_config.auth_params {
                params.append_pair(key, value);
            }

            if let Some(value) = &side_channel {
                params.append_pair(&provider_config.side_channel_param, value);
            }
        }

        self.state_store.store(state).await?;

        debug!(
            "Generated authorization URL for provider {} (state {}, {} attached: {})",
            provider_config.provider_id,
            state_param,
            provider_config.side_channel_param,
            side_channel.is_some()
        );

        Ok(AuthorizationRedirect {
            url: url.to_string(),
            state: state_param,
        })
    }

    /// Validate the callback against stored state and build the exchange context.
    ///
    /// The stored state is consumed here whether or not validation succeeds.
    pub async fn prepare_token_request(
        &self,
        provider_config: &Arc<VkProviderConfig>,
        callback: &CallbackRequest,
    ) -> OAuth2Result<TokenRequestContext> {
        let state_param = callback.params.state().ok_or_else(|| {
            OAuth2Error::StateMismatch("callback carried no state parameter".to_string())
        })?;

        let state = self.state_store.retrieve(state_param).await?;

        if state.provider_id != provider_config.provider_id {
            return Err(OAuth2Error::StateMismatch(format!(
                "state issued for provider '{}', callback handled by '{}'",
                state.provider_id, provider_config.provider_id
            )));
        }
        if state.redirect_uri != provider_config.redirect_uri {
            return Err(OAuth2Error::StateMismatch(
                "redirect_uri differs from the one used at authorization".to_string(),
            ));
        }

        if let Some(error) = callback.params.error() {
            let error_desc = callback
                .params
                .error_description()
                .unwrap_or("No description");
            return Err(OAuth2Error::CallbackError(format!(
                "{}: {}",
                error, error_desc
            )));
        }

        TokenRequestContext::new(Arc::clone(provider_config), &state, callback)
    }

    /// Exchange the authorization code for tokens. One request, never retried.
    pub async fn exchange_code(&self, context: &TokenRequestContext) -> OAuth2Result<TokenSet> {
        let response = self
            .http_client
            .post(&context.provider.token_endpoint)
            .form(&context.form_fields())
            .send()
            .await
            .map_err(OAuth2Error::TokenExchangeTransport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(OAuth2Error::TokenExchangeTransport)?;

        // A body that is not JSON is treated like one without an access token
        let tokens = serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .and_then(TokenResponse::into_token_set);

        match tokens {
            Some(tokens) if status.is_success() => {
                info!("Successfully exchanged code for tokens");
                Ok(tokens)
            }
            _ => Err(OAuth2Error::TokenExchangeFailed {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            }),
        }
    }

    /// Fetch the raw `users.get` response for the token's owner.
    pub async fn get_user_info(
        &self,
        provider_config: &VkProviderConfig,
        access_token: &str,
    ) -> OAuth2Result<serde_json::Value> {
        let response = self
            .http_client
            .get(&provider_config.userinfo_endpoint)
            .query(&[("access_token", access_token)])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuth2Error::ProfileFetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OAuth2Error::ProfileFetchFailed(format!(
                "{}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OAuth2Error::ProfileFetchFailed(format!("invalid JSON: {}", e)))
    }
}

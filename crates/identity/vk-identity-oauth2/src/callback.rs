//! Callback parsing and side-channel recovery.
//!
//! Authentication hosts canonicalize the callback query before handing it to
//! provider hooks and drop every parameter that is not part of the OAuth2 /
//! OIDC response vocabulary. [`CallbackParams`] models that canonical view.
//! VK's `device_id` never survives it, so [`recover_side_channel`] looks for
//! the value in the flow's stored state first and the untouched callback URL
//! second.

use crate::config::VkProviderConfig;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::state::OAuth2State;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::{Url, form_urlencoded};

/// Parameters a canonical callback parser keeps; everything else is dropped.
pub const STANDARD_CALLBACK_PARAMS: &[&str] = &[
    "access_token",
    "code",
    "error",
    "error_description",
    "error_uri",
    "expires_in",
    "id_token",
    "iss",
    "response",
    "session_state",
    "state",
    "token_type",
];

fn is_standard_param(key: &str) -> bool {
    STANDARD_CALLBACK_PARAMS.contains(&key)
}

/// Sanitized callback parameters, as the host framework would present them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    params: BTreeMap<String, String>,
}

impl CallbackParams {
    /// Parse a raw query string, keeping only standard parameters.
    pub fn from_query(query: &str) -> Self {
        let params = form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .filter(|(key, _)| is_standard_param(key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn code(&self) -> Option<&str> {
        self.get("code").filter(|code| !code.is_empty())
    }

    pub fn state(&self) -> Option<&str> {
        self.get("state").filter(|state| !state.is_empty())
    }

    pub fn error(&self) -> Option<&str> {
        self.get("error")
    }

    pub fn error_description(&self) -> Option<&str> {
        self.get("error_description")
    }
}

/// A callback as received: the sanitized view plus the raw query it came from.
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    pub params: CallbackParams,
    pub raw_query: Option<String>,
}

impl CallbackRequest {
    pub fn from_raw_query(query: impl Into<String>) -> Self {
        let raw_query = query.into();
        Self {
            params: CallbackParams::from_query(&raw_query),
            raw_query: Some(raw_query),
        }
    }

    /// Build from a full callback URL such as `https://app/callback?code=..`.
    pub fn from_url(url: &str) -> OAuth2Result<Self> {
        let url = Url::parse(url)?;
        Ok(Self::from_raw_query(url.query().unwrap_or_default()))
    }

    /// Sanitized parameters only; nothing to recover from.
    pub fn from_params(params: CallbackParams) -> Self {
        Self {
            params,
            raw_query: None,
        }
    }
}

/// Where a recovered side-channel value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideChannelSource {
    FlowState,
    RawCallback,
}

/// Recover the side-channel value for a flow.
///
/// The value stored at redirect time wins; the raw callback query is only
/// consulted when nothing was stored. Empty values count as absent.
pub fn recover_side_channel(
    param: &str,
    stored: Option<&str>,
    raw_query: Option<&str>,
) -> Option<(String, SideChannelSource)> {
    let from_raw = raw_query.and_then(|query| {
        form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .find(|(key, _)| key == param)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    });

    match (stored.filter(|value| !value.is_empty()), from_raw) {
        (Some(stored), raw) => {
            if raw.as_deref().is_some_and(|raw| raw != stored) {
                warn!(
                    "Callback carried a different {} than the one issued; using the stored value",
                    param
                );
            }
            Some((stored.to_string(), SideChannelSource::FlowState))
        }
        (None, Some(raw)) => Some((raw, SideChannelSource::RawCallback)),
        (None, None) => None,
    }
}

/// Everything the `token.request` hook needs, checked before any network call.
#[derive(Clone)]
pub struct TokenRequestContext {
    pub provider: Arc<VkProviderConfig>,
    pub code: String,
    pub code_verifier: String,
    pub params: CallbackParams,
    pub side_channel: String,
}

impl std::fmt::Debug for TokenRequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequestContext")
            .field("provider", &self.provider.provider_id)
            .field("code_verifier", &"<redacted>")
            .field("side_channel", &self.side_channel)
            .finish_non_exhaustive()
    }
}

impl TokenRequestContext {
    pub fn new(
        provider: Arc<VkProviderConfig>,
        flow_state: &OAuth2State,
        callback: &CallbackRequest,
    ) -> OAuth2Result<Self> {
        let code = callback
            .params
            .code()
            .ok_or(OAuth2Error::MissingAuthorizationCode)?
            .to_string();

        if flow_state.code_verifier.is_empty() {
            return Err(OAuth2Error::StateMismatch(
                "stored flow has no PKCE verifier".to_string(),
            ));
        }

        let (side_channel, source) = recover_side_channel(
            &provider.side_channel_param,
            flow_state.side_channel.as_deref(),
            callback.raw_query.as_deref(),
        )
        .ok_or_else(|| OAuth2Error::MissingSideChannelValue(provider.side_channel_param.clone()))?;

        debug!(
            "Recovered {} for state {} from {:?}",
            provider.side_channel_param, flow_state.state, source
        );

        Ok(Self {
            code,
            code_verifier: flow_state.code_verifier.clone(),
            params: callback.params.clone(),
            side_channel,
            provider,
        })
    }

    /// Form body for the token endpoint, in wire order.
    pub fn form_fields(&self) -> Vec<(&str, &str)> {
        vec![
            ("client_id", self.provider.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", self.code.as_str()),
            ("code_verifier", self.code_verifier.as_str()),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
            (
                self.provider.side_channel_param.as_str(),
                self.side_channel.as_str(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REDIRECT_URI;

    fn flow_state(side_channel: Option<&str>) -> OAuth2State {
        OAuth2State::new(
            "vk".to_string(),
            DEFAULT_REDIRECT_URI.to_string(),
            "verifier-abc".to_string(),
            side_channel.map(str::to_string),
            600,
        )
    }

    fn provider() -> Arc<VkProviderConfig> {
        Arc::new(VkProviderConfig::new("client-1", "secret", DEFAULT_REDIRECT_URI))
    }

    #[test]
    fn test_canonical_parser_drops_device_id() {
        let params =
            CallbackParams::from_query("?code=abc&state=xyz&device_id=dev-1&type=code_v2&iss=vk");

        assert_eq!(params.code(), Some("abc"));
        assert_eq!(params.state(), Some("xyz"));
        assert_eq!(params.get("iss"), Some("vk"));
        assert_eq!(params.get("device_id"), None);
        assert_eq!(params.get("type"), None);
    }

    #[test]
    fn test_empty_code_counts_as_missing() {
        let params = CallbackParams::from_query("code=&state=xyz");
        assert_eq!(params.code(), None);
    }

    #[test]
    fn test_stored_value_wins_over_raw_query() {
        let recovered = recover_side_channel(
            "device_id",
            Some("stored-device"),
            Some("code=a&device_id=other-device"),
        );
        assert_eq!(
            recovered,
            Some(("stored-device".to_string(), SideChannelSource::FlowState))
        );
    }

    #[test]
    fn test_raw_query_used_when_nothing_stored() {
        let recovered =
            recover_side_channel("device_id", None, Some("code=a&device_id=dev%2B42&state=s"));
        assert_eq!(
            recovered,
            Some(("dev+42".to_string(), SideChannelSource::RawCallback))
        );

        assert_eq!(
            recover_side_channel("device_id", Some(""), Some("device_id=")),
            None
        );
        assert_eq!(recover_side_channel("device_id", None, None), None);
    }

    #[test]
    fn test_context_requires_code() {
        let callback = CallbackRequest::from_raw_query("state=s");
        let result = TokenRequestContext::new(provider(), &flow_state(Some("d")), &callback);
        assert!(matches!(result, Err(OAuth2Error::MissingAuthorizationCode)));
    }

    #[test]
    fn test_context_requires_side_channel() {
        let callback = CallbackRequest::from_params(CallbackParams::from_query(
            "code=c&state=s&device_id=dropped",
        ));
        let result = TokenRequestContext::new(provider(), &flow_state(None), &callback);
        match result {
            Err(OAuth2Error::MissingSideChannelValue(param)) => assert_eq!(param, "device_id"),
            other => panic!("Expected MissingSideChannelValue, got {:?}", other),
        }
    }

    #[test]
    fn test_form_fields_carry_recovered_value() {
        let callback = CallbackRequest::from_url(
            "http://localhost:3000/auth/vk/callback?code=the-code&state=s",
        )
        .unwrap();
        let context =
            TokenRequestContext::new(provider(), &flow_state(Some("device-7")), &callback).unwrap();

        let fields = context.form_fields();
        let keys: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "client_id",
                "grant_type",
                "code",
                "code_verifier",
                "redirect_uri",
                "device_id"
            ]
        );
        assert!(fields.contains(&("code", "the-code")));
        assert!(fields.contains(&("code_verifier", "verifier-abc")));
        assert!(fields.contains(&("device_id", "device-7")));
        assert!(!fields.iter().any(|(k, _)| *k == "client_secret"));
    }
}

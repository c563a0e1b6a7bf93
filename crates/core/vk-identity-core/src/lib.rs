//! Contract between an OAuth identity plugin and the authentication host.
//!
//! The host drives the request lifecycle (cookies, sessions, redirects) and
//! calls back into the plugin at two points: when an authorization code must
//! be turned into tokens, and when the provider's raw user record must be
//! mapped onto a normalized profile. [`OAuthProviderHooks`] describes those
//! two hooks; [`IdentityProvider`] is the coarser payload-in, identity-out
//! entry point used by session services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid authentication payload")]
    InvalidPayload,

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub provider_id: String,
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn verify(&self, auth_payload: serde_json::Value) -> IdentityResult<VerifiedIdentity>;
}

/// Tokens handed to the host after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
    pub token_type: String,
}

/// Shape returned by the `token.request` hook: `{ "tokens": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequestOutput {
    pub tokens: TokenSet,
}

/// Provider-assigned user identifier.
///
/// Providers disagree on whether ids are numbers or strings, so both are
/// accepted and serialized back in their original form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileId::Numeric(id) => write!(f, "{}", id),
            ProfileId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ProfileId {
    fn from(id: i64) -> Self {
        ProfileId::Numeric(id)
    }
}

impl From<&str> for ProfileId {
    fn from(id: &str) -> Self {
        ProfileId::Text(id.to_string())
    }
}

/// Normalized identity produced by the `profile` hook.
///
/// `name` is never null; an absent name is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: ProfileId,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Hooks an OAuth provider plugin supplies to the authentication host.
#[async_trait]
pub trait OAuthProviderHooks: Send + Sync {
    /// Typed context for the token request, validated before the hook runs.
    type Context: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Exchange the authorization code carried by `context` for tokens.
    async fn request_token(&self, context: Self::Context)
    -> Result<TokenRequestOutput, Self::Error>;

    /// Map the provider's raw user record onto a [`UserProfile`].
    fn profile(&self, raw_profile: serde_json::Value) -> Result<UserProfile, Self::Error>;
}

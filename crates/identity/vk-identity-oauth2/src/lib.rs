//! VK ID OAuth2 provider with PKCE.
//!
//! VK requires a `device_id` to accompany the authorization code when it is
//! exchanged for tokens, but authentication hosts drop non-standard callback
//! parameters before provider hooks run. This crate stores the value with the
//! flow's `state` when the redirect is issued and reattaches it at exchange
//! time, alongside the PKCE verifier.

mod callback;
mod client;
mod config;
mod error;
mod flow;
mod pkce;
mod profile;
mod provider;
mod state;
mod types;


pub use callback::{
    CallbackParams, CallbackRequest, STANDARD_CALLBACK_PARAMS, SideChannelSource,
    TokenRequestContext, recover_side_channel,
};
pub use client::{AuthorizationRedirect, OAuth2Client};
pub use config::{
    DEFAULT_REDIRECT_URI, DEVICE_ID_PARAM, MAX_STATE_TTL_SECONDS, OAuth2Config,
    RuntimeEnvironment, VK_AUTHORIZATION_ENDPOINT, VK_TOKEN_ENDPOINT, VK_USERINFO_ENDPOINT,
    VkProviderConfig,
};
pub use error::{AUTHENTICATION_FAILED_MESSAGE, OAuth2Error, OAuth2ErrorKind, OAuth2Result};
pub use flow::{FlowStage, FlowTracker};
pub use pkce::{CODE_CHALLENGE_METHOD, PkceChallenge, challenge_for};
pub use profile::{display_name, normalize_profile};
pub use provider::{CompletedLogin, ProviderDescriptor, VkAuthPayload, VkProvider, VkResponse};
pub use state::{InMemoryStateStore, OAuth2State, OAuth2StateStore};
pub use types::{FORCED_TOKEN_TYPE, TokenResponse, VkUser};

pub use vk_identity_core::{
    IdentityProvider, OAuthProviderHooks, ProfileId, TokenRequestOutput, TokenSet, UserProfile,
    VerifiedIdentity,
};

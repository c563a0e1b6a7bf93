//! OAuth2 error types.

use crate::flow::FlowStage;
use thiserror::Error;

pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// Text shown to end users for any failed login. Diagnostics stay in the logs.
pub const AUTHENTICATION_FAILED_MESSAGE: &str = "Authentication failed. Please try signing in again.";

#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("State mismatch: {0}")]
    StateMismatch(String),

    #[error("State not found or expired")]
    StateNotFound,

    #[error("Side-channel parameter '{0}' could not be recovered for this flow")]
    MissingSideChannelValue(String),

    #[error("Missing authorization code")]
    MissingAuthorizationCode,

    #[error("VK token exchange failed: {status} {status_text}\nResponse: {body}")]
    TokenExchangeFailed {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("VK token exchange request failed: {0}")]
    TokenExchangeTransport(#[source] reqwest::Error),

    #[error("Profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    #[error("Callback error: {0}")]
    CallbackError(String),

    #[error("Invalid flow transition from {from:?} to {to:?}")]
    InvalidFlowTransition { from: FlowStage, to: FlowStage },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Coarse classification used for logging and for deciding how a flow ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuth2ErrorKind {
    TokenExchange,
    ProfileFetch,
    Correlation,
    Callback,
    Configuration,
}

impl OAuth2Error {
    pub fn kind(&self) -> OAuth2ErrorKind {
        match self {
            OAuth2Error::TokenExchangeFailed { .. } | OAuth2Error::TokenExchangeTransport(_) => {
                OAuth2ErrorKind::TokenExchange
            }
            OAuth2Error::ProfileFetchFailed(_) => OAuth2ErrorKind::ProfileFetch,
            OAuth2Error::StateMismatch(_)
            | OAuth2Error::StateNotFound
            | OAuth2Error::MissingSideChannelValue(_)
            | OAuth2Error::InvalidFlowTransition { .. } => OAuth2ErrorKind::Correlation,
            OAuth2Error::MissingAuthorizationCode | OAuth2Error::CallbackError(_) => {
                OAuth2ErrorKind::Callback
            }
            OAuth2Error::HttpError(_)
            | OAuth2Error::ConfigError(_)
            | OAuth2Error::SerializationError(_)
            | OAuth2Error::UrlError(_) => OAuth2ErrorKind::Configuration,
        }
    }

    /// Message safe to show to the person signing in.
    pub fn public_message(&self) -> &'static str {
        AUTHENTICATION_FAILED_MESSAGE
    }
}

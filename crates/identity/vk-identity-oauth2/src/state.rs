//! Per-flow storage keyed by the `state` parameter.
//!
//! Everything the callback needs but cannot trust the redirect to carry lives
//! here: the PKCE verifier and the side-channel value (VK's `device_id`). The
//! host framework strips unknown parameters from the callback, so this store
//! is the authoritative source for both.

use crate::error::{OAuth2Error, OAuth2Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// State stored between the authorization redirect and the callback
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuth2State {
    pub state: String,
    pub provider_id: String,
    pub redirect_uri: String,
    pub code_verifier: String,
    pub side_channel: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for OAuth2State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2State")
            .field("state", &self.state)
            .field("provider_id", &self.provider_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("code_verifier", &"<redacted>")
            .field("side_channel", &self.side_channel)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl OAuth2State {
    pub fn new(
        provider_id: String,
        redirect_uri: String,
        code_verifier: String,
        side_channel: Option<String>,
        ttl_seconds: u64,
    ) -> Self {
        let state = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        // Saturates instead of wrapping; out-of-range TTLs are refused by OAuth2Config::validate
        let expires_at = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            state,
            provider_id,
            redirect_uri,
            code_verifier,
            side_channel,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[async_trait]
pub trait OAuth2StateStore: Send + Sync {
    async fn store(&self, state: OAuth2State) -> OAuth2Result<()>;

    /// Remove and return the state. A second call with the same key fails.
    async fn retrieve(&self, state: &str) -> OAuth2Result<OAuth2State>;

    async fn cleanup_expired(&self) -> OAuth2Result<usize>;
}

#[derive(Default)]
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<String, OAuth2State>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl OAuth2StateStore for InMemoryStateStore {
    async fn store(&self, state: OAuth2State) -> OAuth2Result<()> {
        let mut states = self.states.write().await;
        if states.contains_key(&state.state) {
            return Err(OAuth2Error::StateMismatch(
                "state token already in use".to_string(),
            ));
        }
        states.insert(state.state.clone(), state);
        Ok(())
    }

    async fn retrieve(&self, state: &str) -> OAuth2Result<OAuth2State> {
        let mut states = self.states.write().await;

        // Removed before the expiry check so an expired entry cannot be retried
        let oauth_state = states.remove(state).ok_or(OAuth2Error::StateNotFound)?;

        if oauth_state.is_expired() {
            return Err(OAuth2Error::StateNotFound);
        }

        Ok(oauth_state)
    }

    async fn cleanup_expired(&self) -> OAuth2Result<usize> {
        let mut states = self.states.write().await;
        let before = states.len();
        let now = Utc::now();
        states.retain(|_, state| state.expires_at >= now);
        Ok(before - states.len())
    }
}

//! VK wire types.

use serde::{Deserialize, Serialize};
use tracing::debug;
use vk_identity_core::{ProfileId, TokenSet};

/// Token type handed to the host regardless of what VK reports.
pub const FORCED_TOKEN_TYPE: &str = "bearer";

/// Token endpoint response body. Every field is optional on the wire; presence
/// of `access_token` is checked by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// `None` when `access_token` is missing or empty.
    pub fn into_token_set(self) -> Option<TokenSet> {
        let access_token = self.access_token.filter(|token| !token.is_empty())?;

        if let Some(reported) = self
            .token_type
            .as_deref()
            .filter(|reported| !reported.eq_ignore_ascii_case(FORCED_TOKEN_TYPE))
        {
            debug!(
                "VK reported token_type '{}', overriding with '{}'",
                reported, FORCED_TOKEN_TYPE
            );
        }

        Some(TokenSet {
            access_token,
            refresh_token: self.refresh_token,
            id_token: self.id_token,
            expires_in: self.expires_in,
            scope: self.scope,
            token_type: FORCED_TOKEN_TYPE.to_string(),
        })
    }
}

/// One entry of `users.get`, with the fields requested via `fields=photo_100`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VkUser {
    pub id: ProfileId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub photo_100: Option<String>,
}

/// Error object of the VK API method envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VkApiError {
    pub error_code: i64,
    pub error_msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_type_is_forced_to_bearer() {
        let response: TokenResponse = serde_json::from_str(
            r#"{
                "access_token": "vk1.a.token",
                "refresh_token": "vk1.a.refresh",
                "id_token": "eyJ.id",
                "expires_in": 3600,
                "user_id": 42,
                "scope": "email",
                "token_type": "Bearer-VK"
            }"#,
        )
        .unwrap();

        let tokens = response.into_token_set().unwrap();
        assert_eq!(tokens.access_token, "vk1.a.token");
        assert_eq!(tokens.refresh_token.as_deref(), Some("vk1.a.refresh"));
        assert_eq!(tokens.id_token.as_deref(), Some("eyJ.id"));
        assert_eq!(tokens.expires_in, Some(3600));
        assert_eq!(tokens.scope.as_deref(), Some("email"));
        assert_eq!(tokens.token_type, "bearer");
    }

    #[test]
    fn test_missing_or_empty_access_token() {
        let response: TokenResponse = serde_json::from_str(r#"{"token_type":"bearer"}"#).unwrap();
        assert!(response.into_token_set().is_none());

        let response: TokenResponse = serde_json::from_str(r#"{"access_token":""}"#).unwrap();
        assert!(response.into_token_set().is_none());
    }

    #[test]
    fn test_unexpected_extra_fields_do_not_hide_the_token() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token": "vk1.a.token", "user_id": "42", "state": {"nested": true}}"#,
        )
        .unwrap();

        let tokens = response.into_token_set().unwrap();
        assert_eq!(tokens.access_token, "vk1.a.token");
    }

    #[test]
    fn test_vk_user_accepts_missing_optional_fields() {
        let user: VkUser = serde_json::from_str(r#"{"id": 1, "can_access_closed": true}"#).unwrap();
        assert_eq!(user.id, ProfileId::Numeric(1));
        assert!(user.first_name.is_none());
        assert!(user.photo_100.is_none());
    }
}

//! Mapping of VK user records onto [`UserProfile`].

use crate::error::{OAuth2Error, OAuth2Result};
use crate::types::{VkApiError, VkUser};
use serde_json::Value;
use vk_identity_core::UserProfile;

/// Strip the `users.get` envelope if present.
///
/// `{"response": [user, ..]}` yields the first user, `{"error": {..}}` is a
/// fetch failure, anything else is taken to be the user record itself.
pub fn unwrap_users_get(raw: Value) -> OAuth2Result<Value> {
    let Value::Object(mut object) = raw else {
        return Err(OAuth2Error::ProfileFetchFailed(
            "user info response is not a JSON object".to_string(),
        ));
    };

    if let Some(error) = object.remove("error") {
        let message = match serde_json::from_value::<VkApiError>(error.clone()) {
            Ok(api_error) => format!("VK API error {}: {}", api_error.error_code, api_error.error_msg),
            Err(_) => format!("VK API error: {}", error),
        };
        return Err(OAuth2Error::ProfileFetchFailed(message));
    }

    match object.remove("response") {
        Some(Value::Array(users)) => users.into_iter().next().ok_or_else(|| {
            OAuth2Error::ProfileFetchFailed("users.get returned no users".to_string())
        }),
        Some(other) => Ok(other),
        None => Ok(Value::Object(object)),
    }
}

/// Normalize a raw VK profile.
pub fn normalize_profile(raw: Value) -> OAuth2Result<UserProfile> {
    let user: VkUser = serde_json::from_value(unwrap_users_get(raw)?)
        .map_err(|e| OAuth2Error::ProfileFetchFailed(format!("invalid user record: {}", e)))?;

    Ok(UserProfile {
        id: user.id,
        name: display_name(user.first_name.as_deref(), user.last_name.as_deref()),
        email: user.email,
        image: user.photo_100,
    })
}

/// First and last name joined by one space, empty parts skipped.
pub fn display_name(first_name: Option<&str>, last_name: Option<&str>) -> String {
    [first_name, last_name]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

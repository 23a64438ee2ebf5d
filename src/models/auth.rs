//! Authenticated session models.

use serde::{Deserialize, Serialize};

/// CDN used to render user avatars.
const AVATAR_CDN_URL: &str = "https://cdn.discordapp.com/avatars";

/// Profile of the user behind a session, as returned by the token exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl AuthUser {
    /// Name to show in the UI: the global name when set, else the username.
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_ref()
            .map(|hash| format!("{}/{}/{}.png", AVATAR_CDN_URL, self.id, hash))
    }
}

/// Bearer credential plus cached profile for one local identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub token: String,
    pub user: AuthUser,
}

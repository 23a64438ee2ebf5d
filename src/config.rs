//! Application configuration management.
//!
//! Holds the badge backend URL, the OAuth client settings, the refresh
//! interval and the active local identity. Stored at
//! `~/.config/badgesync/config.json`; `BADGESYNC_*` environment variables
//! override the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "badgesync";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Refresh interval used when none (or a non-positive one) is configured.
pub const DEFAULT_REFRESH_MINUTES: i64 = 30;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";

/// Query marker appended to the OAuth callback so the backend knows which
/// client is exchanging the code.
pub const DEFAULT_CLIENT_MARKER: &str = "badgesync";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_redirect_uri: Option<String>,
    pub oauth_authorize_url: String,
    pub client_marker: String,
    pub refresh_interval_minutes: i64,
    /// Local account the session and submissions are scoped to.
    pub local_user_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            oauth_client_id: None,
            oauth_redirect_uri: None,
            oauth_authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            client_marker: DEFAULT_CLIENT_MARKER.to_string(),
            refresh_interval_minutes: DEFAULT_REFRESH_MINUTES,
            local_user_id: None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    /// Load from disk, apply environment overrides and normalize.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the persistent store.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Override fields from `BADGESYNC_*` variables, looked up through `var`.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("BADGESYNC_BACKEND_URL") {
            self.backend_url = Some(v);
        }
        if let Some(v) = var("BADGESYNC_CLIENT_ID") {
            self.oauth_client_id = Some(v);
        }
        if let Some(v) = var("BADGESYNC_REDIRECT_URI") {
            self.oauth_redirect_uri = Some(v);
        }
        if let Some(v) = var("BADGESYNC_LOCAL_USER") {
            self.local_user_id = Some(v);
        }
        if let Some(v) = var("BADGESYNC_REFRESH_MINUTES") {
            match v.trim().parse() {
                Ok(minutes) => self.refresh_interval_minutes = minutes,
                Err(_) => {
                    warn!(value = %v, "Ignoring unparseable BADGESYNC_REFRESH_MINUTES");
                    self.refresh_interval_minutes = DEFAULT_REFRESH_MINUTES;
                }
            }
        }
    }

    /// Reset a non-positive refresh interval to the default and tidy URLs.
    pub fn normalize(&mut self) {
        if self.refresh_interval_minutes <= 0 {
            warn!(
                minutes = self.refresh_interval_minutes,
                "Invalid refresh interval, using default"
            );
            self.refresh_interval_minutes = DEFAULT_REFRESH_MINUTES;
        }
        if let Some(url) = self.backend_url.as_mut() {
            let trimmed = url.trim().trim_end_matches('/').to_string();
            *url = trimmed;
        }
        if self.client_marker.trim().is_empty() {
            self.client_marker = DEFAULT_CLIENT_MARKER.to_string();
        }
        if self.oauth_authorize_url.trim().is_empty() {
            self.oauth_authorize_url = DEFAULT_AUTHORIZE_URL.to_string();
        }
    }

    pub fn backend(&self) -> Option<&str> {
        non_empty(&self.backend_url)
    }

    pub fn client_id(&self) -> Option<&str> {
        non_empty(&self.oauth_client_id)
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        non_empty(&self.oauth_redirect_uri)
    }

    pub fn local_user(&self) -> Option<&str> {
        non_empty(&self.local_user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_normalize_resets_non_positive_interval() {
        let mut config = Config {
            refresh_interval_minutes: 0,
            ..Config::default()
        };
        config.normalize();
        assert_eq!(config.refresh_interval_minutes, DEFAULT_REFRESH_MINUTES);

        config.refresh_interval_minutes = -3;
        config.normalize();
        assert_eq!(config.refresh_interval_minutes, DEFAULT_REFRESH_MINUTES);

        config.refresh_interval_minutes = 2;
        config.normalize();
        assert_eq!(config.refresh_interval_minutes, 2);
    }

    #[test]
    fn test_normalize_trims_backend_url() {
        let mut config = Config {
            backend_url: Some(" https://badges.test/ ".to_string()),
            ..Config::default()
        };
        config.normalize();
        assert_eq!(config.backend(), Some("https://badges.test"));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let config = Config {
            backend_url: Some("   ".to_string()),
            oauth_client_id: Some(String::new()),
            ..Config::default()
        };
        assert_eq!(config.backend(), None);
        assert_eq!(config.client_id(), None);
        assert_eq!(config.redirect_uri(), None);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BADGESYNC_BACKEND_URL", "https://env.test"),
            ("BADGESYNC_CLIENT_ID", "client"),
            ("BADGESYNC_LOCAL_USER", "local-9"),
            ("BADGESYNC_REFRESH_MINUTES", "abc"),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            refresh_interval_minutes: 12,
            ..Config::default()
        };
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.backend(), Some("https://env.test"));
        assert_eq!(config.client_id(), Some("client"));
        assert_eq!(config.local_user(), Some("local-9"));
        assert_eq!(config.refresh_interval_minutes, DEFAULT_REFRESH_MINUTES);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"backend_url": "https://x.test"}"#).unwrap();
        assert_eq!(config.backend(), Some("https://x.test"));
        assert_eq!(config.refresh_interval_minutes, DEFAULT_REFRESH_MINUTES);
        assert_eq!(config.client_marker, DEFAULT_CLIENT_MARKER);
    }
}

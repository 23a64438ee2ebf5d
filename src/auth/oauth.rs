use async_trait::async_trait;
use reqwest::Url;

use crate::config::Config;
use crate::error::BadgeSyncError;

/// OAuth scope requested from the provider.
const OAUTH_SCOPE: &str = "identify";

/// Query parameter carrying the client marker on the exchange request.
const CLIENT_MARKER_PARAM: &str = "clientMod";

/// Presents the provider's authorization page to the user.
#[async_trait]
pub trait OAuthHandshake: Send + Sync {
    /// Open `authorize_url` and wait for the provider to redirect back.
    /// Returns the full callback location, or `None` if the user cancelled.
    async fn authorize(&self, authorize_url: &str) -> anyhow::Result<Option<String>>;
}

/// Build the provider authorization URL. Fails when the client id or the
/// redirect URI is not configured.
pub fn authorize_url(config: &Config) -> Result<String, BadgeSyncError> {
    let client_id = config
        .client_id()
        .ok_or_else(|| BadgeSyncError::Configuration("OAuth client ID is not set".to_string()))?;
    let redirect_uri = config
        .redirect_uri()
        .ok_or_else(|| BadgeSyncError::Configuration("OAuth redirect URI is not set".to_string()))?;

    let url = Url::parse_with_params(
        &config.oauth_authorize_url,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", OAUTH_SCOPE),
        ],
    )
    .map_err(|e| BadgeSyncError::Configuration(format!("Invalid OAuth authorize URL: {}", e)))?;

    Ok(url.into())
}

/// Turn the provider callback into the backend exchange request: the same
/// URL with the client marker appended. A callback carrying `error` means
/// the user or the provider refused.
pub fn exchange_url(callback: &str, client_marker: &str) -> Result<String, BadgeSyncError> {
    let mut url = Url::parse(callback)
        .map_err(|e| BadgeSyncError::Authorization(format!("Malformed callback URL: {}", e)))?;

    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Err(BadgeSyncError::Authorization(description.unwrap_or(error)));
    }

    url.query_pairs_mut()
        .append_pair(CLIENT_MARKER_PARAM, client_marker);
    Ok(url.into())
}

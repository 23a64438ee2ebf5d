//! reqwest implementation of `BadgeApi`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::{ApiError, BadgeApi, CatalogFetch, IconFile};
use crate::models::{ApprovedBadge, AuthState, BadgeList, SubmissionBadge};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const USER_AGENT: &str = concat!("badgesync/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the badge backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    fn endpoint(backend: &str, path: &str) -> String {
        format!("{}/{}", backend.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn etag_of(response: &Response) -> Option<String> {
        response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(
        response: Response,
        what: &str,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    /// Send a request built by `build`, backing off on 429.
    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> reqwest::RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build(&self.client).send().await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }
}

#[async_trait]
impl BadgeApi for ApiClient {
    async fn fetch_approved(
        &self,
        backend: &str,
        etag: Option<&str>,
    ) -> Result<CatalogFetch, ApiError> {
        let url = Self::endpoint(backend, "badges/approved");

        let response = self
            .send_with_retry(&url, |client| {
                let request = client.get(&url).header(header::ACCEPT, "application/json");
                match etag {
                    Some(etag) => request.header(header::IF_NONE_MATCH, etag),
                    None => request,
                }
            })
            .await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!("Catalog not modified");
            return Ok(CatalogFetch::NotModified);
        }

        let response = Self::check_response(response).await?;
        let etag = Self::etag_of(&response);
        let list: BadgeList<ApprovedBadge> = Self::parse_json(response, "approved badges").await?;
        debug!(count = list.badges.len(), etag = ?etag, "Catalog fetched");

        Ok(CatalogFetch::Fetched {
            badges: list.badges,
            etag,
        })
    }

    async fn fetch_mine(
        &self,
        backend: &str,
        token: &str,
    ) -> Result<Vec<SubmissionBadge>, ApiError> {
        let url = Self::endpoint(backend, "badges/mine");

        let response = self
            .send_with_retry(&url, |client| {
                client
                    .get(&url)
                    .header(header::ACCEPT, "application/json")
                    .bearer_auth(token)
            })
            .await?;

        let response = Self::check_response(response).await?;
        let list: BadgeList<SubmissionBadge> = Self::parse_json(response, "submissions").await?;
        Ok(list.badges)
    }

    async fn submit(
        &self,
        backend: &str,
        token: &str,
        name: &str,
        icon: &IconFile,
    ) -> Result<(), ApiError> {
        let url = Self::endpoint(backend, "badges/submit");
        let metadata = json!({ "name": name }).to_string();

        // Multipart bodies are consumed on send, so no retry loop here.
        let form = multipart::Form::new()
            .part(
                "metadata",
                multipart::Part::text(metadata).mime_str("application/json")?,
            )
            .part(
                "icon",
                multipart::Part::bytes(icon.bytes.clone())
                    .file_name(icon.file_name.clone())
                    .mime_str(&icon.mime_type)?,
            );

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn logout(&self, backend: &str, token: &str) -> Result<(), ApiError> {
        let url = Self::endpoint(backend, "auth/logout");
        let response = self.client.post(&url).bearer_auth(token).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn exchange(&self, exchange_url: &str) -> Result<AuthState, ApiError> {
        let response = self
            .client
            .get(exchange_url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response, "token exchange response").await
    }
}

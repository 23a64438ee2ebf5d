use async_trait::async_trait;

use super::ApiError;
use crate::models::{ApprovedBadge, AuthState, SubmissionBadge};

/// Result of a catalog request.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogFetch {
    /// The server answered 304 to our `If-None-Match`.
    NotModified,
    Fetched {
        badges: Vec<ApprovedBadge>,
        /// Value of the response `ETag` header, if any.
        etag: Option<String>,
    },
}

/// Icon image picked for a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct IconFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl IconFile {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read an icon from disk, guessing the MIME type from the extension.
    pub async fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read icon file: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "icon".to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let mime_type = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        };
        Ok(Self::new(file_name, mime_type, bytes))
    }
}

/// Remote endpoints used by the core. `backend` is the configured base URL
/// without a trailing slash.
#[async_trait]
pub trait BadgeApi: Send + Sync {
    /// `GET {backend}/badges/approved`, conditional on `etag` when given.
    async fn fetch_approved(
        &self,
        backend: &str,
        etag: Option<&str>,
    ) -> Result<CatalogFetch, ApiError>;

    /// `GET {backend}/badges/mine`.
    async fn fetch_mine(&self, backend: &str, token: &str)
        -> Result<Vec<SubmissionBadge>, ApiError>;

    /// `POST {backend}/badges/submit` as multipart (metadata JSON + icon).
    async fn submit(
        &self,
        backend: &str,
        token: &str,
        name: &str,
        icon: &IconFile,
    ) -> Result<(), ApiError>;

    /// `POST {backend}/auth/logout`.
    async fn logout(&self, backend: &str, token: &str) -> Result<(), ApiError>;

    /// Trade an OAuth callback (already tagged with the client marker) for a
    /// session.
    async fn exchange(&self, exchange_url: &str) -> Result<AuthState, ApiError>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ApprovedBadge;

/// Schema version of the persisted catalog.
/// Bump whenever `CacheRecord` or `ApprovedBadge` changes shape; records
/// written under another version are discarded on load.
pub const CACHE_VERSION: u32 = 1;

/// Locally persisted snapshot of the approved-badge catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub version: u32,
    /// Validator returned with the snapshot, only ever echoed back in
    /// `If-None-Match`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub badges: Vec<ApprovedBadge>,
}

impl CacheRecord {
    pub fn new(badges: Vec<ApprovedBadge>, etag: Option<String>) -> Self {
        Self {
            version: CACHE_VERSION,
            etag,
            updated_at: Utc::now(),
            badges,
        }
    }

    /// Store key for the current schema version.
    pub fn storage_key() -> String {
        format!("badge-cache-v{}", CACHE_VERSION)
    }

    pub fn is_current(&self) -> bool {
        self.version == CACHE_VERSION
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.updated_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

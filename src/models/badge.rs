//! Badge models shared by the catalog cache and the submission tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A badge that passed moderation and is part of the public catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedBadge {
    pub id: String,
    pub name: String,
    pub icon_url: String,
    /// Identity of the user who owns (displays) the badge.
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Moderation state of a submitted badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
    Banned,
}

impl SubmissionStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "Pending",
            SubmissionStatus::Approved => "Approved",
            SubmissionStatus::Rejected => "Rejected",
            SubmissionStatus::Banned => "Banned",
        }
    }
}

/// One of the current user's own submissions and its moderation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionBadge {
    #[serde(flatten)]
    pub badge: ApprovedBadge,
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
}

/// Envelope used by both `/badges/approved` and `/badges/mine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeList<T> {
    #[serde(default = "Vec::new")]
    pub badges: Vec<T>,
}

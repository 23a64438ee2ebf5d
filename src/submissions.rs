//! The signed-in user's own badge submissions.

use tracing::{debug, error, info, warn};

use crate::api::IconFile;
use crate::app::BadgeSync;
use crate::error::BadgeSyncError;
use crate::models::{SubmissionBadge, SubmissionStatus};
use crate::notices::NoticeLevel;
use crate::store::{self, submissions_key};

/// Per-status tally of the submission list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmissionCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub banned: usize,
}

impl SubmissionCounts {
    pub fn tally(submissions: &[SubmissionBadge]) -> Self {
        let mut counts = Self::default();
        for submission in submissions {
            match submission.status {
                SubmissionStatus::Pending => counts.pending += 1,
                SubmissionStatus::Approved => counts.approved += 1,
                SubmissionStatus::Rejected => counts.rejected += 1,
                SubmissionStatus::Banned => counts.banned += 1,
            }
        }
        counts
    }
}

impl BadgeSync {
    /// Submit a new badge for review.
    ///
    /// Checks the session, then the name and icon, before anything goes over
    /// the network. On success the submission list is refetched so it shows
    /// the server-assigned id and status.
    pub async fn submit(&self, name: &str, icon: Option<&IconFile>) -> Result<(), BadgeSyncError> {
        if !self.is_alive() {
            return Err(BadgeSyncError::Disposed);
        }

        let token = self.read_state().auth.as_ref().map(|a| a.token.clone());
        let Some(token) = token else {
            return Err(self.fail(BadgeSyncError::Unauthenticated));
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(self.fail(BadgeSyncError::Validation(
                "Badge name is required".to_string(),
            )));
        }
        let icon = match icon {
            Some(icon) if !icon.bytes.is_empty() => icon,
            _ => {
                return Err(self.fail(BadgeSyncError::Validation(
                    "Select an icon image".to_string(),
                )))
            }
        };

        let Some(backend) = self.config().backend().map(str::to_string) else {
            return Err(self.fail(BadgeSyncError::Configuration(
                "Badge backend URL is not set".to_string(),
            )));
        };

        info!(name, bytes = icon.bytes.len(), "Submitting badge");
        if let Err(e) = self.inner.api.submit(&backend, &token, name, icon).await {
            error!(error = %e, "Badge submission failed");
            return Err(self.fail(e.into()));
        }

        if !self.is_alive() {
            return Ok(());
        }
        self.announce(NoticeLevel::Success, "Badge submitted for review");

        if let Err(e) = self.fetch_mine().await {
            debug!(error = %e, "Submission refetch failed");
        }
        Ok(())
    }

    /// Replace the submission list with the server's. Does nothing without a
    /// session or a configured backend.
    pub async fn fetch_mine(&self) -> Result<(), BadgeSyncError> {
        if !self.is_alive() {
            return Ok(());
        }

        let (token, local) = {
            let state = self.read_state();
            (
                state.auth.as_ref().map(|a| a.token.clone()),
                state.local_user.clone(),
            )
        };
        let backend = self.config().backend().map(str::to_string);
        let (Some(token), Some(backend)) = (token, backend) else {
            debug!("Skipping submission fetch: not logged in or no backend");
            return Ok(());
        };

        let submissions = match self.inner.api.fetch_mine(&backend, &token).await {
            Ok(submissions) => submissions,
            Err(e) => {
                error!(error = %e, "Failed to fetch submissions");
                return Err(self.fail(e.into()));
            }
        };

        if !self.is_alive() {
            return Ok(());
        }

        {
            let mut state = self.write_state();
            let same_session = state.local_user == local
                && state.auth.as_ref().map(|a| a.token.as_str()) == Some(token.as_str());
            if !same_session {
                debug!("Session changed while fetching submissions, discarding");
                return Ok(());
            }
            state.submissions = submissions.clone();
        }

        if let Some(local) = local {
            let key = submissions_key(&local);
            if let Err(e) = store::replace_json(self.store(), &key, Some(&submissions)).await {
                warn!(error = %e, "Failed to persist submissions");
            }
        }

        debug!(count = submissions.len(), "Submissions updated");
        self.notify();
        Ok(())
    }

    pub fn submissions(&self) -> Vec<SubmissionBadge> {
        self.read_state().submissions.clone()
    }

    pub fn submission_counts(&self) -> SubmissionCounts {
        SubmissionCounts::tally(&self.read_state().submissions)
    }

    pub(crate) async fn load_submissions(&self, local: Option<&str>) -> Vec<SubmissionBadge> {
        let Some(local) = local else {
            return Vec::new();
        };
        let key = submissions_key(local);
        match store::load_json::<Vec<SubmissionBadge>>(self.store(), &key).await {
            Ok(submissions) => submissions.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to load submissions");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{auth_key, save_json};
    use crate::test_support::{auth_state, icon, submission, submission_with, ApiCall, Harness};

    async fn logged_in() -> Harness {
        let h = Harness::new();
        save_json(h.store.as_ref(), &auth_key("local-1"), &auth_state("tok")).await.unwrap();
        h.sync.set_local_user(None).await;
        h.sync.set_local_user(Some("local-1".to_string())).await;
        assert!(h.sync.is_authenticated());
        h
    }

    #[tokio::test]
    async fn test_submit_unauthenticated_sends_nothing() {
        let h = Harness::new();

        let err = h.sync.submit("Cool Badge", Some(&icon())).await.unwrap_err();

        assert!(matches!(err, BadgeSyncError::Unauthenticated));
        assert!(h.api.calls().is_empty());
        assert!(h.notices.last_error().is_some());
    }

    #[tokio::test]
    async fn test_submit_validation_happens_before_network() {
        let h = logged_in().await;

        let err = h.sync.submit("", Some(&icon())).await.unwrap_err();
        assert!(matches!(err, BadgeSyncError::Validation(_)));

        let err = h.sync.submit("   ", Some(&icon())).await.unwrap_err();
        assert!(matches!(err, BadgeSyncError::Validation(_)));

        let err = h.sync.submit("name", None).await.unwrap_err();
        assert!(matches!(err, BadgeSyncError::Validation(_)));

        let empty = IconFile::new("empty.png", "image/png", Vec::new());
        let err = h.sync.submit("name", Some(&empty)).await.unwrap_err();
        assert!(matches!(err, BadgeSyncError::Validation(_)));

        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submit_success_refetches_wholesale() {
        let h = logged_in().await;
        h.api.set_mine(vec![submission("old")]);
        h.sync.fetch_mine().await.unwrap();

        h.api.set_mine(vec![
            submission("new-1"),
            submission_with("new-2", SubmissionStatus::Approved),
        ]);
        h.sync.submit("  Cool Badge ", Some(&icon())).await.unwrap();

        let ids: Vec<String> = h.sync.submissions().into_iter().map(|s| s.badge.id).collect();
        assert_eq!(ids, vec!["new-1", "new-2"]);
        assert!(h.api.calls().contains(&ApiCall::Submit {
            token: "tok".to_string(),
            name: "Cool Badge".to_string(),
            icon_bytes: icon().bytes.len(),
        }));
        assert_eq!(
            h.sync.submission_counts(),
            SubmissionCounts { pending: 1, approved: 1, rejected: 0, banned: 0 }
        );
    }

    #[tokio::test]
    async fn test_submit_server_error_uses_structured_message() {
        let h = logged_in().await;
        h.api.set_submit_status(Some((400, r#"{"error":"Name already taken"}"#)));

        let err = h.sync.submit("Cool Badge", Some(&icon())).await.unwrap_err();

        assert_eq!(err.to_string(), "Name already taken");
        assert_eq!(h.notices.last_error().as_deref(), Some("Name already taken"));
        assert!(!h.api.calls().iter().any(|c| matches!(c, ApiCall::FetchMine(_))));
    }

    #[tokio::test]
    async fn test_submit_server_error_without_body_mentions_status() {
        let h = logged_in().await;
        h.api.set_submit_status(Some((500, "")));

        let err = h.sync.submit("Cool Badge", Some(&icon())).await.unwrap_err();

        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_fetch_mine_without_session_is_silent_noop() {
        let h = Harness::new();

        h.sync.fetch_mine().await.unwrap();

        assert!(h.api.calls().is_empty());
        assert!(h.notices.last_error().is_none());
    }

    #[tokio::test]
    async fn test_fetch_mine_without_backend_is_silent_noop() {
        let h = Harness::with_config(|c| c.backend_url = None);
        save_json(h.store.as_ref(), &auth_key("local-1"), &auth_state("tok")).await.unwrap();
        h.sync.set_local_user(None).await;
        h.sync.set_local_user(Some("local-1".to_string())).await;

        h.sync.fetch_mine().await.unwrap();

        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_mine_persists_scoped_list() {
        let h = logged_in().await;
        h.api.set_mine(vec![submission("s1")]);

        h.sync.fetch_mine().await.unwrap();

        let stored: Option<Vec<SubmissionBadge>> =
            store::load_json(h.store.as_ref(), &submissions_key("local-1")).await.unwrap();
        assert_eq!(stored.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_mine_failure_keeps_list() {
        let h = logged_in().await;
        h.api.set_mine(vec![submission("s1")]);
        h.sync.fetch_mine().await.unwrap();
        h.api.set_mine_status(Some((502, "")));

        assert!(h.sync.fetch_mine().await.is_err());
        assert_eq!(h.sync.submissions().len(), 1);
    }
}

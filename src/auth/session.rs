use std::sync::PoisonError;

use tracing::{debug, error, info, warn};

use super::{authorize_url, exchange_url, OAuthHandshake};
use crate::app::BadgeSync;
use crate::error::BadgeSyncError;
use crate::models::{AuthState, AuthUser, SubmissionBadge};
use crate::notices::NoticeLevel;
use crate::store::{self, auth_key, submissions_key};

impl BadgeSync {
    /// Sign in through the OAuth provider.
    ///
    /// Returns the signed-in user, or `None` if the user cancelled the
    /// handshake. On failure nothing is changed; the error has already been
    /// shown to the user.
    pub async fn login(
        &self,
        handshake: &dyn OAuthHandshake,
    ) -> Result<Option<AuthUser>, BadgeSyncError> {
        if !self.is_alive() {
            return Err(BadgeSyncError::Disposed);
        }

        let config = self.config();
        let authorize = authorize_url(&config).map_err(|e| self.fail(e))?;
        let local = self.local_user().ok_or_else(|| {
            self.fail(BadgeSyncError::Configuration(
                "No local account is active".to_string(),
            ))
        })?;

        info!("Starting OAuth login");
        let callback = match handshake.authorize(&authorize).await {
            Ok(Some(callback)) => callback,
            Ok(None) => {
                info!("Login cancelled");
                return Ok(None);
            }
            Err(e) => {
                error!(error = %e, "OAuth handshake failed");
                return Err(self.fail(BadgeSyncError::Authorization(e.to_string())));
            }
        };

        let target = exchange_url(&callback, &config.client_marker).map_err(|e| self.fail(e))?;
        let auth = match self.inner.api.exchange(&target).await {
            Ok(auth) => auth,
            Err(e) => {
                error!(error = %e, "Token exchange failed");
                return Err(self.fail(e.into()));
            }
        };

        if !self.is_alive() {
            return Err(BadgeSyncError::Disposed);
        }
        if self.local_user().as_deref() != Some(local.as_str()) {
            warn!("Local account changed during login, discarding session");
            return Err(self.fail(BadgeSyncError::Authorization(
                "Local account changed during login".to_string(),
            )));
        }

        let user = auth.user.clone();
        self.write_state().auth = Some(auth.clone());
        if let Err(e) = store::replace_json(self.store(), &auth_key(&local), Some(&auth)).await {
            warn!(error = %e, "Failed to persist session");
        }
        info!(user_id = %user.id, "Login successful");
        self.notify();
        self.announce(
            NoticeLevel::Success,
            &format!("Logged in as {}", user.display_name()),
        );

        if let Err(e) = self.fetch_mine().await {
            debug!(error = %e, "Submission fetch after login failed");
        }
        Ok(Some(user))
    }

    /// Sign out. The backend is told to revoke the token in the background;
    /// whatever it answers, the local session and submissions are cleared.
    pub async fn logout(&self) {
        let (token, local) = {
            let state = self.read_state();
            (
                state.auth.as_ref().map(|a| a.token.clone()),
                state.local_user.clone(),
            )
        };

        if let (Some(token), Some(backend)) = (token, self.config().backend().map(str::to_string)) {
            let api = self.inner.api.clone();
            tokio::spawn(async move {
                if let Err(e) = api.logout(&backend, &token).await {
                    debug!(error = %e, "Remote logout failed");
                }
            });
        }

        {
            let mut state = self.write_state();
            state.auth = None;
            state.submissions.clear();
        }

        if let Some(local) = local {
            let auth_key = auth_key(&local);
            let submissions_key = submissions_key(&local);
            let (auth, submissions) = futures::join!(
                store::replace_json::<AuthState>(self.store(), &auth_key, None),
                store::replace_json::<Vec<SubmissionBadge>>(self.store(), &submissions_key, None),
            );
            if let Err(e) = auth.and(submissions) {
                warn!(error = %e, "Failed to clear persisted session");
            }
        }

        info!("Logged out");
        self.notify();
        self.announce(NoticeLevel::Info, "Logged out");
    }

    /// Switch the active local identity. The previous identity's session and
    /// submissions are dropped from memory and the new identity's are loaded.
    pub async fn set_local_user(&self, local: Option<String>) {
        {
            let mut state = self.write_state();
            if state.local_user == local {
                return;
            }
            state.local_user = local.clone();
            state.auth = None;
            state.submissions.clear();
        }
        self.inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .local_user_id = local.clone();
        debug!(local_user = ?local, "Local account switched");

        if let Some(id) = local.as_deref() {
            let (auth, submissions) =
                futures::join!(self.load_auth(Some(id)), self.load_submissions(Some(id)));
            if !self.is_alive() {
                return;
            }

            let mut state = self.write_state();
            if state.local_user.as_deref() != Some(id) {
                // Switched again while loading; the newer switch owns the state.
                return;
            }
            state.auth = auth;
            state.submissions = submissions;
        }

        self.notify();
    }

    pub fn auth(&self) -> Option<AuthState> {
        self.read_state().auth.clone()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.read_state().auth.as_ref().map(|a| a.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().auth.is_some()
    }

    pub fn local_user(&self) -> Option<String> {
        self.read_state().local_user.clone()
    }

    /// Read the persisted session of `local`. No identity, no session.
    pub(crate) async fn load_auth(&self, local: Option<&str>) -> Option<AuthState> {
        let local = local?;
        match store::load_json::<AuthState>(self.store(), &auth_key(local)).await {
            Ok(auth) => auth,
            Err(e) => {
                warn!(error = %e, "Failed to load session");
                None
            }
        }
    }
}

//! Fakes and fixtures shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::Notify;

use crate::api::{ApiError, BadgeApi, CatalogFetch, IconFile};
use crate::app::BadgeSync;
use crate::auth::OAuthHandshake;
use crate::config::Config;
use crate::models::{ApprovedBadge, AuthState, AuthUser, SubmissionBadge, SubmissionStatus};
use crate::notices::{NoticeLevel, Notices};
use crate::provider::{BadgeDisplayHost, BadgeProvider, ProviderHandle};
use crate::store::{KeyValueStore, MemoryStore, Mutator};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn test_config() -> Config {
    Config {
        backend_url: Some("https://badges.test".to_string()),
        oauth_client_id: Some("12345".to_string()),
        oauth_redirect_uri: Some("https://badges.test/auth/callback".to_string()),
        local_user_id: Some("local-1".to_string()),
        ..Config::default()
    }
}

pub fn badge(id: &str, creator: &str) -> ApprovedBadge {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    ApprovedBadge {
        id: id.to_string(),
        name: format!("Badge {}", id),
        icon_url: format!("https://cdn.test/{}.png", id),
        creator_id: creator.to_string(),
        created_at: at,
        updated_at: at,
    }
}

pub fn submission(id: &str) -> SubmissionBadge {
    submission_with(id, SubmissionStatus::Pending)
}

pub fn submission_with(id: &str, status: SubmissionStatus) -> SubmissionBadge {
    SubmissionBadge {
        badge: badge(id, "u1"),
        status,
        review_reason: None,
        reviewer_id: None,
    }
}

pub fn auth_state(token: &str) -> AuthState {
    AuthState {
        token: token.to_string(),
        user: AuthUser {
            id: "u1".to_string(),
            username: "ada".to_string(),
            global_name: Some("Ada".to_string()),
            avatar: None,
        },
    }
}

pub fn icon() -> IconFile {
    IconFile::new("icon.png", "image/png", vec![0x89, b'P', b'N', b'G'])
}

// ============================================================================
// Fake backend
// ============================================================================

pub enum CatalogReply {
    Fetched(Vec<ApprovedBadge>, Option<&'static str>),
    NotModified,
    Status(u16, &'static str),
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    FetchApproved(Option<String>),
    FetchMine(String),
    Submit {
        token: String,
        name: String,
        icon_bytes: usize,
    },
    Logout(String),
    Exchange(String),
}

fn status_error(status: u16, body: &str) -> ApiError {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    ApiError::from_status(status, body)
}

/// Scripted `BadgeApi`. Catalog replies are queued; an empty queue answers
/// 304.
#[derive(Default)]
pub struct FakeApi {
    catalog: Mutex<VecDeque<CatalogReply>>,
    catalog_gate: Mutex<Option<Arc<Notify>>>,
    mine: Mutex<Vec<SubmissionBadge>>,
    mine_status: Mutex<Option<(u16, &'static str)>>,
    submit_status: Mutex<Option<(u16, &'static str)>>,
    exchange: Mutex<Option<AuthState>>,
    logout_fails: Mutex<bool>,
    calls: Mutex<Vec<ApiCall>>,
}

impl FakeApi {
    pub fn push_catalog(&self, reply: CatalogReply) {
        lock(&self.catalog).push_back(reply);
    }

    /// Hold catalog requests until the returned `Notify` fires.
    pub fn gate_catalog(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.catalog_gate) = Some(Arc::clone(&gate));
        gate
    }

    pub fn ungate_catalog(&self) {
        *lock(&self.catalog_gate) = None;
    }

    pub fn set_mine(&self, submissions: Vec<SubmissionBadge>) {
        *lock(&self.mine) = submissions;
        *lock(&self.mine_status) = None;
    }

    pub fn set_mine_status(&self, status: Option<(u16, &'static str)>) {
        *lock(&self.mine_status) = status;
    }

    pub fn set_submit_status(&self, status: Option<(u16, &'static str)>) {
        *lock(&self.submit_status) = status;
    }

    /// `None` makes the exchange answer 401.
    pub fn set_exchange(&self, auth: Option<AuthState>) {
        *lock(&self.exchange) = auth;
    }

    pub fn set_logout_fails(&self, fails: bool) {
        *lock(&self.logout_fails) = fails;
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.calls).clone()
    }

    /// The `If-None-Match` value of every catalog request, in order.
    pub fn catalog_etags(&self) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::FetchApproved(etag) => Some(etag),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl BadgeApi for FakeApi {
    async fn fetch_approved(
        &self,
        _backend: &str,
        etag: Option<&str>,
    ) -> Result<CatalogFetch, ApiError> {
        self.record(ApiCall::FetchApproved(etag.map(str::to_string)));

        let gate = lock(&self.catalog_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let reply = lock(&self.catalog).pop_front();
        match reply {
            None | Some(CatalogReply::NotModified) => Ok(CatalogFetch::NotModified),
            Some(CatalogReply::Fetched(badges, etag)) => Ok(CatalogFetch::Fetched {
                badges,
                etag: etag.map(str::to_string),
            }),
            Some(CatalogReply::Status(status, body)) => Err(status_error(status, body)),
            Some(CatalogReply::Malformed) => Err(ApiError::InvalidResponse(
                "Failed to parse approved badges".to_string(),
            )),
        }
    }

    async fn fetch_mine(
        &self,
        _backend: &str,
        token: &str,
    ) -> Result<Vec<SubmissionBadge>, ApiError> {
        self.record(ApiCall::FetchMine(token.to_string()));
        let status = *lock(&self.mine_status);
        match status {
            Some((status, body)) => Err(status_error(status, body)),
            None => Ok(lock(&self.mine).clone()),
        }
    }

    async fn submit(
        &self,
        _backend: &str,
        token: &str,
        name: &str,
        icon: &IconFile,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::Submit {
            token: token.to_string(),
            name: name.to_string(),
            icon_bytes: icon.bytes.len(),
        });
        let status = *lock(&self.submit_status);
        match status {
            Some((status, body)) => Err(status_error(status, body)),
            None => Ok(()),
        }
    }

    async fn logout(&self, _backend: &str, token: &str) -> Result<(), ApiError> {
        self.record(ApiCall::Logout(token.to_string()));
        if *lock(&self.logout_fails) {
            return Err(status_error(502, ""));
        }
        Ok(())
    }

    async fn exchange(&self, exchange_url: &str) -> Result<AuthState, ApiError> {
        self.record(ApiCall::Exchange(exchange_url.to_string()));
        lock(&self.exchange).clone().ok_or(ApiError::Unauthorized)
    }
}

// ============================================================================
// Collaborators
// ============================================================================

#[derive(Default)]
pub struct RecordingNotices {
    shown: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotices {
    pub fn messages(&self) -> Vec<String> {
        lock(&self.shown).iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.shown)
            .iter()
            .rev()
            .find(|(level, _)| *level == NoticeLevel::Error)
            .map(|(_, m)| m.clone())
    }
}

impl Notices for RecordingNotices {
    fn show(&self, level: NoticeLevel, message: &str) {
        lock(&self.shown).push((level, message.to_string()));
    }
}

/// Handshake that answers with a fixed callback and remembers the URL it
/// was asked to open.
pub struct FakeHandshake {
    callback: Option<&'static str>,
    opened: Mutex<Option<String>>,
}

impl FakeHandshake {
    pub fn returning(callback: Option<&'static str>) -> Self {
        Self {
            callback,
            opened: Mutex::new(None),
        }
    }

    pub fn opened(&self) -> Option<String> {
        lock(&self.opened).clone()
    }
}

#[async_trait]
impl OAuthHandshake for FakeHandshake {
    async fn authorize(&self, url: &str) -> Result<Option<String>> {
        *lock(&self.opened) = Some(url.to_string());
        Ok(self.callback.map(str::to_string))
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Err(anyhow!("store unavailable: {}", key))
    }

    async fn set(&self, key: &str, _value: Value) -> Result<()> {
        Err(anyhow!("store unavailable: {}", key))
    }

    async fn update(&self, key: &str, _mutator: Mutator) -> Result<Value> {
        Err(anyhow!("store unavailable: {}", key))
    }
}

#[derive(Default)]
pub struct FakeDisplayHost {
    next: AtomicU64,
    providers: Mutex<HashMap<u64, Arc<dyn BadgeProvider>>>,
}

impl FakeDisplayHost {
    /// Number of providers currently registered.
    pub fn registered(&self) -> usize {
        lock(&self.providers).len()
    }

    /// Any registered provider.
    pub fn provider(&self) -> Option<Arc<dyn BadgeProvider>> {
        lock(&self.providers).values().next().cloned()
    }
}

impl BadgeDisplayHost for FakeDisplayHost {
    fn register(&self, provider: Arc<dyn BadgeProvider>) -> ProviderHandle {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        lock(&self.providers).insert(id, provider);
        ProviderHandle(id)
    }

    fn unregister(&self, handle: ProviderHandle) {
        lock(&self.providers).remove(&handle.0);
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub sync: BadgeSync,
    pub api: Arc<FakeApi>,
    pub store: Arc<MemoryStore>,
    pub notices: Arc<RecordingNotices>,
    pub display: Arc<FakeDisplayHost>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config<F>(edit: F) -> Self
    where
        F: FnOnce(&mut Config),
    {
        let mut config = test_config();
        edit(&mut config);

        let api = Arc::new(FakeApi::default());
        let store = Arc::new(MemoryStore::new());
        let notices = Arc::new(RecordingNotices::default());
        let display = Arc::new(FakeDisplayHost::default());
        let sync = BadgeSync::builder(config, store.clone(), api.clone())
            .notices(notices.clone())
            .display_host(display.clone())
            .build();

        Self {
            sync,
            api,
            store,
            notices,
            display,
        }
    }
}

//! Badge sync state container.
//!
//! `BadgeSync` owns the cached catalog, its owner index, the session and the
//! submission list for the active local identity, plus the refresh timer and
//! the change notifier. The host creates one, calls `init` once and `dispose`
//! on shutdown; every operation goes through the handle.
//!
//! Operations follow one ordering: build the new state completely, swap it
//! in, persist, then notify. No lock is held across an await, and every write
//! that follows an await first checks that the container is still alive.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tracing::{debug, info};

use crate::api::BadgeApi;
use crate::cache::{BadgeIndex, CacheRecord, RefreshOutcome};
use crate::config::Config;
use crate::error::BadgeSyncError;
use crate::models::{AuthState, SubmissionBadge};
use crate::notices::{NoticeLevel, Notices, TracingNotices};
use crate::notify::{ChangeNotifier, Listener, Subscription};
use crate::provider::{BadgeDisplayHost, CatalogProvider, ProviderHandle};
use crate::scheduler::{clamp_interval, RefreshScheduler};
use crate::store::KeyValueStore;

/// In-memory view shared by all components.
#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) cache: Option<CacheRecord>,
    pub(crate) index: BadgeIndex,
    pub(crate) local_user: Option<String>,
    pub(crate) auth: Option<AuthState>,
    pub(crate) submissions: Vec<SubmissionBadge>,
}

pub(crate) type RefreshFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

pub(crate) struct Inner {
    pub(crate) config: RwLock<Config>,
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) api: Arc<dyn BadgeApi>,
    pub(crate) notices: Arc<dyn Notices>,
    pub(crate) notifier: ChangeNotifier,
    pub(crate) state: RwLock<State>,
    /// The refresh in progress, tagged so only its own caller clears it.
    pub(crate) refresh_flight: Mutex<Option<(u64, RefreshFlight)>>,
    pub(crate) flight_seq: AtomicU64,
    alive: AtomicBool,
    scheduler: Mutex<RefreshScheduler>,
    display_host: Option<Arc<dyn BadgeDisplayHost>>,
    provider_handle: Mutex<Option<ProviderHandle>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct BadgeSyncBuilder {
    config: Config,
    store: Arc<dyn KeyValueStore>,
    api: Arc<dyn BadgeApi>,
    notices: Arc<dyn Notices>,
    display_host: Option<Arc<dyn BadgeDisplayHost>>,
}

impl BadgeSyncBuilder {
    /// Where user-visible messages go. Defaults to the log.
    pub fn notices(mut self, notices: Arc<dyn Notices>) -> Self {
        self.notices = notices;
        self
    }

    /// Badge-display integration to register a provider with on `init`.
    pub fn display_host(mut self, host: Arc<dyn BadgeDisplayHost>) -> Self {
        self.display_host = Some(host);
        self
    }

    pub fn build(self) -> BadgeSync {
        let mut config = self.config;
        config.normalize();
        let state = State {
            local_user: config.local_user().map(str::to_string),
            ..State::default()
        };

        BadgeSync {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                store: self.store,
                api: self.api,
                notices: self.notices,
                notifier: ChangeNotifier::new(),
                state: RwLock::new(state),
                refresh_flight: Mutex::new(None),
                flight_seq: AtomicU64::new(0),
                alive: AtomicBool::new(true),
                scheduler: Mutex::new(RefreshScheduler::new()),
                display_host: self.display_host,
                provider_handle: Mutex::new(None),
            }),
        }
    }
}

/// Handle to the badge sync core. Clone is cheap; clones share state.
#[derive(Clone)]
pub struct BadgeSync {
    pub(crate) inner: Arc<Inner>,
}

impl BadgeSync {
    pub fn builder(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn BadgeApi>,
    ) -> BadgeSyncBuilder {
        BadgeSyncBuilder {
            config,
            store,
            api,
            notices: Arc::new(TracingNotices),
            display_host: None,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load persisted state, refresh the catalog unconditionally, then start
    /// the refresh timer. Failures are surfaced, never returned.
    pub async fn init(&self) -> RefreshOutcome {
        info!("Starting badge sync");

        let local = self.config().local_user().map(str::to_string);
        self.write_state().local_user = local.clone();

        let (cache, auth, submissions) = futures::join!(
            self.load_cache(),
            self.load_auth(local.as_deref()),
            self.load_submissions(local.as_deref()),
        );

        if !self.is_alive() {
            return RefreshOutcome::Skipped;
        }

        {
            let mut state = self.write_state();
            state.index = BadgeIndex::rebuild(cache.as_ref());
            state.cache = cache;
            state.auth = auth;
            state.submissions = submissions;
            debug!(
                badges = state.cache.as_ref().map(|c| c.badges.len()).unwrap_or(0),
                logged_in = state.auth.is_some(),
                submissions = state.submissions.len(),
                "Persisted state loaded"
            );
        }
        self.notify();

        self.register_provider();

        let outcome = self.refresh(true).await;
        if self.is_alive() {
            self.start_scheduler();
        }
        outcome
    }

    /// Stop the timer, drop all listeners and deregister from the display
    /// host. Results of requests still in flight are discarded. Idempotent.
    pub fn dispose(&self) {
        if !self.inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        lock(&self.inner.scheduler).cancel();
        self.inner.notifier.clear();

        let handle = lock(&self.inner.provider_handle).take();
        if let (Some(host), Some(handle)) = (self.inner.display_host.as_ref(), handle) {
            host.unregister(handle);
        }
        info!("Badge sync disposed");
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Change notification
    // =========================================================================

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.inner.notifier.subscribe(listener)
    }

    pub fn subscribe_fn<F>(&self, f: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe_fn(f)
    }

    pub(crate) fn notify(&self) {
        if self.is_alive() {
            self.inner.notifier.notify();
        }
    }

    // =========================================================================
    // Configuration and scheduling
    // =========================================================================

    pub fn config(&self) -> Config {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply new settings. A changed or invalid refresh interval re-arms the
    /// timer; a changed local identity switches the session scope.
    pub async fn update_config(&self, mut config: Config) {
        let interval_invalid = config.refresh_interval_minutes <= 0;
        config.normalize();

        let previous = {
            let mut current = self
                .inner
                .config
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, config.clone())
        };

        let interval_changed = clamp_interval(previous.refresh_interval_minutes)
            != clamp_interval(config.refresh_interval_minutes);
        if self.is_alive() && (interval_changed || interval_invalid) {
            self.start_scheduler();
        }

        if previous.local_user() != config.local_user() {
            self.set_local_user(config.local_user().map(str::to_string))
                .await;
        }
    }

    /// Arm (or re-arm) the refresh timer from the configured interval.
    pub fn start_scheduler(&self) -> Duration {
        let minutes = self.config().refresh_interval_minutes;
        let weak = Arc::downgrade(&self.inner);

        lock(&self.inner.scheduler).schedule(minutes, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    let outcome = BadgeSync { inner }.refresh(false).await;
                    debug!(?outcome, "Scheduled refresh finished");
                }
            }
        })
    }

    pub fn stop_scheduler(&self) {
        lock(&self.inner.scheduler).cancel();
    }

    /// Interval of the armed refresh timer, if any.
    pub fn refresh_interval(&self) -> Option<Duration> {
        lock(&self.inner.scheduler).effective_interval()
    }

    // =========================================================================
    // Internals shared by the components
    // =========================================================================

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn store(&self) -> &dyn KeyValueStore {
        self.inner.store.as_ref()
    }

    /// Show an error to the user.
    pub(crate) fn surface(&self, err: &BadgeSyncError) {
        self.inner.notices.show(NoticeLevel::Error, &err.to_string());
    }

    /// Surface `err` and hand it back for returning.
    pub(crate) fn fail(&self, err: BadgeSyncError) -> BadgeSyncError {
        self.surface(&err);
        err
    }

    pub(crate) fn announce(&self, level: NoticeLevel, message: &str) {
        self.inner.notices.show(level, message);
    }

    fn register_provider(&self) {
        let Some(host) = self.inner.display_host.as_ref() else {
            return;
        };
        let mut slot = lock(&self.inner.provider_handle);
        if slot.is_none() {
            let provider = CatalogProvider::new(Arc::downgrade(&self.inner));
            *slot = Some(host.register(Arc::new(provider)));
            debug!("Badge provider registered");
        }
    }
}

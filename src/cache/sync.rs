use std::sync::atomic::Ordering;
use std::sync::PoisonError;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use super::{BadgeIndex, CacheRecord};
use crate::api::CatalogFetch;
use crate::app::BadgeSync;
use crate::error::BadgeSyncError;
use crate::models::ApprovedBadge;
use crate::store;

/// How a catalog refresh ended. Refresh never returns an error; failures are
/// surfaced to the user and reported here as `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot replaced the cache.
    Updated { badges: usize },
    /// The server confirmed the cached snapshot is current.
    NotModified,
    /// The container was disposed before or during the refresh.
    Skipped,
    Failed { message: String },
}

impl BadgeSync {
    /// Revalidate the catalog. Unless `force` is set, the cached etag is sent
    /// as `If-None-Match`.
    ///
    /// Overlapping calls share one request: a caller arriving while a refresh
    /// is in flight awaits that refresh's outcome instead of starting another,
    /// whatever its own `force` flag.
    pub async fn refresh(&self, force: bool) -> RefreshOutcome {
        if !self.is_alive() {
            return RefreshOutcome::Skipped;
        }

        let (id, flight) = {
            let mut slot = self
                .inner
                .refresh_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some((id, flight)) => {
                    debug!("Joining refresh already in flight");
                    (*id, flight.clone())
                }
                None => {
                    let id = self.inner.flight_seq.fetch_add(1, Ordering::Relaxed);
                    let this = self.clone();
                    let flight = async move { this.run_refresh(force).await }
                        .boxed()
                        .shared();
                    *slot = Some((id, flight.clone()));
                    (id, flight)
                }
            }
        };

        let outcome = flight.await;

        let mut slot = self
            .inner
            .refresh_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }
        outcome
    }

    async fn run_refresh(&self, force: bool) -> RefreshOutcome {
        let Some(backend) = self.config().backend().map(str::to_string) else {
            let err = BadgeSyncError::Configuration("Badge backend URL is not set".to_string());
            warn!("Catalog refresh skipped: no backend configured");
            self.surface(&err);
            return RefreshOutcome::Failed {
                message: err.to_string(),
            };
        };

        let etag = if force { None } else { self.cached_etag() };

        debug!(force, etag = ?etag, "Refreshing badge catalog");
        let fetched = self.inner.api.fetch_approved(&backend, etag.as_deref()).await;

        if !self.is_alive() {
            debug!("Discarding catalog response after dispose");
            return RefreshOutcome::Skipped;
        }

        match fetched {
            Ok(CatalogFetch::NotModified) => {
                debug!("Badge catalog unchanged");
                RefreshOutcome::NotModified
            }
            Ok(CatalogFetch::Fetched { badges, etag }) => {
                let record = CacheRecord::new(badges, etag);
                let count = record.badges.len();
                let persisted = serde_json::to_value(&record);

                {
                    let mut state = self.write_state();
                    state.index = BadgeIndex::rebuild(Some(&record));
                    state.cache = Some(record);
                }

                match persisted {
                    Ok(value) => {
                        if let Err(e) = self.store().set(&CacheRecord::storage_key(), value).await {
                            warn!(error = %e, "Failed to persist badge cache");
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize badge cache"),
                }

                info!(count, "Badge catalog updated");
                self.notify();
                RefreshOutcome::Updated { badges: count }
            }
            Err(e) => {
                error!(error = %e, "Badge catalog refresh failed");
                let err = BadgeSyncError::from(e);
                self.surface(&err);
                RefreshOutcome::Failed {
                    message: err.to_string(),
                }
            }
        }
    }

    fn cached_etag(&self) -> Option<String> {
        let state = self.read_state();
        state.cache.as_ref().and_then(|c| c.etag.clone())
    }

    /// Current snapshot, if any.
    pub fn cache(&self) -> Option<CacheRecord> {
        self.read_state().cache.clone()
    }

    /// Badges displayed by `owner_id`, in catalog order.
    pub fn lookup(&self, owner_id: &str) -> Vec<ApprovedBadge> {
        self.read_state().index.lookup(owner_id).to_vec()
    }

    /// Number of distinct badge owners in the index.
    pub fn owner_count(&self) -> usize {
        self.read_state().index.len()
    }

    /// Read the persisted snapshot, discarding one from another schema version.
    pub(crate) async fn load_cache(&self) -> Option<CacheRecord> {
        match store::load_json::<CacheRecord>(self.store(), &CacheRecord::storage_key()).await {
            Ok(Some(record)) if record.is_current() => Some(record),
            Ok(Some(record)) => {
                debug!(version = record.version, "Discarding badge cache from another schema");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to load badge cache");
                None
            }
        }
    }
}

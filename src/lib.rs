//! badgesync - a cached badge catalog with OAuth sessions and submission
//! tracking.
//!
//! The core keeps three pieces of state consistent across restarts:
//! the approved-badge catalog (revalidated with etags and indexed by owner),
//! the signed-in session, and the user's own submissions. Observers are told
//! whenever any of them change.
//!
//! Everything hangs off one `BadgeSync` handle built from a `Config`, a
//! `KeyValueStore` and a `BadgeApi`.

pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod notices;
pub mod notify;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod submissions;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiClient, ApiError, BadgeApi, CatalogFetch, IconFile};
pub use app::{BadgeSync, BadgeSyncBuilder};
pub use auth::OAuthHandshake;
pub use cache::{BadgeIndex, CacheRecord, RefreshOutcome};
pub use config::Config;
pub use error::BadgeSyncError;
pub use models::{ApprovedBadge, AuthState, AuthUser, SubmissionBadge, SubmissionStatus};
pub use notices::{NoticeLevel, Notices, TracingNotices};
pub use notify::{ChangeNotifier, Listener, Subscription};
pub use provider::{BadgeAction, BadgeDescriptor, BadgeDisplayHost, BadgeProvider, ProviderHandle};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use submissions::SubmissionCounts;

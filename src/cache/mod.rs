//! Local cache of the approved-badge catalog.
//!
//! - `CacheRecord`: the persisted snapshot, keyed by schema version
//! - `BadgeIndex`: owner lookup rebuilt from the record on every change
//! - `BadgeSync::refresh`: conditional revalidation against the backend
//!
//! A snapshot is only ever replaced wholesale. A 304 leaves everything,
//! including the persisted copy, untouched.

pub mod index;
pub mod record;
pub mod sync;

pub use index::BadgeIndex;
pub use record::{CacheRecord, CACHE_VERSION};
pub use sync::RefreshOutcome;

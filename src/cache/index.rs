use std::collections::HashMap;

use super::CacheRecord;
use crate::models::ApprovedBadge;

/// Owner lookup over the cached catalog: `creator_id -> badges`.
///
/// Never persisted. It is rebuilt in full from the `CacheRecord` every time
/// the record is replaced, so it always reflects exactly the latest snapshot.
/// Badges keep the order they have in `CacheRecord::badges`.
#[derive(Debug, Clone, Default)]
pub struct BadgeIndex {
    by_creator: HashMap<String, Vec<ApprovedBadge>>,
}

impl BadgeIndex {
    pub fn rebuild(cache: Option<&CacheRecord>) -> Self {
        let mut by_creator: HashMap<String, Vec<ApprovedBadge>> = HashMap::new();
        if let Some(cache) = cache {
            for badge in &cache.badges {
                by_creator
                    .entry(badge.creator_id.clone())
                    .or_default()
                    .push(badge.clone());
            }
        }
        Self { by_creator }
    }

    pub fn lookup(&self, owner_id: &str) -> &[ApprovedBadge] {
        self.by_creator
            .get(owner_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct owners.
    pub fn len(&self) -> usize {
        self.by_creator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_creator.is_empty()
    }
}

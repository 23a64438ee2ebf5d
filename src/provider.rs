//! Badge-display integration.
//!
//! The host's badge/profile system asks registered providers which badges to
//! draw next to a user. `BadgeSync` registers one provider on `init` that
//! answers from the owner index and deregisters it on `dispose`.

use std::sync::{Arc, Weak};

use crate::app::{BadgeSync, Inner};
use crate::models::ApprovedBadge;

/// Prefix of every descriptor key, so hosts can tell our badges apart.
pub const BADGE_KEY_PREFIX: &str = "badgesync";

/// One badge as the display host draws it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeDescriptor {
    /// Stable across refreshes: derived from the badge id only.
    pub key: String,
    pub label: String,
    pub icon_url: String,
    pub badge_id: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeAction {
    CopyBadgeId,
    CopyIconUrl,
}

impl BadgeAction {
    pub fn label(&self) -> &'static str {
        match self {
            BadgeAction::CopyBadgeId => "Copy Badge ID",
            BadgeAction::CopyIconUrl => "Copy Icon URL",
        }
    }
}

impl BadgeDescriptor {
    pub fn from_badge(badge: &ApprovedBadge) -> Self {
        Self {
            key: format!("{}-{}", BADGE_KEY_PREFIX, badge.id),
            label: badge.name.clone(),
            icon_url: badge.icon_url.clone(),
            badge_id: badge.id.clone(),
            owner_id: badge.creator_id.clone(),
        }
    }

    /// Context-menu entries for this badge.
    pub fn context_actions(&self) -> Vec<BadgeAction> {
        vec![BadgeAction::CopyBadgeId, BadgeAction::CopyIconUrl]
    }

    /// Text an action puts on the clipboard.
    pub fn action_value(&self, action: BadgeAction) -> &str {
        match action {
            BadgeAction::CopyBadgeId => &self.badge_id,
            BadgeAction::CopyIconUrl => &self.icon_url,
        }
    }
}

/// Supplies badges for an owner on demand.
pub trait BadgeProvider: Send + Sync {
    fn badges_for(&self, owner_id: &str) -> Vec<BadgeDescriptor>;
}

/// Opaque token returned by `BadgeDisplayHost::register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderHandle(pub u64);

pub trait BadgeDisplayHost: Send + Sync {
    fn register(&self, provider: Arc<dyn BadgeProvider>) -> ProviderHandle;
    fn unregister(&self, handle: ProviderHandle);
}

/// Provider backed by the live owner index. Holds the container weakly so a
/// host that outlives it gets empty answers instead of keeping it alive.
pub(crate) struct CatalogProvider {
    inner: Weak<Inner>,
}

impl CatalogProvider {
    pub(crate) fn new(inner: Weak<Inner>) -> Self {
        Self { inner }
    }
}

impl BadgeProvider for CatalogProvider {
    fn badges_for(&self, owner_id: &str) -> Vec<BadgeDescriptor> {
        match self.inner.upgrade() {
            Some(inner) => BadgeSync { inner }.badge_descriptors(owner_id),
            None => Vec::new(),
        }
    }
}

impl BadgeSync {
    /// Descriptors for the badges `owner_id` displays, in catalog order.
    pub fn badge_descriptors(&self, owner_id: &str) -> Vec<BadgeDescriptor> {
        if !self.is_alive() {
            return Vec::new();
        }
        self.read_state()
            .index
            .lookup(owner_id)
            .iter()
            .map(BadgeDescriptor::from_badge)
            .collect()
    }
}

//! Change notification fan-out.
//!
//! UI bindings subscribe a zero-argument callback and re-render whenever the
//! cache, the session or the submission list changes. Delivery iterates over a
//! snapshot of the registry, so listeners may subscribe or unsubscribe from
//! inside a callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Callback invoked on every change.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl Registry {
    fn entries(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) {
        self.entries().retain(|(entry_id, _)| *entry_id != id);
    }
}

/// Observer registry keyed by opaque subscription tokens.
/// Clone is cheap and every clone shares the same registry.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    registry: Arc<Registry>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. Each call yields its own `Subscription`, even when
    /// the same `Arc` is registered twice; delivery still calls it once.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.entries().push((id, listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscribe_fn<F>(&self, f: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(f))
    }

    /// Invoke every listener registered at the moment of the call.
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = {
            let entries = self.registry.entries();
            let mut unique: Vec<Listener> = Vec::with_capacity(entries.len());
            for (_, listener) in entries.iter() {
                if !unique.iter().any(|seen| same_listener(seen, listener)) {
                    unique.push(Arc::clone(listener));
                }
            }
            unique
        };

        for listener in snapshot {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.entries().len()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.registry.entries().clear();
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Handle returned by `ChangeNotifier::subscribe`.
/// Dropping it does not unsubscribe; call `unsubscribe`.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove this registration. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("listeners", &self.entries().len())
            .finish()
    }
}

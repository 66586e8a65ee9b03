//! Verification key store shared by every request.
//!
//! Readers take an `Arc` of the current snapshot under a short read lock and
//! resolve against that immutable value. A refresh builds the next snapshot
//! off-lock and only swaps the pointer under the write lock, so lookups never
//! wait on the network.
//!
//! Keys that disappear from the published set are kept as retired for
//! `rotation_overlap`, so tokens signed just before a rotation still verify.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use tokio::sync::{Notify, futures::Notified};

use super::material::KeyMaterial;

/// Resolve a verification key by key id.
pub trait KeyProvider: Send + Sync {
    fn get_key(&self, kid: &str) -> Option<Arc<KeyMaterial>>;

    /// Hint that a token referenced a key id this provider does not know.
    fn request_refresh(&self) {}
}

#[derive(Debug, Clone)]
struct KeyEntry {
    material: Arc<KeyMaterial>,
    retired_at: Option<Instant>,
}

/// Immutable view of the key set at one point in time.
#[derive(Debug, Default)]
pub struct KeySnapshot {
    entries: HashMap<String, KeyEntry>,
    version: u64,
}

impl KeySnapshot {
    fn resolve(&self, kid: &str, rotation_overlap: Duration) -> Option<Arc<KeyMaterial>> {
        let entry = self.entries.get(kid)?;
        match entry.retired_at {
            None => Some(entry.material.clone()),
            Some(retired_at) if retired_at.elapsed() < rotation_overlap => {
                Some(entry.material.clone())
            }
            Some(_) => None,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn active_kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, e)| e.retired_at.is_none())
            .map(|(kid, _)| kid.as_str())
            .collect();
        kids.sort_unstable();
        kids
    }

    pub fn retired_kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, e)| e.retired_at.is_some())
            .map(|(kid, _)| kid.as_str())
            .collect();
        kids.sort_unstable();
        kids
    }
}

/// What a `replace` changed, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationSummary {
    pub active: usize,
    pub added: usize,
    pub retired: usize,
    pub dropped: usize,
}

pub struct KeyStore {
    current: RwLock<Arc<KeySnapshot>>,
    rotation_overlap: Duration,
    refresh: Notify,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("KeyStore")
            .field("version", &snapshot.version)
            .field("active", &snapshot.active_kids())
            .field("rotation_overlap", &self.rotation_overlap)
            .finish()
    }
}

impl KeyStore {
    pub fn new(rotation_overlap: Duration) -> Self {
        Self {
            current: RwLock::new(Arc::new(KeySnapshot::default())),
            rotation_overlap,
            refresh: Notify::new(),
        }
    }

    pub fn with_keys(keys: Vec<(String, KeyMaterial)>, rotation_overlap: Duration) -> Self {
        let store = Self::new(rotation_overlap);
        store.replace(keys);
        store
    }

    /// Current snapshot. Holding it keeps every key in it alive.
    pub fn snapshot(&self) -> Arc<KeySnapshot> {
        // A poisoned lock still guards a fully built Arc; keep serving it.
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn resolve_in(&self, snapshot: &KeySnapshot, kid: &str) -> Option<Arc<KeyMaterial>> {
        snapshot.resolve(kid, self.rotation_overlap)
    }

    /// Install a freshly fetched key set.
    ///
    /// - kids present in `keys` become (or stay) active with the new material
    /// - kids that were active and are now missing become retired (now)
    /// - retired kids past the overlap window are dropped
    pub fn replace(&self, keys: Vec<(String, KeyMaterial)>) -> RotationSummary {
        let previous = self.snapshot();
        let now = Instant::now();
        let mut summary = RotationSummary::default();

        let mut entries: HashMap<String, KeyEntry> = HashMap::with_capacity(keys.len());
        for (kid, material) in keys {
            let known_active = previous
                .entries
                .get(&kid)
                .is_some_and(|e| e.retired_at.is_none());
            if !known_active {
                summary.added += 1;
            }
            entries.insert(
                kid,
                KeyEntry {
                    material: Arc::new(material),
                    retired_at: None,
                },
            );
        }
        summary.active = entries.len();

        for (kid, entry) in &previous.entries {
            if entries.contains_key(kid) {
                continue;
            }
            let retired_at = entry.retired_at.unwrap_or(now);
            if now.saturating_duration_since(retired_at) < self.rotation_overlap {
                if entry.retired_at.is_none() {
                    summary.retired += 1;
                }
                entries.insert(
                    kid.clone(),
                    KeyEntry {
                        material: entry.material.clone(),
                        retired_at: Some(retired_at),
                    },
                );
            } else {
                summary.dropped += 1;
            }
        }

        let next = Arc::new(KeySnapshot {
            entries,
            version: previous.version + 1,
        });

        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next;
        summary
    }

    /// Resolves when someone asked for an early refresh.
    pub fn refresh_requested(&self) -> Notified<'_> {
        self.refresh.notified()
    }
}

impl KeyProvider for KeyStore {
    fn get_key(&self, kid: &str) -> Option<Arc<KeyMaterial>> {
        let snapshot = self.snapshot();
        snapshot.resolve(kid, self.rotation_overlap)
    }

    fn request_refresh(&self) {
        // Stores a permit when the refresher is busy, so the request is not lost.
        self.refresh.notify_one();
    }
}

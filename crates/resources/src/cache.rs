//! Reference-counted resource ledger with idle sweeping.
//!
//! The cache never disposes payloads on its own; reference counts are
//! advisory and only the manager's unload path calls loader hooks.

use scenekit_common::ResourceId;
use scenekit_events::{Bus, Event};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Idle eviction policy.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries idle longer than this (and unreferenced, non-persistent) are swept.
    pub max_idle: Duration,
    /// How often the background sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_idle: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Descriptive data stored alongside a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetadata {
    pub kind: String,
    pub approx_size: usize,
    pub persistent: bool,
    pub tags: BTreeSet<String>,
}

struct CacheEntry {
    resource: Rc<dyn Any>,
    metadata: CacheMetadata,
    ref_count: u32,
    last_accessed: Instant,
}

impl CacheEntry {
    fn is_sweepable(&self, now: Instant, max_idle: Duration) -> bool {
        !self.metadata.persistent
            && self.ref_count == 0
            && now.saturating_duration_since(self.last_accessed) > max_idle
    }
}

/// Aggregate view of the cache contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub persistent: usize,
    pub total_size: usize,
    pub by_kind: BTreeMap<String, usize>,
}

/// In-memory store of loaded assets keyed by [`ResourceId`].
pub struct ResourceCache {
    entries: RefCell<BTreeMap<ResourceId, CacheEntry>>,
    bus: Option<Rc<Bus>>,
    config: CacheConfig,
}

impl ResourceCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
            bus: None,
            config,
        }
    }

    /// Create a cache that publishes cached/removed/clear notifications on `bus`.
    pub fn with_bus(config: CacheConfig, bus: Rc<Bus>) -> Self {
        Self {
            bus: Some(bus),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Fetch a payload, taking a reference and refreshing its access time.
    pub fn get(&self, id: &ResourceId) -> Option<Rc<dyn Any>> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get_mut(id)?;
        entry.ref_count += 1;
        entry.last_accessed = Instant::now();
        Some(Rc::clone(&entry.resource))
    }

    /// Fetch a payload without touching its bookkeeping.
    pub fn peek(&self, id: &ResourceId) -> Option<Rc<dyn Any>> {
        self.entries
            .borrow()
            .get(id)
            .map(|e| Rc::clone(&e.resource))
    }

    /// Insert or overwrite an entry with one reference held.
    ///
    /// Overwriting drops the previous entry's bookkeeping without disposing it.
    pub fn set(&self, id: ResourceId, resource: Rc<dyn Any>, metadata: CacheMetadata) {
        let kind = metadata.kind.clone();
        let replaced = self
            .entries
            .borrow_mut()
            .insert(
                id.clone(),
                CacheEntry {
                    resource,
                    metadata,
                    ref_count: 1,
                    last_accessed: Instant::now(),
                },
            )
            .is_some();
        tracing::debug!(%id, replaced, "resource cached");
        self.publish(Event::ResourceCached { id, kind });
    }

    pub fn has(&self, id: &ResourceId) -> bool {
        self.entries.borrow().contains_key(id)
    }

    /// Drop one reference. Returns the new count, or `None` if `id` isn't cached.
    /// The count floors at zero and the entry is kept.
    pub fn release(&self, id: &ResourceId) -> Option<u32> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get_mut(id)?;
        entry.ref_count = entry.ref_count.saturating_sub(1);
        Some(entry.ref_count)
    }

    /// Delete an entry regardless of its reference count.
    pub fn remove(&self, id: &ResourceId) -> bool {
        let removed = self.entries.borrow_mut().remove(id);
        match removed {
            Some(entry) => {
                tracing::debug!(%id, "resource removed");
                self.publish(Event::ResourceRemoved {
                    id: id.clone(),
                    kind: entry.metadata.kind,
                });
                true
            }
            None => false,
        }
    }

    /// Ids of every entry carrying `tag`, in key order.
    pub fn get_by_tag(&self, tag: &str) -> Vec<ResourceId> {
        self.entries
            .borrow()
            .iter()
            .filter(|(_, e)| e.metadata.tags.contains(tag))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Remove everything without invoking any disposal.
    pub fn clear(&self) {
        let count = {
            let mut entries = self.entries.borrow_mut();
            let count = entries.len();
            entries.clear();
            count
        };
        tracing::debug!(count, "cache cleared");
        self.publish(Event::ResourceClear);
    }

    pub fn ref_count(&self, id: &ResourceId) -> Option<u32> {
        self.entries.borrow().get(id).map(|e| e.ref_count)
    }

    pub fn metadata(&self, id: &ResourceId) -> Option<CacheMetadata> {
        self.entries.borrow().get(id).map(|e| e.metadata.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.borrow();
        let mut stats = CacheStats {
            entries: entries.len(),
            ..CacheStats::default()
        };
        for entry in entries.values() {
            stats.total_size += entry.metadata.approx_size;
            if entry.metadata.persistent {
                stats.persistent += 1;
            }
            *stats
                .by_kind
                .entry(entry.metadata.kind.clone())
                .or_default() += 1;
        }
        stats
    }

    /// Remove every unreferenced, non-persistent entry idle past `max_idle`
    /// as of `now`. Returns the removed ids.
    pub fn sweep(&self, now: Instant) -> Vec<ResourceId> {
        let expired: Vec<ResourceId> = self
            .entries
            .borrow()
            .iter()
            .filter(|(_, e)| e.is_sweepable(now, self.config.max_idle))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.remove(id);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "swept idle resources");
        }
        expired
    }

    /// Run [`sweep`](Self::sweep) every `sweep_interval` on the current
    /// `LocalSet`. The task ends once the cache is dropped; abort the handle
    /// to stop it earlier.
    pub fn spawn_sweeper(self: &Rc<Self>) -> JoinHandle<()> {
        let cache: Weak<Self> = Rc::downgrade(self);
        let period = self.config.sweep_interval;
        tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.sweep(Instant::now());
            }
        })
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(&event);
        }
    }
}

use crate::record::EntityRecord;
use acmi::EntityId;
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::{runtime::Handle, sync::watch};

/// Shared store of every known entity, keyed by sanitised id.
///
/// Mutations mark the table dirty. The first mutation of a turn schedules a
/// flush on the current Tokio runtime that runs once the mutating task yields,
/// so the version published on the watch channel advances once per turn
/// however many mutations the turn contained. Outside a runtime every
/// mutation flushes immediately. [`EntityTable::flush`] ends the turn early.
///
/// Readers (renderer, exporters) use [`EntityTable::get`] /
/// [`EntityTable::snapshot`] directly and subscribe to the version to learn
/// when to re-read.
pub struct EntityTable {
    shared: Arc<Shared>,
}

struct Shared {
    entities: DashMap<EntityId, EntityRecord>,
    dirty: AtomicBool,
    version_tx: watch::Sender<u64>,
}

impl Shared {
    fn flush(&self) -> Option<u64> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return None;
        }

        let mut published = 0;
        self.version_tx.send_modify(|version| {
            *version += 1;
            published = *version;
        });
        Some(published)
    }
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTable {
    pub fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                entities: DashMap::new(),
                dirty: AtomicBool::new(false),
                version_tx,
            }),
        }
    }

    /// Insert or replace without scheduling a notification.
    pub fn upsert_silent(&self, record: EntityRecord) {
        self.shared.entities.insert(record.id.clone(), record);
    }

    pub fn upsert(&self, record: EntityRecord) {
        self.upsert_silent(record);
        self.notify();
    }

    /// Silent upserts for every record, then one notification if any were given.
    ///
    /// Returns the number of records written.
    pub fn upsert_batch<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = EntityRecord>,
    {
        let mut written = 0;
        for record in records {
            self.upsert_silent(record);
            written += 1;
        }
        if written > 0 {
            self.notify();
        }
        written
    }

    pub fn get(&self, id: &str) -> Option<EntityRecord> {
        self.shared.entities.get(id).map(|entry| entry.value().clone())
    }

    pub fn has(&self, id: &str) -> bool {
        self.shared.entities.contains_key(id)
    }

    pub fn remove(&self, id: &str) -> Option<EntityRecord> {
        let removed = self.shared.entities.remove(id).map(|(_, record)| record);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Patch one record in place. Returns `false` (and stays quiet) for unknown ids.
    pub fn update<F>(&self, id: &str, patch: F) -> bool
    where
        F: FnOnce(&mut EntityRecord),
    {
        let Some(mut entry) = self.shared.entities.get_mut(id) else {
            return false;
        };
        patch(entry.value_mut());
        drop(entry);
        self.notify();
        true
    }

    /// Mark the table changed. Any number of calls before the next flush
    /// collapse into one version increment.
    pub fn notify(&self) {
        if self.shared.dirty.swap(true, Ordering::AcqRel) {
            return;
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let shared = self.shared.clone();
                runtime.spawn(async move {
                    tokio::task::yield_now().await;
                    if let Some(version) = shared.flush() {
                        tracing::trace!(version, "Entity table flushed");
                    }
                });
            }
            Err(_) => {
                self.shared.flush();
            }
        }
    }

    /// End the current turn now: publish a new version if anything changed.
    ///
    /// Returns the published version, or `None` when the turn was clean. A
    /// pending scheduled flush then finds nothing to publish.
    pub fn flush(&self) -> Option<u64> {
        self.shared.flush()
    }

    pub fn clear(&self) {
        if self.shared.entities.is_empty() {
            return;
        }
        self.shared.entities.clear();
        self.notify();
    }

    /// Drop every entity and rewind the version to zero without waking observers.
    pub fn reset(&self) {
        self.shared.entities.clear();
        self.shared.dirty.store(false, Ordering::Release);
        self.shared.version_tx.send_if_modified(|version| {
            *version = 0;
            false
        });
    }

    pub fn len(&self) -> usize {
        self.shared.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entities.is_empty()
    }

    /// Copy of every record, in no particular order.
    pub fn snapshot(&self) -> Vec<EntityRecord> {
        self.shared
            .entities
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn version(&self) -> u64 {
        *self.shared.version_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.version_tx.subscribe()
    }
}

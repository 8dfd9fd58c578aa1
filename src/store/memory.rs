//! In-memory capture store with an optional JSON snapshot file.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::store::types::{
    ApiResponse, HistoryEntry, RecordId, RecordKey, ResponseFilter, StoreError, SubId,
};
use crate::store::CaptureStore;

/// A record together with its history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    current: ApiResponse,
    history: Vec<HistoryEntry>,
    next_sub_id: SubId,
}

impl StoredRecord {
    fn new(current: ApiResponse) -> Self {
        Self {
            current,
            history: Vec::new(),
            next_sub_id: 1,
        }
    }

    fn push_history(&mut self, id: RecordId, snapshot: ApiResponse) {
        self.history.push(HistoryEntry {
            id,
            sub_id: self.next_sub_id,
            saved_at: unix_now(),
            record: snapshot,
        });
        self.next_sub_id += 1;
    }
}

/// On-disk layout of the snapshot file.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    next_id: RecordId,
    records: Vec<StoredRecord>,
}

/// State of one record before and after a write.
struct Change {
    id: RecordId,
    before: Option<StoredRecord>,
    after: Option<StoredRecord>,
}

/// Capture store backed by concurrent maps.
///
/// Reads never block. Writers are serialized, which keeps the uniqueness
/// check, the key index and the snapshot file consistent with each other.
pub struct MemoryStore {
    records: DashMap<RecordId, StoredRecord>,
    index: DashMap<RecordKey, RecordId>,
    next_id: AtomicU64,
    snapshot_path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create an empty store that keeps everything in memory.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            index: DashMap::new(),
            next_id: AtomicU64::new(1),
            snapshot_path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store persisted to `path`, loading the snapshot if it exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let store = Self {
            snapshot_path: Some(path.to_path_buf()),
            ..Self::new()
        };

        if path.exists() {
            let file = File::open(path)?;
            let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;

            store.next_id.store(snapshot.next_id, Ordering::SeqCst);
            for stored in snapshot.records {
                if let Some(id) = stored.current.id {
                    store.index.insert(stored.current.key(), id);
                    store.records.insert(id, stored);
                }
            }
            tracing::info!(path = ?path, records = store.records.len(), "Loaded capture snapshot");
        }

        Ok(store)
    }

    /// Number of current records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn load(&self, id: RecordId) -> Result<StoredRecord, StoreError> {
        self.records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound { id })
    }

    fn ensure_key_free(&self, key: &RecordKey, owner: Option<RecordId>) -> Result<(), StoreError> {
        let taken_by = self.index.get(key).map(|r| *r.value());
        match taken_by {
            Some(other) if Some(other) != owner => Err(StoreError::conflict(key)),
            _ => Ok(()),
        }
    }

    fn apply(&self, change: &Change, forward: bool) {
        let (from, to) = if forward {
            (&change.before, &change.after)
        } else {
            (&change.after, &change.before)
        };

        // Insert before removing so a record never disappears from readers.
        let new_key = to.as_ref().map(|new| new.current.key());
        if let (Some(new), Some(key)) = (to, &new_key) {
            self.records.insert(change.id, new.clone());
            self.index.insert(key.clone(), change.id);
        }
        if let Some(old) = from {
            let old_key = old.current.key();
            if new_key.as_ref() != Some(&old_key) {
                self.index.remove_if(&old_key, |_, id| *id == change.id);
            }
            if to.is_none() {
                self.records.remove(&change.id);
            }
        }
    }

    /// Apply changes and write the snapshot; undo the changes if the write fails.
    async fn commit(&self, changes: Vec<Change>) -> Result<(), StoreError> {
        for change in &changes {
            self.apply(change, true);
        }

        if let Err(e) = self.flush().await {
            for change in changes.iter().rev() {
                self.apply(change, false);
            }
            tracing::error!(error = %e, "Failed to write capture snapshot, changes rolled back");
            return Err(e);
        }
        Ok(())
    }

    /// Write the snapshot file via a temporary file and rename.
    async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let mut records: Vec<StoredRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.current.id);

        let snapshot = Snapshot {
            next_id: self.next_id.load(Ordering::SeqCst),
            records,
        };
        let json = serde_json::to_vec(&snapshot)?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureStore for MemoryStore {
    async fn create(&self, mut record: ApiResponse) -> Result<ApiResponse, StoreError> {
        let _guard = self.write_lock.lock().await;

        self.ensure_key_free(&record.key(), None)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.id = Some(id);

        self.commit(vec![Change {
            id,
            before: None,
            after: Some(StoredRecord::new(record.clone())),
        }])
        .await?;

        tracing::debug!(id, path = %record.path, method = %record.method, "Created response");
        Ok(record)
    }

    async fn find_one(&self, id: RecordId) -> Result<Option<ApiResponse>, StoreError> {
        Ok(self.records.get(&id).map(|r| r.current.clone()))
    }

    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<ApiResponse>, StoreError> {
        let id = self.index.get(key).map(|r| *r.value());
        Ok(id.and_then(|id| {
            self.records
                .get(&id)
                .filter(|r| r.current.key() == *key)
                .map(|r| r.current.clone())
        }))
    }

    async fn find_all(&self, filter: &ResponseFilter) -> Result<Vec<ApiResponse>, StoreError> {
        let mut found: Vec<ApiResponse> = self
            .records
            .iter()
            .filter(|r| filter.matches(&r.current))
            .map(|r| r.current.clone())
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }

    async fn update(
        &self,
        id: RecordId,
        mut record: ApiResponse,
        keep_attachment: bool,
        save_history: bool,
    ) -> Result<ApiResponse, StoreError> {
        let _guard = self.write_lock.lock().await;

        let before = self.load(id)?;
        self.ensure_key_free(&record.key(), Some(id))?;

        record.id = Some(id);
        if keep_attachment && before.current.payload.is_attachment() {
            record.payload = before.current.payload.clone();
        }

        let mut after = before.clone();
        if save_history {
            after.push_history(id, before.current.clone());
        }
        after.current = record.clone();

        self.commit(vec![Change {
            id,
            before: Some(before),
            after: Some(after),
        }])
        .await?;

        tracing::debug!(id, save_history, "Updated response");
        Ok(record)
    }

    async fn delete(&self, ids: &[RecordId]) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;

        let unique: HashSet<RecordId> = ids.iter().copied().collect();
        let changes: Vec<Change> = unique
            .into_iter()
            .filter_map(|id| {
                self.records.get(&id).map(|r| Change {
                    id,
                    before: Some(r.value().clone()),
                    after: None,
                })
            })
            .collect();

        let deleted = changes.len();
        if deleted > 0 {
            self.commit(changes).await?;
            tracing::debug!(deleted, "Deleted responses");
        }
        Ok(deleted)
    }

    async fn find_all_history(&self, id: RecordId) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.load(id)?.history)
    }

    async fn find_history(
        &self,
        id: RecordId,
        sub_id: SubId,
    ) -> Result<Option<HistoryEntry>, StoreError> {
        Ok(self.records.get(&id).and_then(|r| {
            r.history
                .iter()
                .find(|entry| entry.sub_id == sub_id)
                .cloned()
        }))
    }

    async fn delete_history(&self, id: RecordId, sub_ids: &[SubId]) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;

        let before = self.load(id)?;
        let mut after = before.clone();
        after.history.retain(|entry| !sub_ids.contains(&entry.sub_id));

        let deleted = before.history.len() - after.history.len();
        if deleted > 0 {
            self.commit(vec![Change {
                id,
                before: Some(before),
                after: Some(after),
            }])
            .await?;
        }
        Ok(deleted)
    }

    async fn restore_history(
        &self,
        id: RecordId,
        sub_id: SubId,
    ) -> Result<ApiResponse, StoreError> {
        let _guard = self.write_lock.lock().await;

        let before = self.load(id)?;
        let entry = before
            .history
            .iter()
            .find(|entry| entry.sub_id == sub_id)
            .ok_or(StoreError::HistoryNotFound { id, sub_id })?;

        let mut restored = entry.record.clone();
        restored.id = Some(id);
        self.ensure_key_free(&restored.key(), Some(id))?;

        let mut after = before.clone();
        after.current = restored.clone();

        self.commit(vec![Change {
            id,
            before: Some(before),
            after: Some(after),
        }])
        .await?;

        tracing::debug!(id, sub_id, "Restored response from history");
        Ok(restored)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

//! Capture storage subsystem.
//!
//! # Data Flow
//! ```text
//! proxy capture recorder ──create──▶ CaptureStore ◀──CRUD / history── admin API
//!                                         │
//! stub handler ◀──find_by_key─────────────┘
//! ```
//!
//! # Design Decisions
//! - The store owns identifier assignment and `(path, method, data_key)` uniqueness
//! - Writes either fully apply (memory and snapshot) or leave no trace
//! - History entries are snapshots; only restore and delete touch them

pub mod memory;
pub mod types;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use types::{
    ApiResponse, HistoryEntry, Payload, RecordId, RecordKey, ResponseFilter, StoreError, SubId,
};

/// Persistence port for capture records.
#[async_trait]
pub trait CaptureStore: Send + Sync {
    /// Insert a new record and return it with its assigned id.
    ///
    /// Fails with [`StoreError::Conflict`] when the `(path, method, data_key)`
    /// triplet is already taken.
    async fn create(&self, record: ApiResponse) -> Result<ApiResponse, StoreError>;

    async fn find_one(&self, id: RecordId) -> Result<Option<ApiResponse>, StoreError>;

    /// Look up the record serving a route and data key.
    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<ApiResponse>, StoreError>;

    async fn find_all(&self, filter: &ResponseFilter) -> Result<Vec<ApiResponse>, StoreError>;

    /// Replace the record `id`.
    ///
    /// With `keep_attachment`, an existing attachment survives the update.
    /// With `save_history`, the previous version is kept as a history entry.
    async fn update(
        &self,
        id: RecordId,
        record: ApiResponse,
        keep_attachment: bool,
        save_history: bool,
    ) -> Result<ApiResponse, StoreError>;

    /// Delete records and their history. Unknown ids are ignored.
    async fn delete(&self, ids: &[RecordId]) -> Result<usize, StoreError>;

    async fn find_all_history(&self, id: RecordId) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn find_history(
        &self,
        id: RecordId,
        sub_id: SubId,
    ) -> Result<Option<HistoryEntry>, StoreError>;

    /// Delete history entries of one record. Unknown sub ids are ignored.
    async fn delete_history(&self, id: RecordId, sub_ids: &[SubId]) -> Result<usize, StoreError>;

    /// Promote a history entry back to the current version of its record.
    async fn restore_history(&self, id: RecordId, sub_id: SubId)
        -> Result<ApiResponse, StoreError>;
}

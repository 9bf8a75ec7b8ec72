//! The persistence boundary: batch upsert, delete, and full fetch.

use std::cell::Cell;

use crate::io::lock::LockError;
use crate::model::{EntityKind, Row, Snapshot};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store has not been initialized at {0}")]
    NotInitialized(String),
    #[error("stale write: based on revision {expected}, store is at {actual}")]
    Conflict { expected: u64, actual: u64 },
    #[error("{kind} not found in store: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("store rejected the write: {0}")]
    Rejected(String),
    #[error("could not parse store data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authoritative storage for every collection.
///
/// Writes carry the revision the caller's state was derived from. A store
/// whose revision has moved on rejects the write with
/// [`StoreError::Conflict`]; on success it returns the new revision.
pub trait Store {
    /// Read every collection as of the current revision.
    fn fetch_all(&self) -> Result<Snapshot, StoreError>;

    /// Write all rows in one all-or-nothing batch, keyed by row id.
    fn upsert(&mut self, base_revision: u64, rows: &[Row]) -> Result<u64, StoreError>;

    /// Delete one entity. Siblings are not renumbered.
    fn delete(&mut self, base_revision: u64, kind: EntityKind, id: &str)
    -> Result<u64, StoreError>;
}

/// Check `base` against the store's current revision.
pub fn ensure_revision(base: u64, current: u64) -> Result<(), StoreError> {
    if base == current {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            expected: base,
            actual: current,
        })
    }
}

/// Apply a committed batch to stored data, bumping the revision.
pub fn apply_upsert(data: &mut Snapshot, rows: &[Row]) -> u64 {
    for row in rows {
        data.apply_row(row);
    }
    data.revision += 1;
    data.revision
}

/// Apply a committed delete to stored data, bumping the revision.
pub fn apply_delete(data: &mut Snapshot, kind: EntityKind, id: &str) -> Result<u64, StoreError> {
    if !data.remove(kind, id) {
        return Err(StoreError::NotFound {
            kind,
            id: id.to_string(),
        });
    }
    data.revision += 1;
    Ok(data.revision)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// A store held entirely in memory, with hooks for failing writes and
/// counters for inspecting how it was used.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Snapshot,
    fail_upserts: usize,
    fail_deletes: usize,
    fail_fetches: Cell<usize>,
    fetches: Cell<usize>,
    batches: Vec<Vec<Row>>,
    deletes: Vec<(EntityKind, String)>,
}

impl MemoryStore {
    pub fn new(data: Snapshot) -> Self {
        MemoryStore {
            data,
            ..MemoryStore::default()
        }
    }

    /// Reject the next `n` upserts.
    pub fn fail_next_upserts(&mut self, n: usize) {
        self.fail_upserts = n;
    }

    /// Reject the next `n` deletes.
    pub fn fail_next_deletes(&mut self, n: usize) {
        self.fail_deletes = n;
    }

    /// Fail the next `n` fetches.
    pub fn fail_next_fetches(&mut self, n: usize) {
        self.fail_fetches.set(n);
    }

    /// Stored data as it stands, without counting as a fetch.
    pub fn data(&self) -> &Snapshot {
        &self.data
    }

    /// Edit stored data directly, as another writer would. Bumps the revision.
    pub fn write_external(&mut self, f: impl FnOnce(&mut Snapshot)) {
        f(&mut self.data);
        self.data.revision += 1;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    /// Every batch accepted so far, in commit order.
    pub fn batches(&self) -> &[Vec<Row>] {
        &self.batches
    }

    /// Every delete accepted so far, in commit order.
    pub fn deletes(&self) -> &[(EntityKind, String)] {
        &self.deletes
    }
}

impl Store for MemoryStore {
    fn fetch_all(&self) -> Result<Snapshot, StoreError> {
        self.fetches.set(self.fetches.get() + 1);
        if self.fail_fetches.get() > 0 {
            self.fail_fetches.set(self.fail_fetches.get() - 1);
            return Err(StoreError::Rejected("injected fetch failure".into()));
        }
        Ok(self.data.clone())
    }

    fn upsert(&mut self, base_revision: u64, rows: &[Row]) -> Result<u64, StoreError> {
        if self.fail_upserts > 0 {
            self.fail_upserts -= 1;
            return Err(StoreError::Rejected("injected upsert failure".into()));
        }
        ensure_revision(base_revision, self.data.revision)?;
        let rev = apply_upsert(&mut self.data, rows);
        self.batches.push(rows.to_vec());
        Ok(rev)
    }

    fn delete(
        &mut self,
        base_revision: u64,
        kind: EntityKind,
        id: &str,
    ) -> Result<u64, StoreError> {
        if self.fail_deletes > 0 {
            self.fail_deletes -= 1;
            return Err(StoreError::Rejected("injected delete failure".into()));
        }
        ensure_revision(base_revision, self.data.revision)?;
        let rev = apply_delete(&mut self.data, kind, id)?;
        self.deletes.push((kind, id.to_string()));
        Ok(rev)
    }
}

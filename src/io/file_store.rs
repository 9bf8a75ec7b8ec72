//! JSON-file backed store.
//!
//! The whole snapshot lives in one file. Every write takes the advisory
//! lock, re-reads the file, checks the caller's base revision, applies the
//! change, and replaces the file atomically.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::lock::FileLock;
use super::store::{Store, StoreError, apply_delete, apply_upsert, ensure_revision};
use crate::model::{EntityKind, Row, Snapshot};

const FORMAT_VERSION: u32 = 1;

/// On-disk envelope around the snapshot
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    format: u32,
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    data: Snapshot,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        FileStore {
            path: path.into(),
            lock_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create the store file with initial contents. Overwrites any existing
    /// file only when `force` is set.
    pub fn create(&self, data: &Snapshot, force: bool) -> Result<(), StoreError> {
        let _lock = FileLock::acquire(&self.path, self.lock_timeout)?;
        if self.exists() && !force {
            return Err(StoreError::Rejected(format!(
                "{} already exists",
                self.path.display()
            )));
        }
        self.write(data)?;
        info!(path = %self.path.display(), "store created");
        Ok(())
    }

    fn read(&self) -> Result<Snapshot, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotInitialized(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let file: StoreFile = serde_json::from_str(&text)?;
        if file.format != FORMAT_VERSION {
            return Err(StoreError::Rejected(format!(
                "unsupported store format {}",
                file.format
            )));
        }
        Ok(file.data)
    }

    fn write(&self, data: &Snapshot) -> Result<(), StoreError> {
        let file = StoreFile {
            format: FORMAT_VERSION,
            saved_at: Utc::now(),
            data: data.clone(),
        };
        let mut content = serde_json::to_string_pretty(&file)?;
        content.push('\n');
        atomic_write(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), revision = data.revision, "store written");
        Ok(())
    }

    /// Lock, read, mutate, write.
    fn transact(
        &self,
        base_revision: u64,
        f: impl FnOnce(&mut Snapshot) -> Result<u64, StoreError>,
    ) -> Result<u64, StoreError> {
        let _lock = FileLock::acquire(&self.path, self.lock_timeout)?;
        let mut data = self.read()?;
        ensure_revision(base_revision, data.revision)?;
        let rev = f(&mut data)?;
        self.write(&data)?;
        Ok(rev)
    }
}

impl Store for FileStore {
    fn fetch_all(&self) -> Result<Snapshot, StoreError> {
        self.read()
    }

    fn upsert(&mut self, base_revision: u64, rows: &[Row]) -> Result<u64, StoreError> {
        self.transact(base_revision, |data| Ok(apply_upsert(data, rows)))
    }

    fn delete(
        &mut self,
        base_revision: u64,
        kind: EntityKind,
        id: &str,
    ) -> Result<u64, StoreError> {
        self.transact(base_revision, |data| apply_delete(data, kind, id))
    }
}

/// Write a file atomically: temp file in the same directory, then rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Board, Column, Item};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn seed() -> Snapshot {
        Snapshot {
            boards: vec![Board {
                id: "b1".into(),
                name: "Sales".into(),
            }],
            columns: vec![Column::new("todo", "b1", "To Do")],
            items: vec![Item::new("a", "todo", "A")],
            ..Snapshot::default()
        }
    }

    fn store(tmp: &TempDir) -> FileStore {
        FileStore::new(tmp.path().join("cardbox.json"), Duration::from_secs(1))
    }

    #[test]
    fn test_fetch_before_init() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            store(&tmp).fetch_all(),
            Err(StoreError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_create_and_fetch_round_trip() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        s.create(&seed(), false).unwrap();
        assert_eq!(s.fetch_all().unwrap(), seed());
        assert!(s.create(&seed(), false).is_err());
        s.create(&seed(), true).unwrap();
    }

    #[test]
    fn test_upsert_persists_and_bumps_revision() {
        let tmp = TempDir::new().unwrap();
        let mut s = store(&tmp);
        s.create(&seed(), false).unwrap();

        let mut b = Item::new("b", "todo", "B");
        b.order_index = 1;
        let rev = s.upsert(0, &[Row::Item(b)]).unwrap();
        assert_eq!(rev, 1);

        let data = s.fetch_all().unwrap();
        assert_eq!(data.revision, 1);
        assert_eq!(data.items.len(), 2);
    }

    #[test]
    fn test_stale_write_rejected_and_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let mut s = store(&tmp);
        s.create(&seed(), false).unwrap();
        s.upsert(0, &[]).unwrap();

        let before = fs::read_to_string(s.path()).unwrap();
        let err = s.delete(0, EntityKind::Item, "a").unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 0, actual: 1 }));
        assert_eq!(fs::read_to_string(s.path()).unwrap(), before);
    }

    #[test]
    fn test_delete() {
        let tmp = TempDir::new().unwrap();
        let mut s = store(&tmp);
        s.create(&seed(), false).unwrap();
        s.delete(0, EntityKind::Item, "a").unwrap();
        assert!(s.fetch_all().unwrap().items.is_empty());
    }

    #[test]
    fn test_file_carries_format_marker() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        s.create(&seed(), false).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(s.path()).unwrap()).unwrap();
        assert_eq!(raw["format"], 1);
        assert!(raw["saved_at"].is_string());
        assert_eq!(raw["boards"][0]["id"], "b1");
    }
}

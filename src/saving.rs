use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

use crate::error::{SheetError, StoreError};
use crate::table::StudyTables;

/// Read-modify-write callback: receives the stored blob, returns the blob to
/// write back or `None` to leave the store unchanged.
pub type UpdateFn<'f> = dyn FnMut(Option<String>) -> Result<Option<String>, SheetError> + 'f;

/// Per-project storage of sheet configuration JSON blobs.
pub trait ConfigStore {
    fn load(&self, project: &str) -> Result<Option<String>, StoreError>;

    fn save(&self, project: &str, blob: &str) -> Result<(), StoreError>;

    /// Runs `f` with no other update of the same store interleaved.
    fn update(&self, project: &str, f: &mut UpdateFn<'_>) -> Result<(), SheetError>;
}

/// One `<project>.json` file per project under a directory.
pub struct FileConfigStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(FileConfigStore {
            dir: dir.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    fn path(&self, project: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_key(project)))
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self, project: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(project)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, project: &str, blob: &str) -> Result<(), StoreError> {
        let path = self.path(project);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(blob.as_bytes())?;
        tmp.flush()?;
        persist(tmp, &path)?;
        debug!("stored sheet configuration at {}", path.display());
        Ok(())
    }

    fn update(&self, project: &str, f: &mut UpdateFn<'_>) -> Result<(), SheetError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.load(project)?;
        if let Some(blob) = f(current)? {
            self.save(project, &blob)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryConfigStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, project: &str) -> Result<Option<String>, StoreError> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(blobs.get(project).cloned())
    }

    fn save(&self, project: &str, blob: &str) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.insert(project.to_string(), blob.to_string());
        Ok(())
    }

    fn update(&self, project: &str, f: &mut UpdateFn<'_>) -> Result<(), SheetError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(blob) = f(blobs.get(project).cloned())? {
            blobs.insert(project.to_string(), blob);
        }
        Ok(())
    }
}

/// Last-built tables per study, gzip-compressed bincode files.
///
/// Callers invalidate an entry whenever the study graph changes.
pub struct TableCache {
    dir: PathBuf,
}

impl TableCache {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(TableCache {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn path(&self, study: &str) -> PathBuf {
        self.dir.join(format!("{}.bin.gz", file_key(study)))
    }

    pub fn get(&self, study: &str) -> Result<Option<StudyTables>, StoreError> {
        let file = match File::open(self.path(study)) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(GzDecoder::new(file));
        let tables: StudyTables = deserialize_from(&mut reader)?;
        Ok(Some(tables))
    }

    pub fn put(&self, study: &str, tables: &StudyTables) -> Result<(), StoreError> {
        let path = self.path(study);
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
            let mut writer = BufWriter::new(encoder);
            serialize_into(&mut writer, tables)?;
            let encoder = writer.into_inner().map_err(|e| e.into_error())?;
            encoder.finish()?;
        }
        persist(tmp, &path)?;
        debug!("cached tables for study {}", study);
        Ok(())
    }

    pub fn invalidate(&self, study: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(study)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.to_string_lossy().ends_with(".bin.gz") {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<(), StoreError> {
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}

/// Keys become file names. ASCII alphanumerics and `-` are kept, every
/// other byte (`_` included) is written as `_` plus two hex digits, so
/// distinct keys never share a file.
fn file_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{:02x}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RenderedTable;

    #[test]
    fn file_store_round_trips_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::open(dir.path()).unwrap();
        assert_eq!(store.load("p1").unwrap(), None);
        store.save("p1", r#"{"version":"0.8"}"#).unwrap();
        assert_eq!(store.load("p1").unwrap().as_deref(), Some(r#"{"version":"0.8"}"#));
    }

    #[test]
    fn update_skips_write_on_none() {
        let store = MemoryConfigStore::new();
        store.save("p", "old").unwrap();
        store.update("p", &mut |_| Ok(None)).unwrap();
        assert_eq!(store.load("p").unwrap().as_deref(), Some("old"));
        store
            .update("p", &mut |cur| Ok(cur.map(|c| format!("{}+new", c))))
            .unwrap();
        assert_eq!(store.load("p").unwrap().as_deref(), Some("old+new"));
    }

    #[test]
    fn table_cache_invalidate_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TableCache::open(dir.path()).unwrap();
        let tables = StudyTables {
            study: RenderedTable::default(),
            assays: Default::default(),
        };
        cache.put("study/1", &tables).unwrap();
        assert_eq!(cache.get("study/1").unwrap(), Some(tables));
        cache.invalidate("study/1").unwrap();
        assert_eq!(cache.get("study/1").unwrap(), None);
        cache.invalidate("study/1").unwrap();
    }

    #[test]
    fn file_key_escapes_separators() {
        assert_eq!(file_key("a/b c"), "a_2fb_20c");
        assert_eq!(file_key("a_b"), "a_5fb");
        assert_ne!(file_key("project/1"), file_key("project_1"));
    }

    #[test]
    fn similar_keys_stay_separate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::open(dir.path()).unwrap();
        store.save("project/1", "A").unwrap();
        store.save("project_1", "B").unwrap();
        assert_eq!(store.load("project/1").unwrap().as_deref(), Some("A"));
        assert_eq!(store.load("project_1").unwrap().as_deref(), Some("B"));

        let cache = TableCache::open(dir.path().join("cache")).unwrap();
        let one = StudyTables::default();
        let mut two = StudyTables::default();
        two.assays.insert("a1".to_string(), RenderedTable::default());
        cache.put("Study 1", &one).unwrap();
        cache.put("Study_1", &two).unwrap();
        assert_eq!(cache.get("Study 1").unwrap(), Some(one));
        assert_eq!(cache.get("Study_1").unwrap(), Some(two));
    }
}

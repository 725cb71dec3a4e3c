//! Fingerprint cache: fingerprint -> label ids returned by the oracle.
//!
//! The backing file is a JSON object `{"<fingerprint>": [id, ...]}`. It is read
//! once when the cache is opened and written once by `flush` at the end of the
//! run. Read and write failures are logged and absorbed; a run never aborts
//! because of the cache.

use crate::fingerprint::Fingerprint;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;

pub struct FingerprintCache {
    path: Option<PathBuf>,
    entries: RwLock<HashMap<Fingerprint, Vec<usize>>>,
    dirty: AtomicBool,
}

impl FingerprintCache {
    /// Open the cache at `path`. A missing file is a first run; an unreadable
    /// or unparseable file is treated as empty.
    pub fn open(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<HashMap<Fingerprint, Vec<usize>>>(&raw) {
                Ok(map) => {
                    log::debug!("cache: loaded {} entries from {}", map.len(), path.display());
                    map
                }
                Err(e) => {
                    log::warn!("cache: {} is corrupt ({e}), starting empty", path.display());
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                log::warn!("cache: cannot read {} ({e}), starting empty", path.display());
                HashMap::new()
            }
        };

        Self {
            path: Some(path.to_path_buf()),
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    /// A cache with no backing file. `flush` is a no-op.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Vec<usize>> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.get(fingerprint).cloned()
    }

    /// Record ids for a fingerprint. Existing entries are never overwritten.
    pub fn store(&self, fingerprint: Fingerprint, ids: Vec<usize>) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if let std::collections::hash_map::Entry::Vacant(slot) = entries.entry(fingerprint) {
            slot.insert(ids);
            self.dirty.store(true, Ordering::Release);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist to the backing file. Best-effort and idempotent: nothing is
    /// written when no entry was added since the last successful flush.
    pub fn flush(&self) {
        let Some(path) = &self.path else { return };
        if !self.dirty.load(Ordering::Acquire) {
            return;
        }

        let snapshot: BTreeMap<Fingerprint, Vec<usize>> = {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        match write_atomic(path, &snapshot) {
            Ok(()) => {
                self.dirty.store(false, Ordering::Release);
                log::debug!("cache: wrote {} entries to {}", snapshot.len(), path.display());
            }
            Err(e) => log::warn!("cache: failed to write {} ({e})", path.display()),
        }
    }
}

/// Write through a temp file in the same directory and rename over the target,
/// so a crash mid-write leaves the previous cache intact.
fn write_atomic(path: &Path, snapshot: &BTreeMap<Fingerprint, Vec<usize>>) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    write_snapshot(&temp, snapshot)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize and flush; any write error surfaces here, before the rename.
fn write_snapshot<W: Write>(out: W, snapshot: &BTreeMap<Fingerprint, Vec<usize>>) -> std::io::Result<()> {
    let mut writer = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::Vocabulary;

    fn fp(text: &str) -> Fingerprint {
        let v = Vocabulary::new(["power outages", "housing cost"]).unwrap();
        Fingerprint::compute(text, &v)
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = FingerprintCache::open(&dir.path().join("nope.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ this is not json").unwrap();
        let cache = FingerprintCache::open(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn store_does_not_overwrite() {
        let cache = FingerprintCache::in_memory();
        cache.store(fp("a"), vec![1]);
        cache.store(fp("a"), vec![2]);
        assert_eq!(cache.lookup(&fp("a")), Some(vec![1]));
        assert_eq!(cache.lookup(&fp("b")), None);
    }

    #[test]
    fn flush_round_trips_through_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache = FingerprintCache::open(&path);
        cache.store(fp("no electricity"), vec![1]);
        cache.store(fp("rent doubled"), vec![2, 1]);
        cache.flush();
        cache.flush();

        let reopened = FingerprintCache::open(&path);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.lookup(&fp("rent doubled")), Some(vec![2, 1]));
    }

    #[test]
    fn flush_without_changes_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        FingerprintCache::open(&path).flush();
        assert!(!path.exists());
    }

    #[test]
    fn buffered_write_error_is_reported() {
        struct DiskFull;

        impl Write for DiskFull {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("no space left on device"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut snapshot = BTreeMap::new();
        snapshot.insert(fp("a"), vec![1]);
        assert!(write_snapshot(DiskFull, &snapshot).is_err());
    }

    #[test]
    fn flush_failure_is_absorbed() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("cache.json");
        std::fs::create_dir(&path).unwrap();
        let cache = FingerprintCache::open(&path);
        cache.store(fp("x"), vec![1]);
        cache.flush();
        assert_eq!(cache.lookup(&fp("x")), Some(vec![1]));
    }
}

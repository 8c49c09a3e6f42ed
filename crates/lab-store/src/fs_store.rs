use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};

use lab_types::transcript::TranscriptEntry;
use lab_types::{Error, Result};

use crate::checkpoint::Snapshot;
use crate::index::{Index, ThreadSummary};

/// File-backed transcript and checkpoint store, one directory per `Store`.
///
/// Layout:
/// ```text
/// <base>/
///   index.json                  thread -> (preset_ref, updated_at)
///   threads/<thread_id>.jsonl    transcript, one entry per line
///   threads/<thread_id>.ckpt.json  latest checkpoint, if any
/// ```
///
/// Writes for a given thread are serialized through a per-thread
/// [`parking_lot::Mutex`] held in `locks`, mirroring the concurrency-guard
/// idiom used for the task worker pool: many threads write concurrently,
/// but never the same thread twice at once.
pub struct Store {
    base_dir: PathBuf,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
    index: Mutex<Index>,
}

impl Store {
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(base_dir.join("threads"))?;
        let index = Self::load_index(&base_dir)?;
        Ok(Self { base_dir, locks: RwLock::new(HashMap::new()), index: Mutex::new(index) })
    }

    fn index_path(base_dir: &Path) -> PathBuf {
        base_dir.join("index.json")
    }

    fn load_index(base_dir: &Path) -> Result<Index> {
        let path = Self::index_path(base_dir);
        if !path.exists() {
            return Ok(Index::default());
        }
        let raw = fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(Index::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn persist_index(&self, index: &Index) -> Result<()> {
        let raw = serde_json::to_string_pretty(index)?;
        fs::write(Self::index_path(&self.base_dir), raw)?;
        Ok(())
    }

    fn transcript_path(&self, thread_id: &str) -> PathBuf {
        self.base_dir.join("threads").join(format!("{thread_id}.jsonl"))
    }

    fn checkpoint_path(&self, thread_id: &str) -> PathBuf {
        self.base_dir.join("threads").join(format!("{thread_id}.ckpt.json"))
    }

    fn lock_for(&self, thread_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().get(thread_id) {
            return lock.clone();
        }
        self.locks.write().entry(thread_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Appends one transcript entry for `thread_id`, creating the file (and
    /// the index row) on first use. Never mutates or truncates existing
    /// lines — entries are durable once written.
    #[instrument(skip(self, entry), fields(thread_id))]
    pub fn append_transcript(&self, thread_id: &str, preset_ref: &str, entry: &TranscriptEntry) -> Result<()> {
        let lock = self.lock_for(thread_id);
        let _guard = lock.lock();

        let mut file = OpenOptions::new().create(true).append(true).open(self.transcript_path(thread_id))?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        file.flush()?;

        let mut index = self.index.lock();
        index.upsert(thread_id, preset_ref);
        self.persist_index(&index)?;
        debug!(thread_id, iter = entry.iter, "appended transcript entry");
        Ok(())
    }

    /// Reads entries in chronological (append) order. `offset` skips the
    /// first N entries; `limit` caps how many are returned after that.
    pub fn read_transcript(&self, thread_id: &str, offset: usize, limit: Option<usize>) -> Result<Vec<TranscriptEntry>> {
        let path = self.transcript_path(thread_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let lock = self.lock_for(thread_id);
        let _guard = lock.lock();

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if i < offset {
                continue;
            }
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }

    /// Persists `snapshot` as the thread's latest checkpoint. Refuses an
    /// opaque (`_pickled`) snapshot outright, since it would never be
    /// resumable on [`Self::load_checkpoint`] anyway.
    pub fn save_checkpoint(&self, thread_id: &str, snapshot: &Snapshot) -> Result<()> {
        if snapshot.is_opaque() {
            return Err(Error::InvalidArgument(format!(
                "refusing to persist opaque (_pickled) snapshot for thread {thread_id}"
            )));
        }
        let lock = self.lock_for(thread_id);
        let _guard = lock.lock();
        let raw = serde_json::to_string(snapshot)?;
        fs::write(self.checkpoint_path(thread_id), raw)?;
        Ok(())
    }

    /// Loads the thread's latest checkpoint, if any. An opaque snapshot
    /// found on disk (left behind by an older, incompatible writer) is
    /// refused rather than handed back, matching [`Self::save_checkpoint`].
    pub fn load_checkpoint(&self, thread_id: &str) -> Result<Option<Snapshot>> {
        let path = self.checkpoint_path(thread_id);
        if !path.exists() {
            return Ok(None);
        }
        let lock = self.lock_for(thread_id);
        let _guard = lock.lock();
        let raw = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        if snapshot.is_opaque() {
            return Err(Error::InvalidArgument(format!("thread {thread_id} has an opaque (_pickled) checkpoint and cannot be resumed")));
        }
        Ok(Some(snapshot))
    }

    pub fn list_threads(&self, preset_ref: Option<&str>) -> Vec<ThreadSummary> {
        self.index.lock().list(preset_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_types::transcript::EntryRole;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn append_and_read_back_preserves_order() {
        let (_dir, store) = temp_store();
        for i in 0..5 {
            let entry = TranscriptEntry::new(i, "agent-1", EntryRole::Agent, format!("msg {i}"));
            store.append_transcript("t1", "preset-a", &entry).unwrap();
        }
        let got = store.read_transcript("t1", 0, None).unwrap();
        assert_eq!(got.len(), 5);
        for (i, e) in got.iter().enumerate() {
            assert_eq!(e.content, format!("msg {i}"));
        }
    }

    #[test]
    fn read_transcript_respects_offset_and_limit() {
        let (_dir, store) = temp_store();
        for i in 0..10 {
            let entry = TranscriptEntry::new(i, "agent-1", EntryRole::Agent, format!("msg {i}"));
            store.append_transcript("t1", "preset-a", &entry).unwrap();
        }
        let page = store.read_transcript("t1", 3, Some(4)).unwrap();
        assert_eq!(page.len(), 4);
        assert_eq!(page[0].content, "msg 3");
        assert_eq!(page[3].content, "msg 6");
    }

    #[test]
    fn read_transcript_on_unknown_thread_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.read_transcript("nope", 0, None).unwrap().is_empty());
    }

    #[test]
    fn checkpoint_round_trip() {
        let (_dir, store) = temp_store();
        let snap = Snapshot(serde_json::json!({ "iter": 7, "running_summary": "so far..." }));
        store.save_checkpoint("t1", &snap).unwrap();
        let loaded = store.load_checkpoint("t1").unwrap().unwrap();
        assert_eq!(loaded.0["iter"], 7);
    }

    #[test]
    fn missing_checkpoint_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.load_checkpoint("t1").unwrap().is_none());
    }

    #[test]
    fn opaque_checkpoint_is_refused_on_save() {
        let (_dir, store) = temp_store();
        let snap = Snapshot(serde_json::json!({ "_pickled": true, "blob": "xyz" }));
        let err = store.save_checkpoint("t1", &snap).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!store.checkpoint_path("t1").exists());
    }

    #[test]
    fn opaque_checkpoint_is_refused_on_load() {
        let (_dir, store) = temp_store();
        // Bypass save_checkpoint to simulate a blob left by an older writer.
        fs::write(store.checkpoint_path("t1"), r#"{"_pickled": true, "blob": "xyz"}"#).unwrap();
        let err = store.load_checkpoint("t1").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn list_threads_filters_by_preset() {
        let (_dir, store) = temp_store();
        let e = TranscriptEntry::new(0, "a", EntryRole::Agent, "hi");
        store.append_transcript("t1", "preset-a", &e).unwrap();
        store.append_transcript("t2", "preset-b", &e).unwrap();
        let all = store.list_threads(None);
        assert_eq!(all.len(), 2);
        let a_only = store.list_threads(Some("preset-a"));
        assert_eq!(a_only.len(), 1);
        assert_eq!(a_only[0].thread_id, "t1");
    }
}

//! Client-side local store: cached records, the pending queue and the auth token.
//!
//! State lives in memory behind one mutex and is persisted as a single
//! postcard snapshot. It is loaded on first access and written back by
//! [`LocalStore::close`].

use crate::record::Record;
use crate::sync::engine::RecordCache;
use crate::{PassKeepError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LocalState {
    token: String,
    records: HashMap<String, Record>,
    pending: HashMap<String, Record>,
}

pub struct LocalStore {
    path: PathBuf,
    state: Mutex<Option<LocalState>>,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a record and stage it for the next sync.
    pub fn set_record(&self, record: Record) -> Result<()> {
        self.with_state(|state| {
            state
                .pending
                .insert(record.id().to_string(), record.clone());
            state.records.insert(record.id().to_string(), record);
            Ok(())
        })
    }

    pub fn get_record(&self, id: &str) -> Result<Record> {
        self.with_state(|state| {
            state
                .records
                .get(id)
                .cloned()
                .ok_or_else(|| PassKeepError::NotFound(format!("no record with key {:?}", id)))
        })
    }

    pub fn records(&self) -> Result<Vec<Record>> {
        self.with_state(|state| Ok(state.records.values().cloned().collect()))
    }

    /// The stored auth token, empty before the first login.
    pub fn token(&self) -> Result<String> {
        self.with_state(|state| Ok(state.token.clone()))
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        self.with_state(|state| {
            state.token = token.to_string();
            Ok(())
        })
    }

    pub fn items_to_sync(&self) -> Result<Vec<Record>> {
        self.with_state(|state| Ok(state.pending.values().cloned().collect()))
    }

    /// Replace the local record set with the server's and clear the pending queue.
    pub fn sync_records(&self, records: Vec<Record>) -> Result<()> {
        self.with_state(|state| {
            state.records = records
                .into_iter()
                .map(|r| (r.id().to_string(), r))
                .collect();
            state.pending.clear();
            Ok(())
        })
    }

    /// Persist the snapshot. Does nothing if the state was never loaded.
    pub fn close(&self) -> Result<()> {
        let guard = self.lock()?;
        let Some(state) = guard.as_ref() else {
            return Ok(());
        };

        let bytes = postcard::to_allocvec(state)
            .map_err(|e| PassKeepError::Snapshot(format!("encode: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            records = state.records.len(),
            pending = state.pending.len(),
            "local state saved"
        );
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<LocalState>>> {
        self.state
            .lock()
            .map_err(|e| PassKeepError::LockPoisoned(e.to_string()))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LocalState) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        match guard.as_mut() {
            Some(state) => f(state),
            None => Err(PassKeepError::Snapshot("state not loaded".to_string())),
        }
    }

    fn load(&self) -> Result<LocalState> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no local state, starting empty");
                return Ok(LocalState::default());
            }
            Err(e) => return Err(e.into()),
        };

        postcard::from_bytes(&bytes).map_err(|e| {
            PassKeepError::Snapshot(format!("decode {}: {}", self.path.display(), e))
        })
    }
}

impl RecordCache for LocalStore {
    fn set_record(&self, record: Record) -> Result<()> {
        LocalStore::set_record(self, record)
    }

    fn get_record(&self, id: &str) -> Result<Record> {
        LocalStore::get_record(self, id)
    }

    fn records(&self) -> Result<Vec<Record>> {
        LocalStore::records(self)
    }

    fn token(&self) -> Result<String> {
        LocalStore::token(self)
    }

    fn set_token(&self, token: &str) -> Result<()> {
        LocalStore::set_token(self, token)
    }

    fn items_to_sync(&self) -> Result<Vec<Record>> {
        LocalStore::items_to_sync(self)
    }

    fn sync_records(&self, records: Vec<Record>) -> Result<()> {
        LocalStore::sync_records(self, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> LocalStore {
        LocalStore::new(dir.path().join("nested").join("state.bin"))
    }

    #[test]
    fn missing_snapshot_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        assert_eq!(store.token().unwrap(), "");
        assert!(store.records().unwrap().is_empty());
        assert!(store.items_to_sync().unwrap().is_empty());
    }

    #[test]
    fn set_record_stages_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.set_record(Record::text("note", "first").unwrap()).unwrap();
        let second = Record::text("note", "second").unwrap();
        store.set_record(second.clone()).unwrap();

        assert_eq!(store.get_record("note").unwrap(), second);
        assert_eq!(store.items_to_sync().unwrap(), vec![second]);
    }

    #[test]
    fn get_missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store(&dir).get_record("nope"),
            Err(PassKeepError::NotFound(_))
        ));
    }

    #[test]
    fn sync_records_replaces_and_clears_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.set_record(Record::text("local", "x").unwrap()).unwrap();

        let server = Record::credential("alice", "pw").unwrap();
        store.sync_records(vec![server.clone()]).unwrap();

        assert_eq!(store.records().unwrap(), vec![server]);
        assert!(store.items_to_sync().unwrap().is_empty());
        assert!(store.get_record("local").is_err());
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let card = Record::payment_card("4111111111111111", 12, 31, 7).unwrap();
        let blob = Record::binary("key.bin", vec![0, 1, 2, 255]).unwrap();
        {
            let store = store(&dir);
            store.set_token("tok").unwrap();
            store.sync_records(vec![card.clone()]).unwrap();
            store.set_record(blob.clone()).unwrap();
            store.close().unwrap();
        }

        let reopened = store(&dir);
        assert_eq!(reopened.token().unwrap(), "tok");
        assert_eq!(reopened.get_record("4111111111111111").unwrap(), card);
        assert_eq!(reopened.get_record("key.bin").unwrap(), blob);
        assert_eq!(reopened.items_to_sync().unwrap(), vec![blob]);
    }

    #[test]
    fn close_without_load_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.close().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        std::fs::write(&path, [0xff; 3]).unwrap();

        let store = LocalStore::new(&path);
        assert!(matches!(store.token(), Err(PassKeepError::Snapshot(_))));
    }
}

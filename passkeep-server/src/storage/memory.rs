//! In-memory record and user stores.

use super::{poisoned, MergeSummary, RecordStore, StoreError};
use crate::auth::{User, UserStore};
use async_trait::async_trait;
use passkeep_core::{ConflictResolver, Record, Resolution};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, Span};

type Partition = Arc<Mutex<HashMap<String, Record>>>;

/// Records held in process memory, one locked map per user.
pub struct MemoryRecordStore {
    partitions: RwLock<HashMap<String, Partition>>,
    span: Span,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            span: tracing::info_span!("memory_record_store"),
        }
    }

    /// Get `login`'s partition, creating it on first access.
    fn partition(&self, login: &str) -> Result<Partition, StoreError> {
        {
            let partitions = self.partitions.read().map_err(poisoned)?;
            if let Some(partition) = partitions.get(login) {
                return Ok(partition.clone());
            }
        }

        let mut partitions = self.partitions.write().map_err(poisoned)?;
        Ok(partitions.entry(login.to_string()).or_default().clone())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn add_records(
        &self,
        login: &str,
        records: Vec<Record>,
    ) -> Result<MergeSummary, StoreError> {
        let partition = self.partition(login)?;
        let mut stored = partition.lock().map_err(poisoned)?;

        let mut summary = MergeSummary::default();
        for record in records {
            match ConflictResolver::resolve_records(stored.get(record.id()), &record) {
                Resolution::AcceptIncoming => {
                    stored.insert(record.id().to_string(), record);
                    summary.accepted += 1;
                }
                Resolution::KeepExisting => summary.stale += 1,
            }
        }

        debug!(
            parent: &self.span,
            login,
            accepted = summary.accepted,
            stale = summary.stale,
            "records merged"
        );
        Ok(summary)
    }

    async fn all_records(&self, login: &str) -> Result<Vec<Record>, StoreError> {
        let partition = self.partition(login)?;
        let stored = partition.lock().map_err(poisoned)?;
        Ok(stored.values().cloned().collect())
    }
}

/// Users held in process memory.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn add_new_user(&self, login: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.contains_key(login) {
            return Err(StoreError::LoginTaken(login.to_string()));
        }

        users.insert(
            login.to_string(),
            User {
                login: login.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(())
    }

    async fn get_user(&self, login: &str) -> Result<User, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        users
            .get(login)
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(login.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn note(key: &str, body: &str, secs: i64) -> Record {
        Record::text(key, body).unwrap().with_last_update_date(at(secs))
    }

    fn sorted(mut records: Vec<Record>) -> Vec<Record> {
        records.sort_by(|a, b| a.id().cmp(b.id()));
        records
    }

    #[tokio::test]
    async fn unknown_login_has_no_records() {
        let store = MemoryRecordStore::new();
        assert!(store.all_records("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_is_idempotent() {
        let store = MemoryRecordStore::new();
        let batch = vec![note("a", "1", 1), note("b", "2", 2)];

        let first = store.add_records("alice", batch.clone()).await.unwrap();
        let after_first = sorted(store.all_records("alice").await.unwrap());
        let second = store.add_records("alice", batch.clone()).await.unwrap();
        let after_second = sorted(store.all_records("alice").await.unwrap());

        assert_eq!(first, MergeSummary { accepted: 2, stale: 0 });
        assert_eq!(second, MergeSummary { accepted: 0, stale: 2 });
        assert_eq!(after_first, after_second);
        assert_eq!(after_second, batch);
    }

    #[tokio::test]
    async fn older_write_never_replaces_newer() {
        let store = MemoryRecordStore::new();
        store.add_records("alice", vec![note("a", "new", 10)]).await.unwrap();

        let summary = store
            .add_records("alice", vec![note("a", "old", 5), note("a", "tie", 10)])
            .await
            .unwrap();

        assert_eq!(summary, MergeSummary { accepted: 0, stale: 2 });
        assert_eq!(
            store.all_records("alice").await.unwrap(),
            vec![note("a", "new", 10)]
        );
    }

    #[tokio::test]
    async fn newer_write_replaces_even_across_kinds() {
        let store = MemoryRecordStore::new();
        store.add_records("alice", vec![note("k", "text", 1)]).await.unwrap();

        let blob = Record::binary("k", vec![9, 9]).unwrap().with_last_update_date(at(2));
        store.add_records("alice", vec![blob.clone()]).await.unwrap();

        assert_eq!(store.all_records("alice").await.unwrap(), vec![blob]);
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let store = MemoryRecordStore::new();
        store.add_records("alice", vec![note("a", "alice", 1)]).await.unwrap();
        store.add_records("bob", vec![note("a", "bob", 1)]).await.unwrap();

        assert_eq!(
            store.all_records("alice").await.unwrap(),
            vec![note("a", "alice", 1)]
        );
        assert_eq!(
            store.all_records("bob").await.unwrap(),
            vec![note("a", "bob", 1)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pushes_lose_no_update() {
        let store = Arc::new(MemoryRecordStore::new());

        let mut handles = Vec::new();
        for i in 0..16i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let batch = vec![note(&format!("own-{}", i), "x", 1), note("shared", "v", i)];
                store.add_records("alice", batch).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = store.all_records("alice").await.unwrap();
        assert_eq!(records.len(), 17);
        let shared = records.iter().find(|r| r.id() == "shared").unwrap();
        assert_eq!(shared.last_update_date(), at(15));
    }

    #[tokio::test]
    async fn duplicate_login_rejected() {
        let users = MemoryUserStore::new();
        users.add_new_user("alice", "hash-1").await.unwrap();

        let err = users.add_new_user("alice", "hash-2").await.unwrap_err();
        assert!(matches!(err, StoreError::LoginTaken(_)));
        assert_eq!(users.get_user("alice").await.unwrap().password_hash, "hash-1");
    }

    #[tokio::test]
    async fn unknown_user_not_found() {
        let users = MemoryUserStore::new();
        assert!(matches!(
            users.get_user("ghost").await,
            Err(StoreError::UserNotFound(_))
        ));
    }
}

//! SQLite storage backend.
//!
//! One table per record kind plus a `users` table. Record rows reference
//! their owner's row in `users`. Writes go through a single writer connection inside an `IMMEDIATE`
//! transaction; reads open their own read-only connections so they never
//! queue behind the writer mutex (the database runs in WAL mode).

use super::{poisoned, MergeSummary, RecordStore, StoreError};
use crate::auth::{User, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use passkeep_core::{ConflictResolver, PaymentCard, Record, RecordKind, Resolution, Secret};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, Span};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        login TEXT PRIMARY KEY,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS credential_records (
        owner_login TEXT NOT NULL,
        id TEXT NOT NULL,
        last_update_date TEXT NOT NULL,
        login TEXT NOT NULL,
        secret TEXT NOT NULL,
        PRIMARY KEY (owner_login, id),
        FOREIGN KEY (owner_login) REFERENCES users(login)
    );

    CREATE TABLE IF NOT EXISTS text_records (
        owner_login TEXT NOT NULL,
        id TEXT NOT NULL,
        last_update_date TEXT NOT NULL,
        body TEXT NOT NULL,
        PRIMARY KEY (owner_login, id),
        FOREIGN KEY (owner_login) REFERENCES users(login)
    );

    CREATE TABLE IF NOT EXISTS binary_records (
        owner_login TEXT NOT NULL,
        id TEXT NOT NULL,
        last_update_date TEXT NOT NULL,
        payload BLOB NOT NULL,
        PRIMARY KEY (owner_login, id),
        FOREIGN KEY (owner_login) REFERENCES users(login)
    );

    CREATE TABLE IF NOT EXISTS payment_card_records (
        owner_login TEXT NOT NULL,
        id TEXT NOT NULL,
        last_update_date TEXT NOT NULL,
        number TEXT NOT NULL,
        expiry_month INTEGER NOT NULL,
        expiry_day INTEGER NOT NULL,
        security_code INTEGER NOT NULL,
        PRIMARY KEY (owner_login, id),
        FOREIGN KEY (owner_login) REFERENCES users(login)
    );";

/// SQLite-backed record and user store.
#[derive(Clone)]
pub struct SqliteStore {
    path: PathBuf,
    writer: Arc<Mutex<Connection>>,
    span: Span,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Corrupt(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;

        let span = tracing::info_span!("sqlite_store", path = %path.display());
        info!(parent: &span, journal_mode = %mode, "database opened");

        Ok(Self {
            path: path.to_path_buf(),
            writer: Arc::new(Mutex::new(conn)),
            span,
        })
    }

    fn reader(path: &Path) -> Result<Connection, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn add_records(
        &self,
        login: &str,
        records: Vec<Record>,
    ) -> Result<MergeSummary, StoreError> {
        let writer = self.writer.clone();
        let owner = login.to_string();

        let summary = tokio::task::spawn_blocking(move || -> Result<MergeSummary, StoreError> {
            let mut conn = writer.lock().map_err(poisoned)?;
            merge_batch(&mut conn, &owner, &records)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

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
        let reads = RecordKind::ALL.into_iter().map(|kind| {
            let path = self.path.clone();
            let owner = login.to_string();
            tokio::task::spawn_blocking(move || read_table(&path, kind, &owner))
        });

        let tables = futures::future::try_join_all(reads)
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?;

        let mut records = Vec::new();
        for table in tables {
            records.extend(table?);
        }
        Ok(records)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn add_new_user(&self, login: &str, password_hash: &str) -> Result<(), StoreError> {
        let writer = self.writer.clone();
        let login = login.to_string();
        let password_hash = password_hash.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = writer.lock().map_err(poisoned)?;
            let created_at = encode_timestamp(Utc::now());
            let inserted = conn.execute(
                "INSERT INTO users (login, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![login, password_hash, created_at],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::LoginTaken(login))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn get_user(&self, login: &str) -> Result<User, StoreError> {
        let path = self.path.clone();
        let login = login.to_string();

        tokio::task::spawn_blocking(move || -> Result<User, StoreError> {
            let conn = Self::reader(&path)?;
            let user = conn
                .query_row(
                    "SELECT login, password_hash FROM users WHERE login = ?1",
                    [&login],
                    |row| {
                        Ok(User {
                            login: row.get(0)?,
                            password_hash: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            user.ok_or(StoreError::UserNotFound(login))
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Merge one batch in a single transaction. Any error drops the transaction,
/// which rolls back every write the batch made so far.
fn merge_batch(
    conn: &mut Connection,
    owner: &str,
    records: &[Record],
) -> Result<MergeSummary, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut summary = MergeSummary::default();
    for record in records {
        let stored = stored_version(&tx, owner, record.id())?;
        match ConflictResolver::resolve(stored.map(|(_, ts)| ts), record.last_update_date()) {
            Resolution::AcceptIncoming => {
                // Ids are unique per owner across kinds; a kind change moves the row.
                if let Some((kind, _)) = stored {
                    if kind != record.kind() {
                        tx.execute(
                            &format!(
                                "DELETE FROM {} WHERE owner_login = ?1 AND id = ?2",
                                table(kind)
                            ),
                            params![owner, record.id()],
                        )?;
                    }
                }
                upsert(&tx, owner, record)?;
                summary.accepted += 1;
            }
            Resolution::KeepExisting => summary.stale += 1,
        }
    }

    tx.commit()?;
    Ok(summary)
}

fn stored_version(
    conn: &Connection,
    owner: &str,
    id: &str,
) -> Result<Option<(RecordKind, DateTime<Utc>)>, StoreError> {
    for kind in RecordKind::ALL {
        let found: Option<String> = conn
            .query_row(
                &format!(
                    "SELECT last_update_date FROM {} WHERE owner_login = ?1 AND id = ?2",
                    table(kind)
                ),
                params![owner, id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(ts) = found {
            return Ok(Some((kind, decode_timestamp(&ts)?)));
        }
    }
    Ok(None)
}

fn upsert(conn: &Connection, owner: &str, record: &Record) -> Result<(), StoreError> {
    let ts = encode_timestamp(record.last_update_date());
    let id = record.id();

    match record.secret() {
        Secret::Credential { login, secret } => conn.execute(
            "INSERT INTO credential_records (owner_login, id, last_update_date, login, secret)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(owner_login, id) DO UPDATE SET
                last_update_date = excluded.last_update_date,
                login = excluded.login,
                secret = excluded.secret",
            params![owner, id, ts, login, secret],
        )?,
        Secret::Text { text } => conn.execute(
            "INSERT INTO text_records (owner_login, id, last_update_date, body)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner_login, id) DO UPDATE SET
                last_update_date = excluded.last_update_date,
                body = excluded.body",
            params![owner, id, ts, text],
        )?,
        Secret::Binary { payload } => conn.execute(
            "INSERT INTO binary_records (owner_login, id, last_update_date, payload)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner_login, id) DO UPDATE SET
                last_update_date = excluded.last_update_date,
                payload = excluded.payload",
            params![owner, id, ts, payload],
        )?,
        Secret::PaymentCard(card) => conn.execute(
            "INSERT INTO payment_card_records
                (owner_login, id, last_update_date, number, expiry_month, expiry_day, security_code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(owner_login, id) DO UPDATE SET
                last_update_date = excluded.last_update_date,
                number = excluded.number,
                expiry_month = excluded.expiry_month,
                expiry_day = excluded.expiry_day,
                security_code = excluded.security_code",
            params![
                owner,
                id,
                ts,
                card.number,
                card.expiry_month,
                card.expiry_day,
                card.security_code
            ],
        )?,
    };
    Ok(())
}

fn read_table(path: &Path, kind: RecordKind, owner: &str) -> Result<Vec<Record>, StoreError> {
    let conn = SqliteStore::reader(path)?;
    let columns = match kind {
        RecordKind::Credential => "login, secret",
        RecordKind::Text => "body",
        RecordKind::Binary => "payload",
        RecordKind::PaymentCard => "number, expiry_month, expiry_day, security_code",
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT id, last_update_date, {} FROM {} WHERE owner_login = ?1",
        columns,
        table(kind)
    ))?;
    let rows = stmt.query_map([owner], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, secret_from_row(kind, row)?))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, ts, secret) = row?;
        let record = Record::from_parts(id, decode_timestamp(&ts)?, secret)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

fn secret_from_row(kind: RecordKind, row: &Row<'_>) -> rusqlite::Result<Secret> {
    Ok(match kind {
        RecordKind::Credential => Secret::Credential {
            login: row.get(2)?,
            secret: row.get(3)?,
        },
        RecordKind::Text => Secret::Text { text: row.get(2)? },
        RecordKind::Binary => Secret::Binary {
            payload: row.get(2)?,
        },
        RecordKind::PaymentCard => Secret::PaymentCard(PaymentCard {
            number: row.get(2)?,
            expiry_month: row.get(3)?,
            expiry_day: row.get(4)?,
            security_code: row.get(5)?,
        }),
    })
}

fn table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Credential => "credential_records",
        RecordKind::Text => "text_records",
        RecordKind::Binary => "binary_records",
        RecordKind::PaymentCard => "payment_card_records",
    }
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn open_empty(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::open(&dir.path().join("passkeep.db")).unwrap()
    }

    /// Store with `alice` and `bob` already registered.
    fn open(dir: &tempfile::TempDir) -> SqliteStore {
        let store = open_empty(dir);
        {
            let conn = store.writer.lock().unwrap();
            for login in ["alice", "bob"] {
                conn.execute(
                    "INSERT OR IGNORE INTO users (login, password_hash, created_at)
                     VALUES (?1, 'hash', '1970-01-01T00:00:00Z')",
                    [login],
                )
                .unwrap();
            }
        }
        store
    }

    fn sorted(mut records: Vec<Record>) -> Vec<Record> {
        records.sort_by(|a, b| a.id().cmp(b.id()));
        records
    }

    fn one_of_each(secs: i64) -> Vec<Record> {
        vec![
            Record::credential("alice", "hunter2").unwrap(),
            Record::text("note", "multi\nline").unwrap(),
            Record::binary("blob", vec![0, 159, 146, 150]).unwrap(),
            Record::payment_card("4111111111111111", 12, 31, 999).unwrap(),
        ]
        .into_iter()
        .map(|r| r.with_last_update_date(at(secs)))
        .collect()
    }

    #[tokio::test]
    async fn every_kind_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let mut records = one_of_each(1);
        // Nanoseconds must survive the text encoding.
        records[1] = records[1]
            .clone()
            .with_last_update_date(Utc.timestamp_opt(1, 123_456_789).unwrap());

        let summary = store.add_records("alice", records.clone()).await.unwrap();

        assert_eq!(summary, MergeSummary { accepted: 4, stale: 0 });
        assert_eq!(
            sorted(store.all_records("alice").await.unwrap()),
            sorted(records)
        );
    }

    #[tokio::test]
    async fn merge_is_idempotent_and_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let newer = one_of_each(10);
        store.add_records("alice", newer.clone()).await.unwrap();

        let again = store.add_records("alice", newer.clone()).await.unwrap();
        let older = store.add_records("alice", one_of_each(5)).await.unwrap();

        assert_eq!(again, MergeSummary { accepted: 0, stale: 4 });
        assert_eq!(older, MergeSummary { accepted: 0, stale: 4 });
        assert_eq!(
            sorted(store.all_records("alice").await.unwrap()),
            sorted(newer)
        );
    }

    #[tokio::test]
    async fn newer_record_replaces_stored_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store
            .add_records(
                "alice",
                vec![Record::text("note", "old").unwrap().with_last_update_date(at(1))],
            )
            .await
            .unwrap();

        let update = Record::text("note", "new").unwrap().with_last_update_date(at(2));
        store.add_records("alice", vec![update.clone()]).await.unwrap();

        assert_eq!(store.all_records("alice").await.unwrap(), vec![update]);
    }

    #[tokio::test]
    async fn kind_change_moves_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store
            .add_records(
                "alice",
                vec![Record::text("k", "text").unwrap().with_last_update_date(at(1))],
            )
            .await
            .unwrap();

        let blob = Record::binary("k", vec![1]).unwrap().with_last_update_date(at(2));
        store.add_records("alice", vec![blob.clone()]).await.unwrap();

        assert_eq!(store.all_records("alice").await.unwrap(), vec![blob]);
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let alice = Record::text("shared-id", "alice").unwrap();
        let bob = Record::text("shared-id", "bob").unwrap();

        store.add_records("alice", vec![alice.clone()]).await.unwrap();
        store.add_records("bob", vec![bob.clone()]).await.unwrap();

        assert_eq!(store.all_records("alice").await.unwrap(), vec![alice]);
        assert_eq!(store.all_records("bob").await.unwrap(), vec![bob]);
        assert!(store.all_records("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_write_rolls_back_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passkeep.db");
        let store = open(&dir);

        // Make any card insert fail from inside the transaction.
        let side = Connection::open(&path).unwrap();
        side.execute_batch(
            "CREATE TRIGGER refuse_cards BEFORE INSERT ON payment_card_records
             BEGIN SELECT RAISE(ABORT, 'refused'); END;",
        )
        .unwrap();
        drop(side);

        let batch = vec![
            Record::text("note", "body").unwrap(),
            Record::payment_card("4111", 1, 1, 1).unwrap(),
        ];
        assert!(store.add_records("alice", batch).await.is_err());
        assert!(store.all_records("alice").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pushes_lose_no_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        let mut handles = Vec::new();
        for i in 0..8i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let batch = vec![
                    Record::text(format!("own-{}", i), "x").unwrap(),
                    Record::text("shared", "v").unwrap().with_last_update_date(at(i)),
                ];
                store.add_records("alice", batch).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = store.all_records("alice").await.unwrap();
        assert_eq!(records.len(), 9);
        let shared = records.iter().find(|r| r.id() == "shared").unwrap();
        assert_eq!(shared.last_update_date(), at(7));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let records = one_of_each(3);
        {
            let store = open_empty(&dir);
            store.add_new_user("alice", "$argon2id$hash").await.unwrap();
            store.add_records("alice", records.clone()).await.unwrap();
        }

        let store = open_empty(&dir);
        assert_eq!(
            sorted(store.all_records("alice").await.unwrap()),
            sorted(records)
        );
        assert_eq!(
            store.get_user("alice").await.unwrap().password_hash,
            "$argon2id$hash"
        );
    }

    #[tokio::test]
    async fn users_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_empty(&dir);
        store.add_new_user("alice", "h1").await.unwrap();

        assert!(matches!(
            store.add_new_user("alice", "h2").await,
            Err(StoreError::LoginTaken(_))
        ));
        assert!(matches!(
            store.get_user("bob").await,
            Err(StoreError::UserNotFound(_))
        ));
        assert_eq!(store.get_user("alice").await.unwrap().password_hash, "h1");
    }

    #[tokio::test]
    async fn records_need_a_registered_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        let batch = vec![Record::text("note", "body").unwrap()];
        assert!(matches!(
            store.add_records("mallory", batch).await,
            Err(StoreError::Sqlite(_))
        ));
        assert!(store.all_records("mallory").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_table_fails_the_whole_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store.add_records("alice", one_of_each(1)).await.unwrap();

        let side = Connection::open(dir.path().join("passkeep.db")).unwrap();
        side.execute_batch("DROP TABLE binary_records;").unwrap();
        drop(side);

        assert!(store.all_records("alice").await.is_err());
    }
}

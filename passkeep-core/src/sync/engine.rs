//! Sync engine: orchestrates the push-then-pull round with the server.

use crate::record::Record;
use crate::sync::models::{AddRecordsResponse, WireRecord};
use crate::{PassKeepError, Result};
use async_trait::async_trait;
use tracing::{debug, info, Span};

/// Local side of the sync: the client's cached records, pending queue and token.
pub trait RecordCache: Send + Sync {
    fn set_record(&self, record: Record) -> Result<()>;
    fn get_record(&self, id: &str) -> Result<Record>;
    fn records(&self) -> Result<Vec<Record>>;
    fn token(&self) -> Result<String>;
    fn set_token(&self, token: &str) -> Result<()>;
    fn items_to_sync(&self) -> Result<Vec<Record>>;
    /// Replace every cached record with `records` and clear the pending queue.
    fn sync_records(&self, records: Vec<Record>) -> Result<()>;
}

/// Remote side of the sync: the server's auth and record calls.
#[async_trait]
pub trait VaultRemote: Send + Sync {
    async fn sign_up(&self, login: &str, password: &str) -> Result<String>;
    async fn sign_in(&self, login: &str, password: &str) -> Result<String>;
    async fn add_records(&self, token: &str, records: Vec<WireRecord>)
        -> Result<AddRecordsResponse>;
    async fn all_records(&self, token: &str) -> Result<Vec<WireRecord>>;
}

/// Outcome of one sync round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pushed: usize,
    pub pulled: usize,
}

/// Client service: local record operations plus sync with the server.
pub struct SyncEngine<C, R> {
    cache: C,
    remote: R,
    span: Span,
}

impl<C: RecordCache, R: VaultRemote> SyncEngine<C, R> {
    pub fn new(cache: C, remote: R) -> Self {
        Self {
            cache,
            remote,
            span: tracing::info_span!("sync_engine"),
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Store a record locally and stage it for the next sync.
    pub fn set_record(&self, record: Record) -> Result<()> {
        debug!(parent: &self.span, id = record.id(), kind = %record.kind(), "record staged");
        self.cache.set_record(record)
    }

    pub fn get_record(&self, id: &str) -> Result<Record> {
        self.cache.get_record(id)
    }

    /// All locally known records, ordered by id.
    pub fn list_records(&self) -> Result<Vec<Record>> {
        let mut records = self.cache.records()?;
        records.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(records)
    }

    /// Create an account on the server and keep the issued token.
    pub async fn register_user(&self, login: &str, password: &str) -> Result<()> {
        validate_credentials(login, password)?;
        let token = self.remote.sign_up(login, password).await?;
        self.cache.set_token(&token)?;
        info!(parent: &self.span, login, "user registered");
        Ok(())
    }

    /// Sign in to an existing account and keep the issued token.
    pub async fn login_user(&self, login: &str, password: &str) -> Result<()> {
        validate_credentials(login, password)?;
        let token = self.remote.sign_in(login, password).await?;
        self.cache.set_token(&token)?;
        info!(parent: &self.span, login, "user signed in");
        Ok(())
    }

    /// Run one sync round: push pending records, pull the server's full set,
    /// replace the local snapshot with it.
    ///
    /// A failure at any step leaves the pending queue as it was, so the next
    /// round pushes the same records again. The server's merge is LWW by
    /// timestamp, which makes the replay harmless.
    pub async fn sync(&self) -> Result<SyncReport> {
        let token = self.cache.token()?;
        if token.is_empty() {
            return Err(PassKeepError::NotSignedIn);
        }

        let pending = self.cache.items_to_sync()?;
        let pushed = pending.len();
        if !pending.is_empty() {
            let wire = pending.iter().map(Record::to_wire).collect();
            let resp = self.remote.add_records(&token, wire).await?;
            debug!(
                parent: &self.span,
                accepted = resp.accepted,
                stale = resp.stale,
                "pending records pushed"
            );
        }

        let records = self
            .remote
            .all_records(&token)
            .await?
            .into_iter()
            .map(Record::from_wire)
            .collect::<Result<Vec<_>>>()?;
        let pulled = records.len();

        self.cache.sync_records(records)?;
        info!(parent: &self.span, pushed, pulled, "sync complete");

        Ok(SyncReport { pushed, pulled })
    }
}

fn validate_credentials(login: &str, password: &str) -> Result<()> {
    if login.is_empty() {
        return Err(PassKeepError::InvalidInput("login is empty".to_string()));
    }
    if password.is_empty() {
        return Err(PassKeepError::InvalidInput("password is empty".to_string()));
    }
    Ok(())
}

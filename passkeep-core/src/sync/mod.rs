//! Record synchronization between the client cache and the server.
//!
//! - Last-write-wins conflict resolution keyed on `last_update_date`
//! - JSON wire models shared with the server
//! - Bearer token header helpers
//! - HTTP client (feature `sync`) and the push-then-pull sync engine

pub mod auth;
#[cfg(feature = "sync")]
pub mod client;
pub mod conflict;
pub mod engine;
pub mod models;

#[cfg(feature = "sync")]
pub use client::SyncClient;
pub use conflict::ConflictResolver;
pub use engine::{RecordCache, SyncEngine, SyncReport, VaultRemote};
pub use models::{AddRecordsResponse, WireRecord, WireVariant};

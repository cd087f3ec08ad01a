//! passkeep core library
//!
//! Shared by the server and the command line client:
//! - the record model and its wire form
//! - last-write-wins conflict resolution
//! - the client-side local store (records, pending queue, auth token)
//! - the sync engine, and the HTTP client it drives (feature `sync`)

pub mod config;
pub mod local_store;
pub mod platform;
pub mod record;
pub mod sync;

pub use config::ClientConfig;
pub use local_store::LocalStore;
pub use platform::{get_config_dir, get_data_dir, get_default_config_path, get_default_state_path};
pub use record::{PaymentCard, Record, RecordKind, Secret};
pub use sync::conflict::{ConflictResolver, Resolution};
pub use sync::models::{WireRecord, WireVariant};

use thiserror::Error;

/// Result type for passkeep operations
pub type Result<T> = std::result::Result<T, PassKeepError>;

/// General error type for passkeep operations
#[derive(Error, Debug)]
pub enum PassKeepError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("user is not signed in, use `passkeep login` first")]
    NotSignedIn,

    #[error("Record {0:?} carries no known variant")]
    UnknownRecordVariant(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Server error {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Failed to {operation}: {message}")]
    Transport { operation: String, message: String },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

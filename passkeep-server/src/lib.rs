//! passkeep sync server
//!
//! Holds every user's records in a partition keyed by login and merges
//! pushes with last-write-wins on `last_update_date`. Clients authenticate
//! with an HS256 bearer token issued at sign up / sign in.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod storage;

pub use config::{Backend, ServerConfig};
pub use server::{build_router, AppState};

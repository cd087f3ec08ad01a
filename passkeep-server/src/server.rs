//! Axum router setup.

use crate::auth::{auth_middleware, AuthService, TokenCodec, UserStore};
use crate::config::{Backend, ServerConfig};
use crate::handlers::{auth, records};
use crate::storage::{MemoryRecordStore, MemoryUserStore, RecordStore, SqliteStore};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub records: Arc<dyn RecordStore>,
}

impl AppState {
    /// Build the stores named by `config.backend` and the auth service on top.
    pub fn open(config: &ServerConfig) -> anyhow::Result<Self> {
        let (records, users) = match config.backend {
            Backend::Memory => {
                let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
                let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
                (records, users)
            }
            Backend::Sqlite => {
                let store = Arc::new(SqliteStore::open(&config.storage_path)?);
                let records: Arc<dyn RecordStore> = store.clone();
                let users: Arc<dyn UserStore> = store;
                (records, users)
            }
        };
        tracing::info!(backend = ?config.backend, "storage ready");

        let tokens = TokenCodec::new(config.token_secret.as_bytes().to_vec());
        Ok(Self {
            auth: Arc::new(AuthService::new(users, tokens)),
            records,
        })
    }
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    // Authenticated routes
    let authenticated = Router::new()
        .route(
            "/api/v1/records",
            post(records::add_records).get(records::all_records),
        )
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ));

    // Unauthenticated routes
    let public = Router::new()
        .route("/api/v1/auth/signup", post(auth::sign_up))
        .route("/api/v1/auth/signin", post(auth::sign_in))
        .route("/health", get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_payload_size))
        .layer(RequestBodyLimitLayer::new(config.max_payload_size))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

//! Authentication gate: account creation, sign in, token resolution.

pub mod middleware;
pub mod password;
pub mod token;

use crate::storage::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn, Span};

pub use middleware::auth_middleware;
pub use token::TokenCodec;

/// An account known to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub login: String,
    /// Argon2id PHC string.
    pub password_hash: String,
}

/// User persistence as seen by the auth gate.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::LoginTaken`] if the login exists.
    async fn add_new_user(&self, login: &str, password_hash: &str) -> Result<(), StoreError>;
    /// Fails with [`StoreError::UserNotFound`] if the login is unknown.
    async fn get_user(&self, login: &str) -> Result<User, StoreError>;
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("invalid login or password")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("login is busy")]
    LoginBusy,

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenCodec,
    span: Span,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenCodec) -> Self {
        Self {
            users,
            tokens,
            span: tracing::info_span!("auth"),
        }
    }

    /// Create an account and return a token for it.
    ///
    /// Any store failure, including a taken login, is reported as
    /// [`AuthError::LoginBusy`]; the cause is only logged.
    pub async fn sign_up(&self, login: &str, password: &str) -> Result<String, AuthError> {
        validate(login, password)?;

        let hash = password::hash_password(password).await?;
        if let Err(e) = self.users.add_new_user(login, &hash).await {
            warn!(parent: &self.span, login, error = %e, "sign up failed");
            return Err(AuthError::LoginBusy);
        }

        let token = self.tokens.issue(login)?;
        info!(parent: &self.span, login, "user signed up");
        Ok(token)
    }

    /// Check credentials and return a fresh token.
    pub async fn sign_in(&self, login: &str, password: &str) -> Result<String, AuthError> {
        validate(login, password)?;

        let user = match self.users.get_user(login).await {
            Ok(user) => user,
            Err(StoreError::UserNotFound(_)) => {
                info!(parent: &self.span, login, "sign in for unknown user");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                warn!(parent: &self.span, login, error = %e, "user lookup failed");
                return Err(AuthError::Internal(e.to_string()));
            }
        };

        if !password::verify_password(password, &user.password_hash).await? {
            info!(parent: &self.span, login, "sign in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(login)?;
        info!(parent: &self.span, login, "user signed in");
        Ok(token)
    }

    /// Resolve a bearer token to the user it was issued for.
    pub async fn authenticate_user(&self, token: &str) -> Result<User, AuthError> {
        let login = self.tokens.verify(token)?;
        match self.users.get_user(&login).await {
            Ok(user) => Ok(user),
            Err(StoreError::UserNotFound(_)) => {
                Err(AuthError::InvalidToken("unknown user".to_string()))
            }
            Err(e) => {
                warn!(parent: &self.span, login, error = %e, "user lookup failed");
                Err(AuthError::Internal(e.to_string()))
            }
        }
    }
}

fn validate(login: &str, password: &str) -> Result<(), AuthError> {
    if login.is_empty() {
        return Err(AuthError::InvalidArgument("login should not be empty".to_string()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidArgument(
            "password should not be empty".to_string(),
        ));
    }
    Ok(())
}

//! HTTP sync client for communicating with the passkeep server.

use crate::config::ClientConfig;
use crate::sync::auth::{format_bearer, AUTHORIZATION};
use crate::sync::engine::VaultRemote;
use crate::sync::models::{
    AddRecordsRequest, AddRecordsResponse, AllRecordsResponse, CredentialsRequest, ErrorBody,
    TokenResponse, WireRecord,
};
use crate::{PassKeepError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client for the passkeep server.
pub struct SyncClient {
    client: reqwest::Client,
    server_url: String,
    auth_timeout: Duration,
    sync_timeout: Duration,
}

impl SyncClient {
    /// Create a new sync client.
    pub fn new(server_url: &str, auth_timeout: Duration, sync_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| transport("build HTTP client", e))?;

        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            auth_timeout,
            sync_timeout,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            &config.server_url,
            Duration::from_secs(config.auth_timeout_secs),
            Duration::from_secs(config.sync_timeout_secs),
        )
    }

    async fn post<B, T>(
        &self,
        operation: &str,
        path: &str,
        token: Option<&str>,
        body: &B,
        timeout: Duration,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.server_url, path);
        let mut request = self.client.post(&url).timeout(timeout).json(body);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format_bearer(token));
        }

        let resp = request.send().await.map_err(|e| transport(operation, e))?;
        read_response(operation, resp).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<T> {
        let url = format!("{}{}", self.server_url, path);
        let resp = self
            .client
            .get(&url)
            .timeout(timeout)
            .header(AUTHORIZATION, format_bearer(token))
            .send()
            .await
            .map_err(|e| transport(operation, e))?;

        read_response(operation, resp).await
    }
}

#[async_trait]
impl VaultRemote for SyncClient {
    async fn sign_up(&self, login: &str, password: &str) -> Result<String> {
        let body = CredentialsRequest {
            login: login.to_string(),
            password: password.to_string(),
        };
        let resp: TokenResponse = self
            .post("sign up", "/api/v1/auth/signup", None, &body, self.auth_timeout)
            .await?;
        Ok(resp.token)
    }

    async fn sign_in(&self, login: &str, password: &str) -> Result<String> {
        let body = CredentialsRequest {
            login: login.to_string(),
            password: password.to_string(),
        };
        let resp: TokenResponse = self
            .post("sign in", "/api/v1/auth/signin", None, &body, self.auth_timeout)
            .await?;
        Ok(resp.token)
    }

    async fn add_records(
        &self,
        token: &str,
        records: Vec<WireRecord>,
    ) -> Result<AddRecordsResponse> {
        let body = AddRecordsRequest { records };
        self.post(
            "push records",
            "/api/v1/records",
            Some(token),
            &body,
            self.sync_timeout,
        )
        .await
    }

    async fn all_records(&self, token: &str) -> Result<Vec<WireRecord>> {
        let resp: AllRecordsResponse = self
            .get("pull records", "/api/v1/records", token, self.sync_timeout)
            .await?;
        Ok(resp.records)
    }
}

async fn read_response<T: DeserializeOwned>(operation: &str, resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };

        if status == StatusCode::UNAUTHORIZED {
            return Err(PassKeepError::Unauthenticated(message));
        }
        return Err(PassKeepError::Remote {
            status: status.as_u16(),
            message,
        });
    }

    resp.json::<T>()
        .await
        .map_err(|e| transport(operation, format!("invalid response: {}", e)))
}

fn transport(operation: &str, err: impl std::fmt::Display) -> PassKeepError {
    PassKeepError::Transport {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

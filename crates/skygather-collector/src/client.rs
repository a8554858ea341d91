//! Authenticated Bluesky XRPC client.
//!
//! Thin wrapper over `reqwest` that owns the session token and routes every
//! GET through [`retry_with_backoff`]. App-password login happens once per
//! run; token refresh is out of scope because collection sessions are short
//! relative to access-token lifetime.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use skygather_core::AppConfig;

use crate::backoff::retry_with_backoff;
use crate::error::CollectError;
use crate::profile::ProfileSource;
use crate::search::SearchSource;
use crate::types::{ProfileView, SearchPage, SessionTokens};

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const SEARCH_POSTS: &str = "app.bsky.feed.searchPosts";
const GET_PROFILE: &str = "app.bsky.actor.getProfile";

/// Fallback when a 429 arrives without a parseable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

#[derive(Clone)]
pub struct BskyClient {
    http: reqwest::Client,
    service_url: String,
    max_retries: u32,
    backoff_base_ms: u64,
    access_jwt: Option<String>,
}

impl BskyClient {
    /// Builds the HTTP client from app configuration. No network traffic
    /// happens until [`BskyClient::login`].
    pub fn new(config: &AppConfig) -> Result<Self, CollectError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            service_url: config.service_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            backoff_base_ms: config.retry_backoff_base_ms,
            access_jwt: None,
        })
    }

    fn xrpc_url(&self, endpoint: &str) -> String {
        format!("{}/xrpc/{endpoint}", self.service_url)
    }

    /// Create a session with an identifier and app password and keep the
    /// access token for subsequent calls.
    ///
    /// A 400 or 401 from the server means the credentials were rejected and
    /// maps to [`CollectError::Unauthorized`]; it is never retried.
    pub async fn login(
        &mut self,
        identifier: &str,
        app_password: &str,
    ) -> Result<SessionTokens, CollectError> {
        let response = self
            .http
            .post(self.xrpc_url(CREATE_SESSION))
            .json(&serde_json::json!({
                "identifier": identifier,
                "password": app_password,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let detail = response.text().await.unwrap_or_default();
            return Err(CollectError::Unauthorized { detail });
        }
        if !status.is_success() {
            return Err(CollectError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: CREATE_SESSION.to_string(),
            });
        }

        let body = response.text().await?;
        let tokens: SessionTokens =
            serde_json::from_str(&body).map_err(|source| CollectError::Deserialize {
                context: CREATE_SESSION.to_string(),
                source,
            })?;
        self.access_jwt = Some(tokens.access_jwt.clone());
        tracing::info!(handle = %tokens.handle, did = %tokens.did, "authenticated");
        Ok(tokens)
    }

    /// GET an XRPC endpoint with retry on transient failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CollectError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.attempt_get(endpoint, query)
        })
        .await
    }

    async fn attempt_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CollectError> {
        let mut request = self.http.get(self.xrpc_url(endpoint)).query(query);
        if let Some(jwt) = &self.access_jwt {
            request = request.bearer_auth(jwt);
        }
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(CollectError::RateLimited {
                endpoint: endpoint.to_string(),
                retry_after_secs,
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CollectError::Unauthorized {
                detail: format!("{endpoint} returned {status}"),
            });
        }
        if !status.is_success() {
            return Err(CollectError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| CollectError::Deserialize {
            context: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl SearchSource for BskyClient {
    async fn search_page(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPage, CollectError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("limit", limit.to_string()),
            ("sort", "latest".to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.get_json(SEARCH_POSTS, &params).await
    }
}

#[async_trait]
impl ProfileSource for BskyClient {
    async fn fetch_profile(&self, did: &str) -> Result<ProfileView, CollectError> {
        self.get_json(GET_PROFILE, &[("actor", did.to_string())])
            .await
    }
}

//! # ISAPI Device Client
//!
//! [`DeviceDirectory`] implementation for access-control devices reachable
//! through an ISAPI gateway.
//!
//! Every call goes to `{host}{path}?format=json&devIndex={dev_index}` with
//! HTTP Digest authentication. The first request to a host takes a 401, the
//! challenge is cached per host and later requests authenticate up front. A
//! stale nonce just costs one more 401 round trip.
//!
//! User listing pages through `UserInfo/Search` until the device stops
//! answering `MORE`. A listing that never ends fails the fetch instead of
//! handing back a partial snapshot.

mod digest;
mod requests;
mod responses;

pub use digest::{DigestChallenge, DigestSession};
pub use requests::{DeleteRequest, ModifyRequest, RecordRequest, SearchRequest};
pub use responses::{SearchResponse, StatusResponse};

use crate::config::{DeviceConfig, EnrollmentDefaults, Secret};
use crate::constants::{
    ISAPI_USER_DELETE_PATH, ISAPI_USER_MODIFY_PATH, ISAPI_USER_RECORD_PATH, ISAPI_USER_SEARCH_PATH,
    MAX_DEVICE_SEARCH_PAGES,
};
use crate::error::SourceUnavailableError;
use crate::model::CanonicalUser;
use crate::observability::metrics;
use crate::provider::{DeviceDirectory, DeviceTarget};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info_span, warn, Instrument};

pub struct IsapiDeviceClient {
    http_client: Client,
    host: String,
    username: String,
    password: Secret,
    page_size: u32,
    enrollment: EnrollmentDefaults,
    /// Cached Digest challenge per host
    sessions: Mutex<HashMap<String, DigestSession>>,
}

impl std::fmt::Debug for IsapiDeviceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsapiDeviceClient")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl IsapiDeviceClient {
    /// # Errors
    /// Returns an error if `device.host` is missing or the HTTP client cannot be built
    pub fn new(config: &DeviceConfig, timeout: Duration) -> Result<Self> {
        let host = config
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow!("device.host is required"))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            host: host.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            page_size: config.page_size.max(1),
            enrollment: config.enrollment.clone(),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn host_for<'a>(&'a self, target: &'a DeviceTarget) -> &'a str {
        target
            .host
            .as_deref()
            .map(|h| h.trim_end_matches('/'))
            .unwrap_or(&self.host)
    }

    async fn cached_authorization(&self, host: &str, method: &Method, uri: &str) -> Option<String> {
        let mut sessions = self.sessions.lock().await;
        sessions.get_mut(host).map(|session| {
            session.next_authorization(&self.username, self.password.expose(), method.as_str(), uri)
        })
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: &[u8],
        authorization: Option<String>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http_client
            .request(method.clone(), url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        if let Some(authorization) = authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }
        request
            .send()
            .await
            .with_context(|| format!("{method} {url}"))
    }

    /// Send one JSON request, answering a Digest challenge if the device asks
    async fn send<B: Serialize>(
        &self,
        method: Method,
        target: &DeviceTarget,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let host = self.host_for(target);
        let uri = format!("{path}?format=json&devIndex={}", target.dev_index);
        let url = format!("{host}{uri}");
        let body = serde_json::to_vec(body).context("Failed to serialize request body")?;

        let authorization = self.cached_authorization(host, &method, &uri).await;
        let response = self.send_once(&method, &url, &body, authorization).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = digest_challenge(response.headers())
            .ok_or_else(|| anyhow!("{method} {url} returned 401 without a Digest challenge"))?;
        debug!(device.host = %host, realm = %challenge.realm, "Digest challenge received");

        let mut session = DigestSession::new(challenge);
        let authorization =
            session.next_authorization(&self.username, self.password.expose(), method.as_str(), &uri);
        self.sessions.lock().await.insert(host.to_string(), session);

        let response = self.send_once(&method, &url, &body, Some(authorization)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.sessions.lock().await.remove(host);
            bail!("{method} {url} rejected the device credentials");
        }
        Ok(response)
    }

    async fn search_page(&self, target: &DeviceTarget, search_id: &str, position: u32) -> Result<SearchResponse> {
        let request = SearchRequest::page(search_id, position, self.page_size);
        let response = self
            .send(Method::POST, target, ISAPI_USER_SEARCH_PATH, &request)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("user search returned {status}: {body}");
        }
        response
            .json()
            .await
            .context("Failed to parse user search response")
    }

    async fn list_users(&self, target: &DeviceTarget) -> Result<Vec<Value>> {
        let search_id = uuid::Uuid::new_v4().to_string();
        let mut users = Vec::new();
        let mut position = 0u32;

        for _ in 0..MAX_DEVICE_SEARCH_PAGES {
            let page = self.search_page(target, &search_id, position).await?.search;
            let received = page.user_info.len();
            let more = page.has_more();
            users.extend(page.user_info);

            if !more || received == 0 {
                if more {
                    warn!(device = %target.name, "Device reported more users but sent an empty page");
                }
                return Ok(users);
            }
            position = position.saturating_add(u32::try_from(received).unwrap_or(u32::MAX));
        }

        bail!(
            "user search on {} did not finish within {} pages",
            target.name,
            MAX_DEVICE_SEARCH_PAGES
        )
    }

    /// Issue one write and check both the HTTP status and the ISAPI status body
    async fn write<B: Serialize>(
        &self,
        operation: &'static str,
        method: Method,
        target: &DeviceTarget,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let start = Instant::now();
        let result = self.write_inner(method, target, path, body).await;
        metrics::record_device_request(operation, result.is_ok(), start.elapsed().as_secs_f64());
        result
    }

    async fn write_inner<B: Serialize>(
        &self,
        method: Method,
        target: &DeviceTarget,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let response = self.send(method, target, path, body).await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: StatusResponse = serde_json::from_str(&text).unwrap_or_default();

        if !status.is_success() {
            let detail = body.describe();
            if detail.is_empty() {
                bail!("device returned {status}: {text}");
            }
            bail!("device returned {status}: {detail}");
        }
        if !body.is_success() {
            bail!("device rejected the request: {}", body.describe());
        }
        Ok(())
    }
}

/// First `WWW-Authenticate` value that parses as a Digest challenge.
///
/// Gateways may offer `Basic` alongside `Digest`, in either order.
fn digest_challenge(headers: &header::HeaderMap) -> Option<DigestChallenge> {
    headers
        .get_all(header::WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| match DigestChallenge::parse(value) {
            Ok(challenge) => Some(challenge),
            Err(e) => {
                debug!("Skipping challenge: {}", e);
                None
            }
        })
}

#[async_trait]
impl DeviceDirectory for IsapiDeviceClient {
    async fn fetch_users(&self, target: &DeviceTarget) -> Result<Vec<Value>, SourceUnavailableError> {
        let span = info_span!("device.fetch", device = %target.name, dev_index = %target.dev_index);
        let start = Instant::now();
        let result = self.list_users(target).instrument(span).await;
        metrics::record_device_request("search", result.is_ok(), start.elapsed().as_secs_f64());

        match result {
            Ok(users) => {
                debug!(
                    device = %target.name,
                    users = users.len(),
                    duration_ms = start.elapsed().as_millis(),
                    "Device users fetched"
                );
                Ok(users)
            }
            Err(e) => Err(SourceUnavailableError::new(format!("device '{}'", target.name), e)),
        }
    }

    async fn create_user(&self, target: &DeviceTarget, user: &CanonicalUser) -> Result<()> {
        let request = RecordRequest::enroll(user, &self.enrollment);
        self.write("create", Method::POST, target, ISAPI_USER_RECORD_PATH, &request)
            .instrument(info_span!("device.create", device = %target.name, user.id = %user.id))
            .await
    }

    async fn update_user(&self, target: &DeviceTarget, user: &CanonicalUser) -> Result<()> {
        let request = ModifyRequest::from_user(user);
        self.write("update", Method::PUT, target, ISAPI_USER_MODIFY_PATH, &request)
            .instrument(info_span!("device.update", device = %target.name, user.id = %user.id))
            .await
    }

    async fn delete_user(&self, target: &DeviceTarget, user_id: &str) -> Result<()> {
        let request = DeleteRequest::by_employee_no(user_id);
        self.write("delete", Method::PUT, target, ISAPI_USER_DELETE_PATH, &request)
            .instrument(info_span!("device.delete", device = %target.name, user.id = %user_id))
            .await
    }
}

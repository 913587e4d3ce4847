//! Client for the remote content backend's REST surface.
//!
//! SYSTEM CONTEXT
//! ==============
//! The backend owns every article, program, team member, role, profile,
//! account, and header-settings record, and issues session tokens. This
//! module is the only place that speaks HTTP to it. Flows depend on the
//! object-safe [`Backend`] trait so tests can swap in mocks.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures, non-2xx statuses, and undecodable bodies are kept
//! apart in [`BackendError`] so callers can choose between "network error",
//! the backend's own message, and a generic fallback.

pub mod types;

use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use types::{AuthPayload, Listing, LoginRequest, Page, RegisterRequest};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by backend calls.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response (connection refused, DNS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}")]
    Rejected { status: u16, message: Option<String> },

    /// A success response carried a body of the wrong shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl BackendError {
    /// The backend's own message for a rejected request, if it sent one.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Pull a human-readable message out of an error body (`error`, then `detail`).
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "detail"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_owned)
}

// =============================================================================
// RESOURCES
// =============================================================================

/// A backend collection exposed as standard REST CRUD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Articles,
    Programs,
    TeamMembers,
    Roles,
    Profiles,
    Users,
    HeaderSettings,
}

impl Resource {
    /// Collection path, with the trailing slash the backend expects.
    #[must_use]
    pub fn collection_path(self) -> &'static str {
        match self {
            Self::Articles => "/api/articles/",
            Self::Programs => "/api/programs/",
            Self::TeamMembers => "/api/team-members/",
            Self::Roles => "/api/roles/",
            Self::Profiles => "/api/profiles/",
            Self::Users => "/api/users/",
            Self::HeaderSettings => "/api/header-settings/",
        }
    }

    #[must_use]
    pub fn item_path(self, id: &str) -> String {
        format!("{}{id}/", self.collection_path())
    }
}

/// Whether an update replaces the record or merges into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Patch,
    Put,
}

pub(crate) const LOGIN_PATH: &str = "/api/auth/login/";
pub(crate) const REGISTER_PATH: &str = "/api/auth/register/";

// =============================================================================
// BACKEND TRAIT
// =============================================================================

/// The remote REST surface. Enables mocking in tests.
///
/// `token` is attached as a bearer credential when present; whether the
/// backend checks it is the backend's business.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Exchange username and password for a session.
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, BackendError>;

    /// Create an account and receive a session for it.
    async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload, BackendError>;

    /// Fetch one page of a collection (`page` is 1-based; `None` lets the backend pick).
    async fn list(&self, resource: Resource, page: Option<u32>, token: Option<&str>) -> Result<Page<Value>, BackendError>;

    async fn fetch(&self, resource: Resource, id: &str, token: Option<&str>) -> Result<Value, BackendError>;

    async fn create(&self, resource: Resource, body: &Value, token: Option<&str>) -> Result<Value, BackendError>;

    async fn update(
        &self,
        resource: Resource,
        id: &str,
        mode: UpdateMode,
        body: &Value,
        token: Option<&str>,
    ) -> Result<Value, BackendError>;

    async fn delete(&self, resource: Resource, id: &str, token: Option<&str>) -> Result<(), BackendError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// reqwest-backed [`Backend`]. No timeouts and no retries: a hung backend
/// call stays pending.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Build a client for the backend at `base_url` (trailing `/` ignored).
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("cms-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match token {
            Some(token) if !token.is_empty() => builder.bearer_auth(token),
            _ => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "backend rejected request");
        Err(BackendError::Rejected { status: status.as_u16(), message: error_message(&body) })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, BackendError> {
        let resp = self.send(builder).await?;
        resp.json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn post_credentials<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<AuthPayload, BackendError> {
        self.send_json(self.request(Method::POST, path, None).json(body))
            .await
    }
}

#[async_trait::async_trait]
impl Backend for BackendClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, BackendError> {
        self.post_credentials(LOGIN_PATH, request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload, BackendError> {
        self.post_credentials(REGISTER_PATH, request).await
    }

    async fn list(&self, resource: Resource, page: Option<u32>, token: Option<&str>) -> Result<Page<Value>, BackendError> {
        let mut builder = self.request(Method::GET, resource.collection_path(), token);
        if let Some(page) = page {
            builder = builder.query(&[("page", page)]);
        }
        let listing: Listing<Value> = self.send_json(builder).await?;
        Ok(listing.into_page())
    }

    async fn fetch(&self, resource: Resource, id: &str, token: Option<&str>) -> Result<Value, BackendError> {
        self.send_json(self.request(Method::GET, &resource.item_path(id), token))
            .await
    }

    async fn create(&self, resource: Resource, body: &Value, token: Option<&str>) -> Result<Value, BackendError> {
        self.send_json(self.request(Method::POST, resource.collection_path(), token).json(body))
            .await
    }

    async fn update(
        &self,
        resource: Resource,
        id: &str,
        mode: UpdateMode,
        body: &Value,
        token: Option<&str>,
    ) -> Result<Value, BackendError> {
        let method = match mode {
            UpdateMode::Patch => Method::PATCH,
            UpdateMode::Put => Method::PUT,
        };
        self.send_json(self.request(method, &resource.item_path(id), token).json(body))
            .await
    }

    async fn delete(&self, resource: Resource, id: &str, token: Option<&str>) -> Result<(), BackendError> {
        self.send(self.request(Method::DELETE, &resource.item_path(id), token))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

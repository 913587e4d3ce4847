//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the one session store for this host, the backend client, and the
//! credential exchange that writes into the session store. Every field is
//! `Arc`-wrapped or cheaply cloneable.

use std::sync::Arc;

use crate::backend::Backend;
use crate::services::credentials::CredentialExchange;
use crate::services::session::SessionStore;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionStore>,
    pub backend: Arc<dyn Backend>,
    pub exchange: CredentialExchange,
}

impl AppState {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, backend: Arc<dyn Backend>) -> Self {
        let exchange = CredentialExchange::new(backend.clone(), session.clone());
        Self { session, backend, exchange }
    }

    /// Bearer token to attach to content calls, if a session is held.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.session.token()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use axum::Router;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::backend::types::{AuthPayload, LoginRequest, Page, RegisterRequest};
    use crate::backend::{BackendError, Resource, UpdateMode};
    use crate::services::session::SessionUser;
    use crate::storage::MemoryStorage;

    /// In-memory stand-in for the remote backend.
    ///
    /// Auth calls pop scripted outcomes (an empty script is a network error).
    /// Collection calls operate on seeded JSON rows keyed by resource.
    #[derive(Default)]
    pub struct MockBackend {
        auth_script: Mutex<VecDeque<Result<AuthPayload, BackendError>>>,
        rows: Mutex<HashMap<Resource, Vec<Value>>>,
        unreachable: AtomicBool,
        rejected_creates: Mutex<HashSet<Resource>>,
        pub auth_calls: AtomicUsize,
        pub content_calls: AtomicUsize,
        pub seen_tokens: Mutex<Vec<Option<String>>>,
        pub last_register: Mutex<Option<RegisterRequest>>,
    }

    impl MockBackend {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_auth(&self, outcome: Result<AuthPayload, BackendError>) {
            self.auth_script.lock().unwrap().push_back(outcome);
        }

        pub fn seed(&self, resource: Resource, rows: Vec<Value>) {
            self.rows.lock().unwrap().insert(resource, rows);
        }

        #[must_use]
        pub fn rows(&self, resource: Resource) -> Vec<Value> {
            self.rows.lock().unwrap().get(&resource).cloned().unwrap_or_default()
        }

        /// Refuse creates on `resource` with a `400`.
        pub fn reject_creates(&self, resource: Resource) {
            self.rejected_creates.lock().unwrap().insert(resource);
        }

        /// Make every content call fail as if the backend were down.
        pub fn set_unreachable(&self, unreachable: bool) {
            self.unreachable.store(unreachable, Ordering::SeqCst);
        }

        fn content_call(&self, token: Option<&str>) -> Result<(), BackendError> {
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_tokens.lock().unwrap().push(token.map(str::to_owned));
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(BackendError::Network("connection refused".into()));
            }
            Ok(())
        }

        fn next_auth(&self) -> Result<AuthPayload, BackendError> {
            self.auth_calls.fetch_add(1, Ordering::SeqCst);
            self.auth_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Network("connection refused".into())))
        }
    }

    fn not_found() -> BackendError {
        BackendError::Rejected { status: 404, message: Some("Not found.".into()) }
    }

    fn row_id(row: &Value) -> String {
        match &row["id"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    #[async_trait::async_trait]
    impl Backend for MockBackend {
        async fn login(&self, _request: &LoginRequest) -> Result<AuthPayload, BackendError> {
            self.next_auth()
        }

        async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload, BackendError> {
            *self.last_register.lock().unwrap() = Some(request.clone());
            self.next_auth()
        }

        async fn list(&self, resource: Resource, page: Option<u32>, token: Option<&str>) -> Result<Page<Value>, BackendError> {
            self.content_call(token)?;
            let results = self.rows(resource);
            let count = results.len() as u64;
            let next = page.map(|p| format!("{}?page={}", resource.collection_path(), p + 1));
            Ok(Page { count, next, previous: None, results })
        }

        async fn fetch(&self, resource: Resource, id: &str, token: Option<&str>) -> Result<Value, BackendError> {
            self.content_call(token)?;
            self.rows(resource)
                .into_iter()
                .find(|row| row_id(row) == id)
                .ok_or_else(not_found)
        }

        async fn create(&self, resource: Resource, body: &Value, token: Option<&str>) -> Result<Value, BackendError> {
            self.content_call(token)?;
            if self.rejected_creates.lock().unwrap().contains(&resource) {
                return Err(BackendError::Rejected { status: 400, message: None });
            }
            let mut rows = self.rows.lock().unwrap();
            let rows = rows.entry(resource).or_default();
            let next_id = rows.iter().filter_map(|r| r["id"].as_i64()).max().unwrap_or(0) + 1;
            let mut row = body.clone();
            row["id"] = json!(next_id);
            rows.push(row.clone());
            Ok(row)
        }

        async fn update(
            &self,
            resource: Resource,
            id: &str,
            mode: UpdateMode,
            body: &Value,
            token: Option<&str>,
        ) -> Result<Value, BackendError> {
            self.content_call(token)?;
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .entry(resource)
                .or_default()
                .iter_mut()
                .find(|row| row_id(row) == id)
                .ok_or_else(not_found)?;
            let id_value = row["id"].clone();
            match (mode, body) {
                (UpdateMode::Patch, Value::Object(fields)) => {
                    for (k, v) in fields {
                        row[k.as_str()] = v.clone();
                    }
                }
                _ => {
                    *row = body.clone();
                    row["id"] = id_value;
                }
            }
            Ok(row.clone())
        }

        async fn delete(&self, resource: Resource, id: &str, token: Option<&str>) -> Result<(), BackendError> {
            self.content_call(token)?;
            let mut rows = self.rows.lock().unwrap();
            let rows = rows.entry(resource).or_default();
            let before = rows.len();
            rows.retain(|row| row_id(row) != id);
            if rows.len() == before {
                return Err(not_found());
            }
            Ok(())
        }
    }

    #[must_use]
    pub fn admin_user() -> SessionUser {
        SessionUser {
            id: 1,
            username: "admin".into(),
            email: "admin@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Admin".into(),
            is_staff: true,
            is_superuser: true,
            profile: None,
        }
    }

    #[must_use]
    pub fn auth_payload(token: &str) -> AuthPayload {
        AuthPayload { token: token.into(), user: admin_user() }
    }

    /// Build an `AppState` over memory storage and the given mock.
    /// Returns the storage handle so tests can poke it directly.
    #[must_use]
    pub fn test_app_state(backend: Arc<MockBackend>) -> (AppState, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let session = Arc::new(SessionStore::new(storage.clone()));
        session.initialize();
        (AppState::new(session, backend), storage)
    }

    /// Same as [`test_app_state`] with an admin session already logged in.
    #[must_use]
    pub fn logged_in_state(backend: Arc<MockBackend>) -> (AppState, Arc<MemoryStorage>) {
        let (state, storage) = test_app_state(backend);
        state.session.login("abc123", &admin_user());
        (state, storage)
    }

    // -------------------------------------------------------------------------
    // router driving
    // -------------------------------------------------------------------------

    /// Build a request with an optional JSON body.
    #[must_use]
    pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    /// Drive `app` with one request. An empty body decodes as `Value::Null`.
    pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, headers, body)
    }

    /// Location header of a redirect.
    #[must_use]
    pub fn location(headers: &HeaderMap) -> Option<&str> {
        headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }
}

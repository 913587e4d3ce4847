use super::*;
use crate::backend::BackendError;
use crate::routes::app;
use crate::services::credentials::ValidationError;
use crate::services::session::{TOKEN_KEY, USER_KEY};
use crate::state::test_helpers::{MockBackend, auth_payload, location, logged_in_state, request, send, test_app_state};
use crate::storage::Storage;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;

// =============================================================================
// status mapping
// =============================================================================

#[test]
fn exchange_errors_map_to_statuses() {
    assert_eq!(status_for(&ExchangeError::Invalid(ValidationError::MissingFields)), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        status_for(&ExchangeError::Rejected { status: 401, message: "Invalid credentials".into() }),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(status_for(&ExchangeError::Network("x".into())), StatusCode::BAD_GATEWAY);
    assert_eq!(status_for(&ExchangeError::Busy), StatusCode::CONFLICT);
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn login_success_redirects_to_landing_and_stores_token() {
    let backend = Arc::new(MockBackend::new());
    backend.push_auth(Ok(auth_payload("abc123")));
    let (state, storage) = test_app_state(backend);

    let body = json!({"username": "admin", "password": "admin123"});
    let (status, headers, _) = send(app(state.clone()), request("POST", "/login", Some(body))).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), Some(LANDING_ROUTE));
    assert!(state.session.is_authenticated());
    assert_eq!(storage.get_item(TOKEN_KEY).unwrap().as_deref(), Some("abc123"));

    let (status, _, page) = send(app(state.clone()), request("GET", "/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["phase"], "ready");

    let (status, _, view) = send(app(state), request("GET", "/login", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["authenticated"], true);
}

#[tokio::test]
async fn login_wrong_password_stays_on_form() {
    let backend = Arc::new(MockBackend::new());
    backend.push_auth(Err(BackendError::Rejected { status: 401, message: Some("Invalid credentials".into()) }));
    let (state, storage) = test_app_state(backend);

    let body = json!({"username": "admin", "password": "wrong"});
    let (status, _, view) = send(app(state.clone()), request("POST", "/login", Some(body))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(view["error"], "Invalid credentials");
    assert_eq!(view["form"]["phase"], "idle");
    assert_eq!(view["form"]["error"], "Invalid credentials");
    assert!(!state.session.is_authenticated());
    assert_eq!(storage.get_item(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get_item(USER_KEY).unwrap(), None);

    let (_, _, page) = send(app(state), request("GET", "/login", None)).await;
    assert_eq!(page["form"]["error"], "Invalid credentials");
    assert_eq!(page["authenticated"], false);
}

#[tokio::test]
async fn login_with_backend_down_is_bad_gateway() {
    let backend = Arc::new(MockBackend::new());
    let (state, _) = test_app_state(backend);

    let body = json!({"username": "admin", "password": "admin123"});
    let (status, _, view) = send(app(state), request("POST", "/login", Some(body))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(view["error"], "Network error. Please try again. Make sure the backend server is running.");
}

#[tokio::test]
async fn login_missing_fields_is_unprocessable() {
    let backend = Arc::new(MockBackend::new());
    let (state, _) = test_app_state(backend.clone());

    let (status, _, view) = send(app(state), request("POST", "/login", Some(json!({"username": "admin"})))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(view["error"], "Please fill in all required fields");
    assert_eq!(backend.auth_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// register
// =============================================================================

#[tokio::test]
async fn register_short_password_blocked_without_network() {
    let backend = Arc::new(MockBackend::new());
    let (state, _) = test_app_state(backend.clone());

    let body = json!({
        "username": "newbie",
        "email": "new@example.com",
        "password": "short",
        "confirm_password": "short"
    });
    let (status, _, view) = send(app(state.clone()), request("POST", "/register", Some(body))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(view["error"], "Password must be at least 8 characters long");
    assert_eq!(backend.auth_calls.load(Ordering::SeqCst), 0);
    assert!(!state.session.is_authenticated());
}

#[tokio::test]
async fn register_success_redirects_and_logs_in() {
    let backend = Arc::new(MockBackend::new());
    backend.push_auth(Ok(auth_payload("fresh")));
    let (state, _) = test_app_state(backend);

    let body = json!({
        "username": "newbie",
        "email": "new@example.com",
        "password": "longenough",
        "confirmPassword": "longenough",
        "role_id": 2
    });
    let (status, headers, _) = send(app(state.clone()), request("POST", "/register", Some(body))).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), Some("/"));
    assert_eq!(state.session.token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn register_page_lists_roles() {
    let backend = Arc::new(MockBackend::new());
    backend.seed(Resource::Roles, vec![json!({"id": 1, "name": "Editor"}), json!({"id": 2, "name": "Writer"})]);
    let (state, _) = test_app_state(backend);

    let (status, _, view) = send(app(state), request("GET", "/register", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["roles"].as_array().unwrap().len(), 2);
    assert_eq!(view["form"]["phase"], "idle");
}

#[tokio::test]
async fn register_page_swallows_role_failure() {
    let backend = Arc::new(MockBackend::new());
    backend.set_unreachable(true);
    let (state, _) = test_app_state(backend);

    let (status, _, view) = send(app(state), request("GET", "/register", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["roles"], json!([]));
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_clears_session_and_redirects() {
    let backend = Arc::new(MockBackend::new());
    let (state, storage) = logged_in_state(backend);

    for _ in 0..2 {
        let (status, headers, _) = send(app(state.clone()), request("POST", "/logout", None)).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location(&headers), Some(LOGIN_ROUTE));
    }
    assert!(!state.session.is_authenticated());
    assert_eq!(storage.get_item(TOKEN_KEY).unwrap(), None);

    let (status, _, _) = send(app(state), request("GET", "/", None)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
}

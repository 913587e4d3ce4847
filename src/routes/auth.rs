//! Auth routes: login, registration, logout.
//!
//! These are the only public pages besides `/healthz`. A successful login or
//! registration answers `303` to the landing page; a failed one answers with
//! the form's state and the message to show. Status mapping:
//!
//! - validation failure: `422`
//! - backend refusal: the backend's own status
//! - backend unreachable or unreadable: `502`
//! - duplicate submit while one is in flight: `409`

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Serialize;
use tracing::warn;

use super::guard::{LANDING_ROUTE, LOGIN_ROUTE};
use crate::backend::Resource;
use crate::backend::types::Role;
use crate::services::credentials::{ExchangeError, FormState, LoginForm, RegistrationForm};
use crate::state::AppState;

// =============================================================================
// VIEWS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginView {
    pub form: FormState,
    /// A session is already stored; the renderer may offer the dashboard.
    pub authenticated: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterView {
    pub form: FormState,
    /// Choices for the optional role picker. Empty when roles failed to load.
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize)]
struct FailureView {
    error: String,
    form: FormState,
}

fn status_for(err: &ExchangeError) -> StatusCode {
    match err {
        ExchangeError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExchangeError::Rejected { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
        ExchangeError::Network(_) => StatusCode::BAD_GATEWAY,
        ExchangeError::Busy => StatusCode::CONFLICT,
    }
}

fn failure(err: &ExchangeError, form: FormState) -> Response {
    (status_for(err), Json(FailureView { error: err.to_string(), form })).into_response()
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /login`
pub async fn login_page(State(state): State<AppState>) -> Json<LoginView> {
    Json(LoginView { form: state.exchange.login_state(), authenticated: state.session.is_authenticated() })
}

/// `POST /login`: exchange credentials, then go to the landing page.
pub async fn login(State(state): State<AppState>, Json(form): Json<LoginForm>) -> Response {
    match state.exchange.login(&form).await {
        Ok(_) => Redirect::to(LANDING_ROUTE).into_response(),
        Err(e) => failure(&e, state.exchange.login_state()),
    }
}

/// `GET /register`: form state plus the role choices.
pub async fn register_page(State(state): State<AppState>) -> Json<RegisterView> {
    let roles = match state.backend.list(Resource::Roles, None, None).await.and_then(|p| p.decode::<Role>()) {
        Ok(page) => page.results,
        Err(e) => {
            warn!(error = %e, "could not load roles for registration");
            Vec::new()
        }
    };
    Json(RegisterView { form: state.exchange.register_state(), roles })
}

/// `POST /register`: create the account, log it in, go to the landing page.
pub async fn register(State(state): State<AppState>, Json(form): Json<RegistrationForm>) -> Response {
    match state.exchange.register(&form).await {
        Ok(_) => Redirect::to(LANDING_ROUTE).into_response(),
        Err(e) => failure(&e, state.exchange.register_state()),
    }
}

/// `POST /logout`: drop the session and go to the login page. Idempotent.
pub async fn logout(State(state): State<AppState>) -> Redirect {
    state.session.logout();
    Redirect::to(LOGIN_ROUTE)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

//! Route guard: gate every protected page on the session store.
//!
//! ARCHITECTURE
//! ============
//! The guard is an axum middleware layered onto the protected router with
//! `route_layer`, so it runs once per activation of a matched protected route
//! and never for public or unmatched paths.
//!
//! Activation walks `checking → ready | redirecting`:
//!
//! - `checking`: the session store has not finished resolving the persisted
//!   session yet. No protected content and no redirect; the host answers
//!   `503` with the phase so a renderer can show a spinner.
//! - `redirecting`: `revalidate` found no session. Exactly one `303` to the
//!   login route; the page handler (and its backend fetch) never runs.
//! - `ready`: the resolved [`Activation`] is inserted into request extensions
//!   and the page handler runs.
//!
//! Nothing is memoised between activations. A session cleared outside this
//! host is noticed on the next protected request.

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Serialize;
use tracing::{debug, info};

use crate::services::session::{SessionStore, SessionUser};
use crate::state::AppState;

pub const LOGIN_ROUTE: &str = "/login";
pub const LANDING_ROUTE: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPhase {
    Checking,
    Ready,
    Redirecting,
}

/// Outcome of one guard activation, handed to page handlers via extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    pub phase: GuardPhase,
    pub user: Option<SessionUser>,
}

/// Run the guard decision against `session`.
#[must_use]
pub fn activate(session: &SessionStore) -> Activation {
    if !session.is_ready() {
        return Activation { phase: GuardPhase::Checking, user: None };
    }
    if session.revalidate() {
        Activation { phase: GuardPhase::Ready, user: session.current_user() }
    } else {
        Activation { phase: GuardPhase::Redirecting, user: None }
    }
}

#[derive(Serialize)]
struct CheckingView {
    phase: GuardPhase,
}

/// Middleware for the protected router.
pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let activation = activate(&state.session);
    match activation.phase {
        GuardPhase::Ready => {
            debug!(path = %req.uri().path(), "guard ready");
            req.extensions_mut().insert(activation);
            next.run(req).await
        }
        GuardPhase::Redirecting => {
            info!(path = %req.uri().path(), "no session; redirecting to login");
            Redirect::to(LOGIN_ROUTE).into_response()
        }
        GuardPhase::Checking => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(CheckingView { phase: GuardPhase::Checking }),
        )
            .into_response(),
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

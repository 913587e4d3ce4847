//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The dashboard host serves two kinds of route under one Axum router:
//! public auth flows (`/login`, `/register`, `/logout`, `/healthz`) and the
//! protected pages and mutations, which sit behind [`guard::require_session`].

pub mod auth;
pub mod guard;
pub mod pages;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, patch, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Routes that require a session. The guard runs as a route layer so only
/// matched protected paths activate it.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(pages::dashboard))
        .route("/articles", get(pages::articles).post(pages::create_article))
        .route(
            "/articles/{id}",
            get(pages::article)
                .patch(pages::update_article)
                .delete(pages::delete_article),
        )
        .route("/articles/slug/{slug}", get(pages::article_by_slug))
        .route("/articles/{id}/publish", post(pages::toggle_publish))
        .route("/programs", get(pages::programs).post(pages::create_program))
        .route(
            "/programs/{id}",
            get(pages::program)
                .patch(pages::update_program)
                .delete(pages::delete_program),
        )
        .route("/teams", get(pages::teams).post(pages::create_team_member))
        .route(
            "/teams/{id}",
            put(pages::update_team_member).delete(pages::delete_team_member),
        )
        .route("/roles", get(pages::roles).post(pages::create_role))
        .route(
            "/roles/{id}",
            put(pages::update_role).delete(pages::delete_role),
        )
        .route("/users", get(pages::users).post(pages::create_user))
        .route(
            "/users/{id}",
            patch(pages::update_user).delete(pages::delete_user),
        )
        .route("/users/{id}/active", post(pages::toggle_active))
        .route(
            "/header-settings",
            get(pages::header_settings).patch(pages::update_header_settings),
        )
        .route_layer(middleware::from_fn_with_state(state, guard::require_session))
}

/// The full dashboard host router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/healthz", get(healthz))
        .merge(protected_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

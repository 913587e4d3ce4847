//! Protected page views and content mutations.
//!
//! DESIGN
//! ======
//! Every handler here sits behind the route guard and receives the resolved
//! [`Activation`] through request extensions. Page loads fetch one or more
//! backend collections and answer with a [`PageView`]; a failed load still
//! answers `200` with an empty collection and an `error` string.
//!
//! Mutations forward the request body to the backend with the session's
//! bearer token attached and answer with the backend's record. Failures map
//! through [`PageError`] to the backend's status (or `502` when the backend
//! could not be reached) and an `{"error": ...}` body.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use super::guard::{Activation, GuardPhase};
use crate::backend::types::{Account, Article, HeaderSettings, Page, Profile, Program, Role, TeamMember};
use crate::backend::{BackendError, Resource, UpdateMode};
use crate::services::catalog::{self, ArticleStats, ArticleStatus, ProgramStats, RoleRow, UserCounts, UserFilter, UserRow};
use crate::services::session::SessionUser;
use crate::state::AppState;

/// Header settings live in a single backend row.
const HEADER_SETTINGS_ID: &str = "1";

// =============================================================================
// VIEW + ERROR
// =============================================================================

/// A protected page as handed to the renderer.
#[derive(Debug, Serialize)]
pub struct PageView<T> {
    pub phase: GuardPhase,
    pub user: Option<SessionUser>,
    #[serde(flatten)]
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> PageView<T> {
    fn render(activation: Activation, data: T, error: Option<String>) -> Json<Self> {
        Json(Self { phase: activation.phase, user: activation.user, data, error })
    }
}

/// A failed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageError {
    pub status: StatusCode,
    pub message: String,
}

impl PageError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// Map a backend failure; `fallback` is shown when the backend sent no message.
    fn from_backend(err: &BackendError, fallback: &str) -> Self {
        match err {
            BackendError::Rejected { status, message } => Self::new(
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                message.clone().unwrap_or_else(|| fallback.to_owned()),
            ),
            BackendError::Network(_) | BackendError::ClientBuild(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "Network error. Please try again.")
            }
            BackendError::Decode(_) => Self::new(StatusCode::BAD_GATEWAY, fallback),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type Mutation = Result<Json<Value>, PageError>;

// =============================================================================
// BACKEND HELPERS
// =============================================================================

async fn load_page<T: DeserializeOwned>(
    state: &AppState,
    resource: Resource,
    page: Option<u32>,
) -> Result<Page<T>, BackendError> {
    let token = state.token();
    state
        .backend
        .list(resource, page, token.as_deref())
        .await?
        .decode()
}

/// Load a whole collection, degrading to empty plus a message on failure.
async fn load_all<T: DeserializeOwned>(state: &AppState, resource: Resource, what: &str) -> (Vec<T>, Option<String>) {
    match load_page(state, resource, None).await {
        Ok(page) => (page.results, None),
        Err(e) => {
            warn!(error = %e, ?resource, "page load failed");
            (Vec::new(), Some(format!("Failed to load {what}")))
        }
    }
}

async fn load_one<T: DeserializeOwned>(state: &AppState, resource: Resource, id: &str, what: &str) -> (Option<T>, Option<String>) {
    let token = state.token();
    let fetched = state
        .backend
        .fetch(resource, id, token.as_deref())
        .await
        .and_then(|v| serde_json::from_value::<T>(v).map_err(|e| BackendError::Decode(e.to_string())));
    match fetched {
        Ok(record) => (Some(record), None),
        Err(BackendError::Rejected { status: 404, .. }) => (None, Some(format!("{} not found", capitalize(what)))),
        Err(e) => {
            warn!(error = %e, ?resource, %id, "record load failed");
            (None, Some(format!("Failed to load {what}")))
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

async fn create(state: &AppState, resource: Resource, body: &Value, fallback: &str) -> Result<Value, PageError> {
    let token = state.token();
    state
        .backend
        .create(resource, body, token.as_deref())
        .await
        .map_err(|e| mutation_failed(&e, resource, fallback))
}

async fn update(
    state: &AppState,
    resource: Resource,
    id: &str,
    mode: UpdateMode,
    body: &Value,
    fallback: &str,
) -> Result<Value, PageError> {
    let token = state.token();
    state
        .backend
        .update(resource, id, mode, body, token.as_deref())
        .await
        .map_err(|e| mutation_failed(&e, resource, fallback))
}

async fn delete(state: &AppState, resource: Resource, id: &str, fallback: &str) -> Result<StatusCode, PageError> {
    let token = state.token();
    state
        .backend
        .delete(resource, id, token.as_deref())
        .await
        .map_err(|e| mutation_failed(&e, resource, fallback))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_raw(state: &AppState, resource: Resource, id: &str, fallback: &str) -> Result<Value, PageError> {
    let token = state.token();
    state
        .backend
        .fetch(resource, id, token.as_deref())
        .await
        .map_err(|e| mutation_failed(&e, resource, fallback))
}

fn mutation_failed(err: &BackendError, resource: Resource, fallback: &str) -> PageError {
    warn!(error = %err, ?resource, "mutation failed");
    PageError::from_backend(err, fallback)
}

fn created(record: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(record))
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub articles: Vec<Article>,
    pub stats: ArticleStats,
}

/// `GET /`: every article plus publish stats.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(activation): Extension<Activation>,
) -> Json<PageView<DashboardData>> {
    let (articles, error) = load_all::<Article>(&state, Resource::Articles, "articles").await;
    let stats = catalog::article_stats(&articles);
    PageView::render(activation, DashboardData { articles, stats }, error)
}

// =============================================================================
// ARTICLES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ArticleQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub status: ArticleStatus,
}

#[derive(Debug, Serialize)]
pub struct ArticlesData {
    pub articles: Vec<Article>,
    /// Stats over the unfiltered collection.
    pub stats: ArticleStats,
    pub search: String,
    pub status: ArticleStatus,
}

#[derive(Debug, Serialize)]
pub struct ArticleDetail {
    pub article: Option<Article>,
}

/// `GET /articles`
pub async fn articles(
    State(state): State<AppState>,
    Extension(activation): Extension<Activation>,
    Query(query): Query<ArticleQuery>,
) -> Json<PageView<ArticlesData>> {
    let (all, error) = load_all::<Article>(&state, Resource::Articles, "articles").await;
    let data = ArticlesData {
        articles: catalog::filter_articles(&all, &query.search, query.status),
        stats: catalog::article_stats(&all),
        search: query.search,
        status: query.status,
    };
    PageView::render(activation, data, error)
}

/// `GET /articles/{id}`
pub async fn article(
    State(state): State<AppState>,
    Extension(activation): Extension<Activation>,
    Path(id): Path<String>,
) -> Json<PageView<ArticleDetail>> {
    let (article, error) = load_one::<Article>(&state, Resource::Articles, &id, "article").await;
    PageView::render(activation, ArticleDetail { article }, error)
}

/// `GET /articles/slug/{slug}`
pub async fn article_by_slug(
    State(state): State<AppState>,
    Extension(activation): Extension<Activation>,
    Path(slug): Path<String>,
) -> Json<PageView<ArticleDetail>> {
    let (all, error) = load_all::<Article>(&state, Resource::Articles, "article").await;
    let article = all.into_iter().find(|a| a.slug == slug);
    let error = error.or_else(|| article.is_none().then(|| "Article not found".to_owned()));
    PageView::render(activation, ArticleDetail { article }, error)
}

pub async fn create_article(State(state): State<AppState>, Json(body): Json<Value>) -> Result<impl IntoResponse, PageError> {
    Ok(created(create(&state, Resource::Articles, &body, "Failed to create article").await?))
}

pub async fn update_article(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<Value>) -> Mutation {
    update(&state, Resource::Articles, &id, UpdateMode::Patch, &body, "Failed to update article")
        .await
        .map(Json)
}

pub async fn delete_article(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, PageError> {
    delete(&state, Resource::Articles, &id, "Failed to delete article").await
}

/// `POST /articles/{id}/publish`: PATCH the full record with `published` flipped.
pub async fn toggle_publish(State(state): State<AppState>, Path(id): Path<String>) -> Mutation {
    let record = fetch_raw(&state, Resource::Articles, &id, "Failed to load article").await?;
    let body = catalog::toggled(&record, "published");
    update(&state, Resource::Articles, &id, UpdateMode::Patch, &body, "Failed to update article")
        .await
        .map(Json)
}

// =============================================================================
// PROGRAMS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProgramsData {
    pub programs: Vec<Program>,
    pub stats: ProgramStats,
}

#[derive(Debug, Serialize)]
pub struct ProgramDetail {
    pub program: Option<Program>,
}

/// `GET /programs`
pub async fn programs(
    State(state): State<AppState>,
    Extension(activation): Extension<Activation>,
) -> Json<PageView<ProgramsData>> {
    let (programs, error) = load_all::<Program>(&state, Resource::Programs, "programs").await;
    let stats = catalog::program_stats(&programs);
    PageView::render(activation, ProgramsData { programs, stats }, error)
}

/// `GET /programs/{id}`
pub async fn program(
    State(state): State<AppState>,
    Extension(activation): Extension<Activation>,
    Path(id): Path<String>,
) -> Json<PageView<ProgramDetail>> {
    let (program, error) = load_one::<Program>(&state, Resource::Programs, &id, "program").await;
    PageView::render(activation, ProgramDetail { program }, error)
}

pub async fn create_program(State(state): State<AppState>, Json(body): Json<Value>) -> Result<impl IntoResponse, PageError> {
    Ok(created(create(&state, Resource::Programs, &body, "Failed to create program").await?))
}

pub async fn update_program(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<Value>) -> Mutation {
    update(&state, Resource::Programs, &id, UpdateMode::Patch, &body, "Failed to update program")
        .await
        .map(Json)
}

pub async fn delete_program(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, PageError> {
    delete(&state, Resource::Programs, &id, "Failed to delete program").await
}

// =============================================================================
// TEAM
// =============================================================================

#[derive(Debug, Serialize)]
pub struct TeamData {
    pub members: Vec<TeamMember>,
}

/// `GET /teams`: members in display order.
pub async fn teams(State(state): State<AppState>, Extension(activation): Extension<Activation>) -> Json<PageView<TeamData>> {
    let (mut members, error) = load_all::<TeamMember>(&state, Resource::TeamMembers, "team members").await;
    catalog::sort_team(&mut members);
    PageView::render(activation, TeamData { members }, error)
}

pub async fn create_team_member(State(state): State<AppState>, Json(body): Json<Value>) -> Result<impl IntoResponse, PageError> {
    Ok(created(create(&state, Resource::TeamMembers, &body, "Failed to add team member").await?))
}

pub async fn update_team_member(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<Value>) -> Mutation {
    update(&state, Resource::TeamMembers, &id, UpdateMode::Put, &body, "Failed to update team member")
        .await
        .map(Json)
}

pub async fn delete_team_member(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, PageError> {
    delete(&state, Resource::TeamMembers, &id, "Failed to delete team member").await
}

// =============================================================================
// ROLES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RoleQuery {
    pub page: Option<u32>,
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Serialize)]
pub struct RolesData {
    pub roles: Vec<RoleRow>,
    /// Total roles across all backend pages.
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub page: u32,
    pub search: String,
}

/// `GET /roles`: one backend page of roles with member counts.
pub async fn roles(
    State(state): State<AppState>,
    Extension(activation): Extension<Activation>,
    Query(query): Query<RoleQuery>,
) -> Json<PageView<RolesData>> {
    let page_number = query.page.unwrap_or(1).max(1);
    let (page, mut error) = match load_page::<Role>(&state, Resource::Roles, Some(page_number)).await {
        Ok(page) => (page, None),
        Err(e) => {
            warn!(error = %e, "role page load failed");
            (Page { count: 0, next: None, previous: None, results: Vec::new() }, Some("Failed to fetch roles.".to_owned()))
        }
    };
    let (profiles, profile_error) = load_all::<Profile>(&state, Resource::Profiles, "profiles").await;
    error = error.or(profile_error);

    let data = RolesData {
        roles: catalog::role_rows(&page.results, &profiles, &query.search),
        count: page.count,
        next: page.next,
        previous: page.previous,
        page: page_number,
        search: query.search,
    };
    PageView::render(activation, data, error)
}

pub async fn create_role(State(state): State<AppState>, Json(body): Json<Value>) -> Result<impl IntoResponse, PageError> {
    Ok(created(create(&state, Resource::Roles, &body, "Failed to add role.").await?))
}

pub async fn update_role(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<Value>) -> Mutation {
    update(&state, Resource::Roles, &id, UpdateMode::Put, &body, "Failed to update role.")
        .await
        .map(Json)
}

pub async fn delete_role(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, PageError> {
    delete(&state, Resource::Roles, &id, "Failed to delete role.").await
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub filter: UserFilter,
}

#[derive(Debug, Serialize)]
pub struct UsersData {
    pub users: Vec<UserRow>,
    /// Counts over the unfiltered collection.
    pub counts: UserCounts,
    /// Role choices for the create and edit forms.
    pub roles: Vec<Role>,
    pub search: String,
    pub filter: UserFilter,
}

/// `GET /users`
pub async fn users(
    State(state): State<AppState>,
    Extension(activation): Extension<Activation>,
    Query(query): Query<UserQuery>,
) -> Json<PageView<UsersData>> {
    let (accounts, error) = load_all::<Account>(&state, Resource::Users, "users").await;
    let (profiles, profile_error) = load_all::<Profile>(&state, Resource::Profiles, "profiles").await;
    let (roles, role_error) = load_all::<Role>(&state, Resource::Roles, "roles").await;

    let data = UsersData {
        users: catalog::user_rows(&accounts, &profiles, &query.search, query.filter),
        counts: catalog::user_counts(&accounts),
        roles,
        search: query.search,
        filter: query.filter,
    };
    PageView::render(activation, data, error.or(profile_error).or(role_error))
}

/// `POST /users`: create the account, then the profile linking it to a role.
pub async fn create_user(State(state): State<AppState>, Json(mut body): Json<Value>) -> Result<impl IntoResponse, PageError> {
    let role_id = take_role_id(&mut body).ok_or_else(|| PageError::new(StatusCode::UNPROCESSABLE_ENTITY, "Please select a role"))?;

    let account = create(&state, Resource::Users, &body, "Failed to create user").await?;
    let profile = json!({ "user_id": account["id"], "role_id": role_id });
    if let Err(e) = create(&state, Resource::Profiles, &profile, "Failed to assign role").await {
        warn!(user_id = %account["id"], %role_id, "account created without a role profile");
        return Err(e);
    }
    Ok(created(account))
}

/// `PATCH /users/{id}`: update the account. A `role_id` in the body moves
/// the account's profile to that role, creating the profile if it is missing.
pub async fn update_user(State(state): State<AppState>, Path(id): Path<String>, Json(mut body): Json<Value>) -> Mutation {
    let role_id = take_role_id(&mut body);
    let account = update(&state, Resource::Users, &id, UpdateMode::Patch, &body, "Failed to update user").await?;

    if let Some(role_id) = role_id {
        let profiles = load_page::<Profile>(&state, Resource::Profiles, None)
            .await
            .map_err(|e| mutation_failed(&e, Resource::Profiles, "Failed to update role"))?;
        let owner = account["id"].as_i64().or_else(|| id.parse().ok());
        if let Some(profile) = profiles.results.iter().find(|p| Some(p.user) == owner) {
            update(
                &state,
                Resource::Profiles,
                &profile.id.to_string(),
                UpdateMode::Patch,
                &json!({ "role_id": role_id }),
                "Failed to update role",
            )
            .await?;
        } else {
            let profile = json!({ "user_id": owner, "role_id": role_id });
            create(&state, Resource::Profiles, &profile, "Failed to update role").await?;
        }
    }
    Ok(Json(account))
}

pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, PageError> {
    delete(&state, Resource::Users, &id, "Failed to delete user").await
}

/// `POST /users/{id}/active`: flip `is_active`.
pub async fn toggle_active(State(state): State<AppState>, Path(id): Path<String>) -> Mutation {
    let record = fetch_raw(&state, Resource::Users, &id, "Failed to load user").await?;
    let flipped = catalog::toggled(&record, "is_active");
    let body = json!({ "is_active": flipped["is_active"] });
    update(&state, Resource::Users, &id, UpdateMode::Patch, &body, "Failed to update user")
        .await
        .map(Json)
}

/// Remove a non-null `role_id` from a request body.
fn take_role_id(body: &mut Value) -> Option<Value> {
    body.as_object_mut()
        .and_then(|fields| fields.remove("role_id"))
        .filter(|v| !v.is_null())
}

// =============================================================================
// HEADER SETTINGS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HeaderSettingsData {
    pub settings: HeaderSettings,
}

/// `GET /header-settings`: the first settings row, or defaults when none exist.
pub async fn header_settings(
    State(state): State<AppState>,
    Extension(activation): Extension<Activation>,
) -> Json<PageView<HeaderSettingsData>> {
    let (rows, error) = load_all::<HeaderSettings>(&state, Resource::HeaderSettings, "header settings").await;
    let settings = rows.into_iter().next().unwrap_or_default();
    PageView::render(activation, HeaderSettingsData { settings }, error)
}

pub async fn update_header_settings(State(state): State<AppState>, Json(body): Json<Value>) -> Mutation {
    update(
        &state,
        Resource::HeaderSettings,
        HEADER_SETTINGS_ID,
        UpdateMode::Patch,
        &body,
        "Failed to update header settings",
    )
    .await
    .map(Json)
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;

//! Catalog: list shaping for the protected pages.
//!
//! DESIGN
//! ======
//! The backend returns whole collections; searching, status filters, stats,
//! and the role lookups the user and role screens show are computed here,
//! as plain functions over decoded records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::types::{Account, Article, Profile, Program, Role, TeamMember};

/// Label shown for an account without a profile or without a role.
pub const NO_ROLE: &str = "No Role";

fn matches(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

// =============================================================================
// ARTICLES
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    All,
    Published,
    Drafts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArticleStats {
    pub total: usize,
    pub published: usize,
    pub drafts: usize,
}

#[must_use]
pub fn article_stats(articles: &[Article]) -> ArticleStats {
    let published = articles.iter().filter(|a| a.published).count();
    ArticleStats { total: articles.len(), published, drafts: articles.len() - published }
}

/// Case-insensitive search over title, content, and author name, then the
/// status filter. An empty search matches everything.
#[must_use]
pub fn filter_articles(articles: &[Article], search: &str, status: ArticleStatus) -> Vec<Article> {
    let needle = search.to_lowercase();
    articles
        .iter()
        .filter(|a| {
            needle.is_empty()
                || matches(&a.title, &needle)
                || matches(&a.content, &needle)
                || a.author_name.as_deref().is_some_and(|name| matches(name, &needle))
        })
        .filter(|a| match status {
            ArticleStatus::All => true,
            ArticleStatus::Published => a.published,
            ArticleStatus::Drafts => !a.published,
        })
        .cloned()
        .collect()
}

// =============================================================================
// PROGRAMS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgramStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

#[must_use]
pub fn program_stats(programs: &[Program]) -> ProgramStats {
    let active = programs.iter().filter(|p| p.active).count();
    ProgramStats { total: programs.len(), active, inactive: programs.len() - active }
}

// =============================================================================
// TEAM
// =============================================================================

/// Display order: ascending `order`, ties kept in backend order.
pub fn sort_team(members: &mut [TeamMember]) {
    members.sort_by_key(|m| m.order);
}

// =============================================================================
// ROLES
// =============================================================================

#[must_use]
pub fn filter_roles(roles: &[Role], search: &str) -> Vec<Role> {
    let needle = search.to_lowercase();
    roles
        .iter()
        .filter(|r| needle.is_empty() || matches(&r.name, &needle) || matches(&r.description, &needle))
        .cloned()
        .collect()
}

/// Number of profiles that carry `role_id`.
#[must_use]
pub fn role_member_count(role_id: i64, profiles: &[Profile]) -> usize {
    profiles
        .iter()
        .filter(|p| p.role.as_ref().is_some_and(|r| r.id == role_id))
        .count()
}

/// A role row as the roles page shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleRow {
    #[serde(flatten)]
    pub role: Role,
    pub members: usize,
}

#[must_use]
pub fn role_rows(roles: &[Role], profiles: &[Profile], search: &str) -> Vec<RoleRow> {
    filter_roles(roles, search)
        .into_iter()
        .map(|role| RoleRow { members: role_member_count(role.id, profiles), role })
        .collect()
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserFilter {
    #[default]
    All,
    /// Staff accounts.
    Admin,
    /// Non-staff accounts.
    User,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserCounts {
    pub total: usize,
    pub admins: usize,
    pub users: usize,
}

#[must_use]
pub fn user_counts(accounts: &[Account]) -> UserCounts {
    let admins = accounts.iter().filter(|a| a.is_staff).count();
    UserCounts { total: accounts.len(), admins, users: accounts.len() - admins }
}

/// Role name for `user_id` from the first profile that links to it.
#[must_use]
pub fn role_name_for(user_id: i64, profiles: &[Profile]) -> String {
    profiles
        .iter()
        .find(|p| p.user == user_id)
        .and_then(|p| p.role.as_ref())
        .map_or_else(|| NO_ROLE.to_owned(), |r| r.name.clone())
}

/// An account row as the users page shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRow {
    #[serde(flatten)]
    pub account: Account,
    pub role_name: String,
}

/// Search over username, email, and "first last", then the staff filter.
#[must_use]
pub fn user_rows(accounts: &[Account], profiles: &[Profile], search: &str, filter: UserFilter) -> Vec<UserRow> {
    let needle = search.to_lowercase();
    accounts
        .iter()
        .filter(|a| {
            needle.is_empty()
                || matches(&a.username, &needle)
                || matches(&a.email, &needle)
                || matches(&format!("{} {}", a.first_name, a.last_name), &needle)
        })
        .filter(|a| match filter {
            UserFilter::All => true,
            UserFilter::Admin => a.is_staff,
            UserFilter::User => !a.is_staff,
        })
        .map(|a| UserRow { account: a.clone(), role_name: role_name_for(a.id, profiles) })
        .collect()
}

// =============================================================================
// TOGGLES
// =============================================================================

/// Flip a boolean field on a full record, producing the update body.
/// A missing or non-boolean field counts as `false`.
#[must_use]
pub fn toggled(record: &Value, field: &str) -> Value {
    let mut body = record.clone();
    let current = body.get(field).and_then(Value::as_bool).unwrap_or(false);
    if let Value::Object(fields) = &mut body {
        fields.insert(field.to_owned(), Value::Bool(!current));
    }
    body
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;

//! Wire DTOs for the backend's REST surface.
//!
//! DESIGN
//! ======
//! Content records decode leniently: container-level `#[serde(default)]`
//! fills omitted fields, and every column the backend declares nullable is
//! an `Option` so an explicit `null` decodes too. Unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::session::SessionUser;

use super::BackendError;

// =============================================================================
// AUTH
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Optional role; sent as `null` when not chosen.
    pub role_id: Option<i64>,
}

/// Successful login/registration response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: SessionUser,
}

// =============================================================================
// LISTS
// =============================================================================

/// A list response as the backend sends it: paginated or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Plain(Vec<T>),
    Paginated {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
        results: Vec<T>,
    },
}

impl<T> Listing<T> {
    /// Normalize to a [`Page`]. Missing counts fall back to the result length.
    #[must_use]
    pub fn into_page(self) -> Page<T> {
        match self {
            Self::Plain(results) => Page { count: results.len() as u64, next: None, previous: None, results },
            Self::Paginated { count, next, previous, results } => {
                Page { count: count.unwrap_or(results.len() as u64), next, previous, results }
            }
        }
    }
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total records across all pages.
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl Page<Value> {
    /// Decode every result into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Decode`] if any result has the wrong shape.
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<Page<T>, BackendError> {
        let results = self
            .results
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Page { count: self.count, next: self.next, previous: self.previous, results })
    }
}

// =============================================================================
// CONTENT RECORDS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_name: Option<String>,
    /// Hosted image URL from the image upload service.
    pub image_url: Option<String>,
    /// Free-form display date chosen by the author (e.g. "May 20, 2025").
    pub date: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub published: bool,
    pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Program {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub order: i64,
    pub active: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamMember {
    pub id: Option<i64>,
    pub name: String,
    pub role: String,
    /// Hosted photo URL.
    pub photo: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    /// Display position; lower comes first.
    pub order: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Links an account to its (optional) role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub id: i64,
    /// Account id.
    pub user: i64,
    pub role: Option<Role>,
}

/// A backend account row as listed by `/api/users/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: Option<String>,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderSettings {
    pub id: Option<i64>,
    pub site_title: String,
    pub site_subtitle: Option<String>,
    pub header_logo_url: Option<String>,
    pub header_background_color: String,
    pub header_text_color: String,
    pub show_header: bool,
}

impl Default for HeaderSettings {
    fn default() -> Self {
        Self {
            id: None,
            site_title: "Your Site Title".to_owned(),
            site_subtitle: None,
            header_logo_url: None,
            header_background_color: "#ffffff".to_owned(),
            header_text_color: "#000000".to_owned(),
            show_header: true,
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

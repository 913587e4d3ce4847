//! Session store: who is logged in to the dashboard host.
//!
//! ARCHITECTURE
//! ============
//! The session is a `(token, user)` pair persisted under two storage keys and
//! mirrored in memory for cheap display reads. Storage is authoritative:
//! `is_authenticated` re-derives from storage on every call, and
//! `revalidate` brings the mirror back in line after out-of-band changes
//! (another host clearing the file, a hand edit).
//!
//! ERROR HANDLING
//! ==============
//! Nothing here returns an error. Storage failures and corrupt entries are
//! logged and degrade to "no session".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::Storage;

/// Storage key holding the opaque bearer token.
pub const TOKEN_KEY: &str = "auth_token";
/// Storage key holding the JSON-encoded [`SessionUser`].
pub const USER_KEY: &str = "auth_user";

/// The authenticated staff user as returned by the backend's auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Backend user identifier.
    pub id: i64,
    /// Login name.
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Staff members may use the admin dashboard.
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    /// Backend profile blob, kept verbatim for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct Mirror {
    token: Option<String>,
    user: Option<SessionUser>,
}

/// Single source of truth for the current session. Shared via `Arc`.
pub struct SessionStore {
    storage: Arc<dyn Storage>,
    mirror: RwLock<Mirror>,
    ready: AtomicBool,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage, mirror: RwLock::new(Mirror::default()), ready: AtomicBool::new(false) }
    }

    /// Resolve the persisted session into the in-memory mirror.
    ///
    /// A stored user blob that does not parse (or a storage read failure)
    /// clears both entries. Sets the ready flag once resolution finishes.
    pub fn initialize(&self) {
        match self.read_pair() {
            Ok((Some(token), Some(raw_user))) if !token.is_empty() && !raw_user.is_empty() => {
                match serde_json::from_str::<SessionUser>(&raw_user) {
                    Ok(user) => {
                        info!(user_id = user.id, username = %user.username, "restored persisted session");
                        self.set_mirror(Some(token), Some(user));
                    }
                    Err(e) => {
                        warn!(error = %e, "stored session user is corrupt; discarding session");
                        self.clear_storage();
                        self.set_mirror(None, None);
                    }
                }
            }
            Ok(_) => {
                debug!("no persisted session");
                self.set_mirror(None, None);
            }
            Err(e) => {
                warn!(error = %e, "session storage unreadable; discarding session");
                self.clear_storage();
                self.set_mirror(None, None);
            }
        }
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Replace the session with `token` and `user`, in memory and in storage.
    pub fn login(&self, token: &str, user: &SessionUser) {
        self.set_mirror(Some(token.to_owned()), Some(user.clone()));

        if let Err(e) = self.storage.set_item(TOKEN_KEY, token) {
            warn!(error = %e, "failed to persist session token");
        }
        match serde_json::to_string(user) {
            Ok(raw) => {
                if let Err(e) = self.storage.set_item(USER_KEY, &raw) {
                    warn!(error = %e, "failed to persist session user");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode session user"),
        }
        info!(user_id = user.id, username = %user.username, "session started");
    }

    /// Drop the session from memory and storage. Safe to call when logged out.
    pub fn logout(&self) {
        let had_session = {
            let mirror = self.mirror.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            mirror.token.is_some()
        };
        self.set_mirror(None, None);
        self.clear_storage();
        if had_session {
            info!("session ended");
        }
    }

    /// True iff both storage entries are present and non-empty right now.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.stored_session().is_some()
    }

    /// Re-derive the session from storage and reconcile the mirror with it.
    ///
    /// Drops the mirror when storage no longer holds a session, and adopts
    /// the stored session whenever its token differs from the mirror's
    /// (mirror empty, or another host logged in as someone else).
    /// Returns the derived authentication state.
    pub fn revalidate(&self) -> bool {
        let Some((stored_token, stored_user)) = self.stored_session() else {
            self.drop_stale_mirror();
            return false;
        };

        let mirror_token = self.token();
        if mirror_token.as_deref() == Some(stored_token.as_str()) {
            return true;
        }
        match serde_json::from_str::<SessionUser>(&stored_user) {
            Ok(user) => {
                if mirror_token.is_some() {
                    info!(user_id = user.id, "session replaced outside this host; adopting stored identity");
                } else {
                    debug!(user_id = user.id, "adopting session written outside this host");
                }
                self.set_mirror(Some(stored_token), Some(user));
            }
            Err(e) => {
                warn!(error = %e, "stored session user is corrupt; dropping cached identity");
                self.set_mirror(None, None);
            }
        }
        true
    }

    fn drop_stale_mirror(&self) {
        if self.token().is_some() {
            info!("session cleared outside this host; dropping cached identity");
            self.set_mirror(None, None);
        }
    }

    /// Whether `initialize` has finished resolving the persisted session.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        let mirror = self.mirror.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        mirror.user.clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        let mirror = self.mirror.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        mirror.token.clone()
    }

    /// The stored `(token, raw user)` pair when both are present and non-empty.
    fn stored_session(&self) -> Option<(String, String)> {
        match self.read_pair() {
            Ok((Some(token), Some(user))) if !token.is_empty() && !user.is_empty() => Some((token, user)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "session storage unreadable; treating as logged out");
                None
            }
        }
    }

    fn read_pair(&self) -> Result<(Option<String>, Option<String>), crate::storage::StorageError> {
        let token = self.storage.get_item(TOKEN_KEY)?;
        let user = self.storage.get_item(USER_KEY)?;
        Ok((token, user))
    }

    fn set_mirror(&self, token: Option<String>, user: Option<SessionUser>) {
        let mut mirror = self.mirror.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        mirror.token = token;
        mirror.user = user;
    }

    fn clear_storage(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove_item(key) {
                warn!(error = %e, key, "failed to clear session entry");
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

//! Credential exchange: turn operator-entered credentials into a session.
//!
//! ARCHITECTURE
//! ============
//! Both flows validate locally, issue exactly one backend request, and on
//! success hand `(token, user)` to the [`SessionStore`]. On any failure the
//! session store is left untouched and the caller gets a display message.
//!
//! Each form also carries a small state machine (`idle → submitting →
//! idle-with-error | done`) so a second submit while one is in flight is
//! refused instead of sending a duplicate request.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::types::{AuthPayload, LoginRequest, RegisterRequest};
use crate::backend::{Backend, BackendError};
use crate::services::session::{SessionStore, SessionUser};

pub const MIN_PASSWORD_LEN: usize = 8;

const LOGIN_FALLBACK: &str = "Invalid credentials";
const LOGIN_NETWORK: &str = "Network error. Please try again. Make sure the backend server is running.";
const REGISTER_FALLBACK: &str = "Registration failed";
const REGISTER_NETWORK: &str = "Network error. Please try again.";

// =============================================================================
// FORMS
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "confirmPassword")]
    pub confirm_password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role_id: Option<i64>,
}

/// Local validation failures. Never reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please fill in all required fields")]
    MissingFields,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("Please enter a valid email address")]
    InvalidEmail,
}

impl LoginForm {
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingFields`] if either field is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ValidationError::MissingFields);
        }
        Ok(())
    }
}

impl RegistrationForm {
    /// Checks run in order; the first failure wins.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] the form trips.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() || self.password.is_empty() || self.email.is_empty() {
            return Err(ValidationError::MissingFields);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }

    fn to_request(&self) -> RegisterRequest {
        RegisterRequest {
            username: self.username.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role_id: self.role_id,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Why an exchange did not produce a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    /// The backend refused; carries its status and the message to show.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// The backend could not be reached or answered nonsense.
    #[error("{0}")]
    Network(String),
    /// Another submission of the same form is still in flight.
    #[error("A request is already in progress")]
    Busy,
}

#[derive(Debug, Clone, Copy)]
enum Flow {
    Login,
    Register,
}

impl Flow {
    fn fallback(self) -> &'static str {
        match self {
            Self::Login => LOGIN_FALLBACK,
            Self::Register => REGISTER_FALLBACK,
        }
    }

    fn network(self) -> &'static str {
        match self {
            Self::Login => LOGIN_NETWORK,
            Self::Register => REGISTER_NETWORK,
        }
    }
}

fn classify(flow: Flow, err: &BackendError) -> ExchangeError {
    match err {
        BackendError::Rejected { status, .. } => ExchangeError::Rejected {
            status: *status,
            message: err.backend_message().unwrap_or(flow.fallback()).to_owned(),
        },
        BackendError::Network(_) | BackendError::Decode(_) | BackendError::ClientBuild(_) => {
            ExchangeError::Network(flow.network().to_owned())
        }
    }
}

// =============================================================================
// FORM STATE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    #[default]
    Idle,
    Submitting,
}

/// Snapshot of a form's submission state, as shown to the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormState {
    pub phase: FormPhase,
    pub error: Option<String>,
}

impl FormState {
    /// Enter `submitting`. Returns false if a submission is already running.
    pub fn begin(&mut self) -> bool {
        if self.phase == FormPhase::Submitting {
            return false;
        }
        self.phase = FormPhase::Submitting;
        self.error = None;
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = FormPhase::Idle;
        self.error = Some(message.into());
    }

    pub fn succeed(&mut self) {
        self.phase = FormPhase::Idle;
        self.error = None;
    }
}

/// Shared, lockable form state.
pub type SharedForm = Arc<Mutex<FormState>>;

fn with_form<R>(form: &SharedForm, f: impl FnOnce(&mut FormState) -> R) -> R {
    let mut state = form.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    f(&mut state)
}

/// An in-flight submission. Dropping it unsettled (the request future was
/// abandoned) puts the form back to idle so it can be resubmitted.
struct Submission<'a> {
    form: &'a SharedForm,
    settled: bool,
}

impl<'a> Submission<'a> {
    fn start(form: &'a SharedForm) -> Option<Self> {
        with_form(form, FormState::begin).then(|| Self { form, settled: false })
    }

    fn fail(mut self, message: String) {
        with_form(self.form, |s| s.fail(message));
        self.settled = true;
    }

    fn succeed(mut self) {
        with_form(self.form, FormState::succeed);
        self.settled = true;
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            with_form(self.form, |s| s.phase = FormPhase::Idle);
        }
    }
}

// =============================================================================
// EXCHANGE
// =============================================================================

/// Runs login and registration against the backend and records the result
/// in the session store.
#[derive(Clone)]
pub struct CredentialExchange {
    backend: Arc<dyn Backend>,
    session: Arc<SessionStore>,
    login_form: SharedForm,
    register_form: SharedForm,
}

impl CredentialExchange {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, session: Arc<SessionStore>) -> Self {
        Self { backend, session, login_form: SharedForm::default(), register_form: SharedForm::default() }
    }

    #[must_use]
    pub fn login_state(&self) -> FormState {
        with_form(&self.login_form, |s| s.clone())
    }

    #[must_use]
    pub fn register_state(&self) -> FormState {
        with_form(&self.register_form, |s| s.clone())
    }

    /// Log in with `form`. On success the session store holds the new session.
    ///
    /// # Errors
    ///
    /// Returns an [`ExchangeError`] describing what to show the operator.
    pub async fn login(&self, form: &LoginForm) -> Result<SessionUser, ExchangeError> {
        let Some(submission) = Submission::start(&self.login_form) else {
            return Err(ExchangeError::Busy);
        };
        if let Err(e) = form.validate() {
            submission.fail(e.to_string());
            return Err(e.into());
        }

        let request = LoginRequest { username: form.username.clone(), password: form.password.clone() };
        let result = self.backend.login(&request).await;
        self.settle(Flow::Login, submission, &form.username, result)
    }

    /// Register a new account with `form`, then log it in.
    ///
    /// # Errors
    ///
    /// Returns an [`ExchangeError`] describing what to show the operator.
    pub async fn register(&self, form: &RegistrationForm) -> Result<SessionUser, ExchangeError> {
        let Some(submission) = Submission::start(&self.register_form) else {
            return Err(ExchangeError::Busy);
        };
        if let Err(e) = form.validate() {
            submission.fail(e.to_string());
            return Err(e.into());
        }

        let result = self.backend.register(&form.to_request()).await;
        self.settle(Flow::Register, submission, &form.username, result)
    }

    fn settle(
        &self,
        flow: Flow,
        submission: Submission<'_>,
        username: &str,
        result: Result<AuthPayload, BackendError>,
    ) -> Result<SessionUser, ExchangeError> {
        match result {
            Ok(payload) => {
                self.session.login(&payload.token, &payload.user);
                submission.succeed();
                info!(?flow, user_id = payload.user.id, "credential exchange succeeded");
                Ok(payload.user)
            }
            Err(e) => {
                warn!(?flow, %username, error = %e, "credential exchange failed");
                let err = classify(flow, &e);
                submission.fail(err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;

//! Identity capability and the persisted sign-in session.
//!
//! The chat core never depends on this module. [`IdentityProvider`] is the
//! seam a real identity service plugs into; [`DemoIdentityProvider`] is an
//! in-memory stand-in seeded with a single demo account.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use crate::core::store::Persistence;
use crate::utils::ids::generate_id;

pub const DEMO_EMAIL: &str = "demo@samvadgpt.com";
pub const DEMO_PASSWORD: &str = "demo123";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignupCredentials {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    PasswordMismatch,
    EmailTaken,
    InvalidEmail(String),
    MissingField(&'static str),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::PasswordMismatch => write!(f, "Passwords do not match"),
            AuthError::EmailTaken => write!(f, "Email already exists"),
            AuthError::InvalidEmail(email) => write!(f, "'{email}' is not a valid email address"),
            AuthError::MissingField(field) => write!(f, "{field} is required"),
        }
    }
}

impl StdError for AuthError {}

/// Turns credentials into a user. Implementations decide where accounts live.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> Result<User, AuthError>;
    async fn signup(&self, credentials: &SignupCredentials) -> Result<User, AuthError>;
}

struct StoredUser {
    user: User,
    password: String,
}

/// Accounts held in memory for the life of the process.
pub struct DemoIdentityProvider {
    users: Mutex<Vec<StoredUser>>,
}

impl Default for DemoIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoIdentityProvider {
    pub fn new() -> Self {
        let created_at = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            users: Mutex::new(vec![StoredUser {
                user: User {
                    id: "1".to_string(),
                    name: "Demo User".to_string(),
                    email: DEMO_EMAIL.to_string(),
                    created_at,
                },
                password: DEMO_PASSWORD.to_string(),
            }]),
        }
    }

    pub fn user_count(&self) -> usize {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::MissingField("Email"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_ascii_lowercase())
        }
        _ => Err(AuthError::InvalidEmail(email.to_string())),
    }
}

#[async_trait]
impl IdentityProvider for DemoIdentityProvider {
    async fn login(&self, credentials: &LoginCredentials) -> Result<User, AuthError> {
        let email = normalize_email(&credentials.email)?;
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users
            .iter()
            .find(|stored| stored.user.email == email && stored.password == credentials.password)
            .map(|stored| stored.user.clone())
            .ok_or(AuthError::InvalidCredentials)
    }

    async fn signup(&self, credentials: &SignupCredentials) -> Result<User, AuthError> {
        let name = credentials.name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingField("Name"));
        }
        let email = normalize_email(&credentials.email)?;
        if credentials.password.is_empty() {
            return Err(AuthError::MissingField("Password"));
        }
        if credentials.password != credentials.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        if users.iter().any(|stored| stored.user.email == email) {
            return Err(AuthError::EmailTaken);
        }
        let user = User {
            id: generate_id(),
            name: name.to_string(),
            email,
            created_at: Utc::now(),
        };
        users.push(StoredUser {
            user: user.clone(),
            password: credentials.password.clone(),
        });
        Ok(user)
    }
}

/// The persisted portion of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub is_authenticated: bool,
}

pub struct AuthSession {
    state: AuthState,
    error: Option<String>,
    has_hydrated: bool,
    persistence: Option<Box<dyn Persistence<AuthState>>>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    pub fn new() -> Self {
        Self {
            state: AuthState::default(),
            error: None,
            has_hydrated: false,
            persistence: None,
        }
    }

    pub fn open(persistence: impl Persistence<AuthState> + 'static) -> Self {
        let mut state = match persistence.load() {
            Ok(state) => state.unwrap_or_default(),
            Err(err) => {
                warn!("discarding unreadable auth snapshot: {err}");
                AuthState::default()
            }
        };
        // A flag without a user cannot be honoured.
        state.is_authenticated = state.is_authenticated && state.user.is_some();

        Self {
            state,
            has_hydrated: true,
            persistence: Some(Box::new(persistence)),
            ..Self::new()
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn current_user(&self) -> Option<&User> {
        self.state.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated
    }

    pub fn has_hydrated(&self) -> bool {
        self.has_hydrated
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub async fn login(
        &mut self,
        provider: &dyn IdentityProvider,
        credentials: &LoginCredentials,
    ) -> Result<User, AuthError> {
        let result = provider.login(credentials).await;
        self.settle(result)
    }

    pub async fn signup(
        &mut self,
        provider: &dyn IdentityProvider,
        credentials: &SignupCredentials,
    ) -> Result<User, AuthError> {
        let result = provider.signup(credentials).await;
        self.settle(result)
    }

    pub fn logout(&mut self) {
        self.state = AuthState::default();
        self.error = None;
        self.persist();
    }

    /// Replace the signed-in user directly. `None` signs out.
    pub fn set_user(&mut self, user: Option<User>) {
        self.state.is_authenticated = user.is_some();
        self.state.user = user;
        self.persist();
    }

    fn settle(&mut self, result: Result<User, AuthError>) -> Result<User, AuthError> {
        match result {
            Ok(user) => {
                debug!(user_id = %user.id, "signed in");
                self.error = None;
                self.set_user(Some(user.clone()));
                Ok(user)
            }
            Err(err) => {
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn persist(&self) {
        if let Some(persistence) = &self.persistence {
            if let Err(err) = persistence.save(&self.state) {
                warn!("failed to persist auth snapshot: {err}");
            }
        }
    }
}

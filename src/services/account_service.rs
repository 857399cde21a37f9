use crate::domain::auth::{AuthenticatedUser, TokenPair};
use crate::domain::user::{NewUser, User};
use crate::error::{AppError, Result};
use crate::services::session_service::SessionService;
use crate::services::user_repository::UserRepository;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use opentelemetry::{global, metrics::Counter};
use rand::rngs::OsRng;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Hash checked when the email is unknown, so that path costs as much as a wrong password.
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default().hash_password(b"not-a-real-password", &salt).ok().map(|h| h.to_string())
});

#[derive(Clone)]
struct AccountMetrics {
    users_registered_total: Counter<u64>,
    login_total: Counter<u64>,
}

impl AccountMetrics {
    fn new() -> Self {
        let meter = global::meter("astral-server");
        Self {
            users_registered_total: meter
                .u64_counter("users_registered_total")
                .with_description("Total number of successful user registrations")
                .build(),
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful login attempts")
                .build(),
        }
    }
}

/// Registration, credential checks and user lookup. Hands off to
/// [`SessionService`] once a user has proven who they are.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    sessions: SessionService,
    metrics: AccountMetrics,
}

impl fmt::Debug for AccountService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountService").field("users", &self.users).finish_non_exhaustive()
    }
}

impl AccountService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, sessions: SessionService) -> Self {
        Self { users, sessions, metrics: AccountMetrics::new() }
    }

    /// # Errors
    /// Returns `BadRequest` for blank fields and `Conflict` if the email is taken.
    #[tracing::instrument(
        skip(self, username, email, password),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let username = username.trim();
        let email = normalize_email(email);
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::BadRequest("username, email and password are required".to_string()));
        }
        if !email.contains('@') {
            return Err(AppError::BadRequest("email is not valid".to_string()));
        }

        let password_hash = hash_password(password).await?;
        let user = self.users.create(NewUser { username: username.to_string(), email, password_hash }).await?;

        tracing::Span::current().record("user_id", user.id);
        tracing::info!("User registered successfully");
        self.metrics.users_registered_total.add(1, &[]);

        Ok(user)
    }

    /// Checks credentials and issues a fresh token pair.
    ///
    /// # Errors
    /// Returns `Unauthorized` for an unknown email or a wrong password.
    #[tracing::instrument(
        skip(self, email, password),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        let Some(user) = self.users.find_by_email(&normalize_email(email)).await? else {
            verify_against_dummy(password).await;
            tracing::warn!("Login failed: user not found");
            return Err(AppError::Unauthorized);
        };

        tracing::Span::current().record("user_id", user.id);

        if !verify_password(password, &user.password_hash).await? {
            tracing::warn!("Login failed: invalid password");
            return Err(AppError::Unauthorized);
        }

        let pair = self.sessions.issue_token_pair(user.id).await?;
        self.metrics.login_total.add(1, &[]);
        Ok(pair)
    }

    /// # Errors
    /// Returns `NotFound` if the user no longer exists.
    pub async fn profile(&self, user_id: i64) -> Result<User> {
        self.users.find_by_id(user_id).await?.ok_or(AppError::NotFound)
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.users.list().await
    }

    /// Deletes the caller's own account and ends the session it used.
    ///
    /// # Errors
    /// Returns `Forbidden` for any account but the caller's, and `NotFound` if it is already gone.
    #[tracing::instrument(skip(self, caller), fields(user_id = caller.user_id), err(level = "warn"))]
    pub async fn delete_account(&self, caller: &AuthenticatedUser, user_id: i64) -> Result<()> {
        if caller.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        if !self.users.delete(user_id).await? {
            return Err(AppError::NotFound);
        }

        match self.sessions.revoke(&caller.session_id).await {
            Ok(()) | Err(AppError::NotFound) => {}
            Err(e) => return Err(e),
        }
        tracing::info!("User deleted");
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| AppError::Internal)
            .map(|h| h.to_string())
    })
    .await
    .map_err(|_| AppError::Internal)?
}

async fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash).map_err(|_| AppError::Internal)?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
    })
    .await
    .map_err(|_| AppError::Internal)?
}

async fn verify_against_dummy(password: &str) {
    let password = password.to_string();
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_PASSWORD_HASH.as_deref()
            && let Ok(parsed_hash) = PasswordHash::new(hash)
        {
            let _ = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
        }
    })
    .await;
}

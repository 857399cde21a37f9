use crate::domain::user::{NewUser, User};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence of user accounts. Only consulted to resolve credentials and profiles;
/// the session machinery never touches it.
#[async_trait]
pub trait UserRepository: Send + Sync + std::fmt::Debug {
    /// Inserts a user. Emails are unique.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the email is taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Every user, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    async fn list(&self) -> Result<Vec<User>>;

    /// Removes a user. Returns `false` if there was no such user.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the delete fails.
    async fn delete(&self, id: i64) -> Result<bool>;
}

use crate::domain::user::User;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) registered_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
            registered_at: record.registered_at,
        }
    }
}

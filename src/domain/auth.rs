use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Which half of a token pair a token or session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed payload of both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: i64,
    pub session_id: String,
    pub kind: TokenKind,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

impl TokenClaims {
    #[must_use]
    pub fn new(
        user_id: i64,
        session_id: String,
        kind: TokenKind,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self { user_id, session_id, kind, iat: issued_at.unix_timestamp(), exp: expires_at.unix_timestamp() }
    }
}

/// Freshly issued credentials. Never persisted; the session ids are kept for logout and logging.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_session_id: String,
    pub refresh_session_id: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_session_id", &self.access_session_id)
            .field("refresh_session_id", &self.refresh_session_id)
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}

/// The caller behind a verified access token with a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_wire_format() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let claims = TokenClaims::new(
            42,
            "4f9a0c1e-8a55-4b67-9a43-1b5c2f3d7e10".to_string(),
            TokenKind::Refresh,
            now,
            now + time::Duration::days(7),
        );

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["user_id"], 42);
        assert_eq!(json["session_id"], "4f9a0c1e-8a55-4b67-9a43-1b5c2f3d7e10");
        assert_eq!(json["kind"], "refresh");
        assert_eq!(json["exp"], 1_700_604_800);
    }

    #[test]
    fn test_token_pair_debug_hides_tokens() {
        let pair = TokenPair {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
            access_session_id: "a".into(),
            refresh_session_id: "r".into(),
            access_expires_at: 1,
            refresh_expires_at: 2,
        };
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }
}

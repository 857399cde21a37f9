use crate::config::AuthConfig;
use crate::domain::auth::{AuthenticatedUser, TokenClaims, TokenKind, TokenPair};
use crate::domain::clock::Clock;
use crate::error::{AppError, Result};
use crate::services::session_store::{SessionStore, StoreError};
use crate::services::token_codec::{TokenCodec, TokenError};
use opentelemetry::{global, metrics::Counter};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone)]
struct Metrics {
    refresh_total: Counter<u64>,
    refresh_replay_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("astral-server");
        Self {
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Total number of successful token rotations")
                .build(),
            refresh_replay_total: meter
                .u64_counter("auth_refresh_replay_total")
                .with_description("Refresh attempts with an already redeemed or revoked token")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Total number of successful logout attempts")
                .build(),
        }
    }
}

/// Issues, authenticates, rotates and revokes session-backed token pairs.
///
/// A token is only honoured while its session record exists in the store, so
/// deleting the record revokes the token before it expires.
#[derive(Clone)]
pub struct SessionService {
    codec: TokenCodec,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    store_timeout: Duration,
    metrics: Metrics,
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("store", &self.store)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionService {
    #[must_use]
    pub fn new(
        config: &AuthConfig,
        store_timeout: Duration,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec: TokenCodec::new(&config.access_secret, &config.refresh_secret, Arc::clone(&clock)),
            store,
            clock,
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
            store_timeout,
            metrics: Metrics::new(),
        }
    }

    /// Runs one store call under the per-call deadline.
    async fn bounded<T>(
        &self,
        op: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> std::result::Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }

    /// Mints a fresh pair and records both sessions.
    ///
    /// The writes run on their own task so that a dropped caller cannot leave
    /// an access session without its refresh session.
    ///
    /// # Errors
    /// Returns `Timeout`/`StoreUnavailable` if either session cannot be written.
    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn issue_token_pair(&self, user_id: i64) -> Result<TokenPair> {
        let service = self.clone();
        detached(async move { service.write_pair(user_id).await }).await
    }

    async fn write_pair(&self, user_id: i64) -> Result<TokenPair> {
        let now = self.clock.now();
        let access = TokenClaims::new(
            user_id,
            Uuid::new_v4().to_string(),
            TokenKind::Access,
            now,
            expiry(now, self.access_ttl)?,
        );
        let refresh = TokenClaims::new(
            user_id,
            Uuid::new_v4().to_string(),
            TokenKind::Refresh,
            now,
            expiry(now, self.refresh_ttl)?,
        );

        let access_token = self.codec.sign(&access)?;
        let refresh_token = self.codec.sign(&refresh)?;

        self.bounded(self.store.put(&access.session_id, user_id, self.access_ttl)).await?;

        if let Err(err) = self.bounded(self.store.put(&refresh.session_id, user_id, self.refresh_ttl)).await {
            if let Err(rollback) = self.bounded(self.store.delete(&access.session_id)).await {
                tracing::error!(error = %rollback, "Failed to roll back access session");
            }
            return Err(err.into());
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_session_id: access.session_id,
            refresh_session_id: refresh.session_id,
            access_expires_at: access.exp,
            refresh_expires_at: refresh.exp,
        })
    }

    /// Verifies an access token and checks that its session is still live.
    ///
    /// # Errors
    /// Returns `Unauthorized` for forged, expired, revoked or mismatched tokens, and
    /// `Timeout`/`StoreUnavailable` if the store cannot answer.
    #[tracing::instrument(
        skip(self, access_token),
        fields(user_id = tracing::field::Empty),
        err(level = "debug")
    )]
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser> {
        let claims = self.codec.verify(access_token, TokenKind::Access).map_err(|e| {
            tracing::debug!(reason = %e, "Access token rejected");
            AppError::from(e)
        })?;

        let owner = match self.bounded(self.store.get(&claims.session_id)).await {
            Ok(owner) => owner,
            Err(StoreError::NotFound) => {
                tracing::debug!("Access session is no longer live");
                return Err(AppError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };

        if owner != claims.user_id {
            tracing::warn!("Session owner does not match token claims");
            return Err(AppError::Unauthorized);
        }

        tracing::Span::current().record("user_id", owner);
        Ok(AuthenticatedUser { user_id: owner, session_id: claims.session_id })
    }

    /// Deletes a session.
    ///
    /// # Errors
    /// Returns `NotFound` if no live session had that id.
    #[tracing::instrument(skip(self, session_id), err(level = "debug"))]
    pub async fn revoke(&self, session_id: &str) -> Result<()> {
        match self.bounded(self.store.delete(session_id)).await? {
            0 => Err(AppError::NotFound),
            _ => Ok(()),
        }
    }

    /// Redeems a refresh token for a new pair. The old refresh session is revoked
    /// first, so each refresh token can be redeemed at most once.
    ///
    /// # Errors
    /// Returns `Unauthorized` if the token is invalid or was already redeemed.
    #[tracing::instrument(
        skip(self, refresh_token),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.codec.verify(refresh_token, TokenKind::Refresh).map_err(|e| {
            tracing::debug!(reason = %e, "Refresh token rejected");
            AppError::from(e)
        })?;
        tracing::Span::current().record("user_id", claims.user_id);

        let service = self.clone();
        let pair = detached(async move { service.rotate(claims).await }).await?;

        self.metrics.refresh_total.add(1, &[]);
        Ok(pair)
    }

    async fn rotate(&self, claims: TokenClaims) -> Result<TokenPair> {
        match self.revoke(&claims.session_id).await {
            Ok(()) => {}
            Err(AppError::NotFound) => {
                tracing::warn!("Refresh token already redeemed or revoked");
                self.metrics.refresh_replay_total.add(1, &[]);
                return Err(AppError::Unauthorized);
            }
            Err(e) => return Err(e),
        }

        self.write_pair(claims.user_id).await
    }

    /// Ends the session that authenticated `user` and, if given, the refresh
    /// session paired with it. An expired refresh token is skipped. Both revokes
    /// run on their own task, so a dropped caller cannot end only one of them.
    ///
    /// # Errors
    /// Returns `Unauthorized` if the refresh token is forged or belongs to another
    /// user, or the access session is already gone.
    #[tracing::instrument(skip(self, user, refresh_token), fields(user_id = user.user_id), err(level = "warn"))]
    pub async fn logout(&self, user: &AuthenticatedUser, refresh_token: Option<&str>) -> Result<()> {
        let refresh_session = match refresh_token.map(|token| self.codec.verify(token, TokenKind::Refresh)) {
            None | Some(Err(TokenError::Expired)) => None,
            Some(Ok(claims)) if claims.user_id == user.user_id => Some(claims.session_id),
            Some(Ok(_)) => {
                tracing::warn!("Refresh token belongs to another user");
                return Err(AppError::Unauthorized);
            }
            Some(Err(e)) => return Err(e.into()),
        };

        let service = self.clone();
        let access_session = user.session_id.clone();
        detached(async move { service.end_sessions(&access_session, refresh_session.as_deref()).await }).await?;

        self.metrics.logout_total.add(1, &[]);
        Ok(())
    }

    async fn end_sessions(&self, access_session: &str, refresh_session: Option<&str>) -> Result<()> {
        if let Some(session_id) = refresh_session {
            match self.revoke(session_id).await {
                Ok(()) | Err(AppError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        match self.revoke(access_session).await {
            Err(AppError::NotFound) => Err(AppError::Unauthorized),
            other => other,
        }
    }

    /// Checks that the session store answers within the deadline.
    ///
    /// # Errors
    /// Returns `Timeout` or `StoreUnavailable`.
    pub async fn ping(&self) -> Result<()> {
        self.bounded(self.store.ping()).await.map_err(Into::into)
    }
}

fn expiry(now: OffsetDateTime, ttl: Duration) -> Result<OffsetDateTime> {
    time::Duration::try_from(ttl).ok().and_then(|ttl| now.checked_add(ttl)).ok_or_else(|| {
        tracing::error!(ttl_secs = ttl.as_secs(), "Token expiry out of range");
        AppError::Internal
    })
}

/// Runs `fut` to completion on its own task, detached from the caller's cancellation.
async fn detached<T, F>(fut: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(fut.in_current_span()).await.map_err(|e| {
        tracing::error!(error = %e, "Session task failed");
        AppError::Internal
    })?
}

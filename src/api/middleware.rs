use crate::api::AppState;
use crate::domain::auth::AuthenticatedUser;
use crate::error::{AppError, Result};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

const BEARER_SCHEME: &str = "Bearer";

/// Extracts the credential from an `Authorization: Bearer <token>` header.
///
/// Anything other than exactly the scheme, one space and a non-empty token is rejected.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER_SCHEME), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Rejects requests without a live access session before they reach a handler.
///
/// # Errors
/// Returns `Unauthorized` for a missing, malformed or rejected credential, or
/// the store error if the session could not be checked.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response> {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        tracing::debug!(reason = "malformed_authorization_header", "Request rejected");
        return Err(AppError::Unauthorized);
    };

    let user = state.session_service.authenticate(&token).await.inspect_err(|e| {
        tracing::debug!(error_kind = %e, "Request rejected");
    })?;

    tracing::Span::current().record("user_id", user.user_id);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_accepted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Token abc")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer  abc")), None);
        assert_eq!(bearer_token(&headers("Bearer abc def")), None);
        assert_eq!(bearer_token(&headers("bearer abc")), None);
    }
}

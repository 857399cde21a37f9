use crate::domain::auth::{TokenClaims, TokenKind};
use crate::domain::clock::Clock;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The only algorithm tokens are signed with or accepted under.
const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature does not match")]
    SignatureInvalid,
    #[error("token declares an unexpected signing algorithm")]
    AlgorithmMismatch,
    #[error("token has expired")]
    Expired,
    #[error("expected a {expected} token")]
    KindMismatch { expected: TokenKind },
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::InvalidAlgorithm => Self::AlgorithmMismatch,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

#[derive(Clone)]
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &[u8]) -> Self {
        Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret) }
    }
}

/// Signs and verifies HS256 tokens. Access and refresh tokens use separate secrets,
/// so a leaked key for one kind cannot forge the other.
#[derive(Clone)]
pub struct TokenCodec {
    access: Keys,
    refresh: Keys,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").field("algorithm", &ALGORITHM).finish_non_exhaustive()
    }
}

impl TokenCodec {
    #[must_use]
    pub fn new(access_secret: &str, refresh_secret: &str, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        // Expiry is checked against the injected clock after decoding.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            access: Keys::from_secret(access_secret.as_bytes()),
            refresh: Keys::from_secret(refresh_secret.as_bytes()),
            validation,
            clock,
        }
    }

    const fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Signs `claims` with the secret belonging to `claims.kind`.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.keys(claims.kind).encoding).map_err(TokenError::Signing)
    }

    /// Verifies a token of the given kind and returns its claims. Never consults a store.
    ///
    /// # Errors
    /// - `Malformed` if the token cannot be parsed or lacks required claims
    /// - `AlgorithmMismatch` if the header declares anything but HS256
    /// - `SignatureInvalid` if the signature does not match the secret for `kind`
    /// - `KindMismatch` if a correctly signed token claims the other kind
    /// - `Expired` if the current time is past `exp`
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let header = decode_header(token).map_err(|_| TokenError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::AlgorithmMismatch);
        }

        let claims = decode::<TokenClaims>(token, &self.keys(kind).decoding, &self.validation)?.claims;

        if claims.kind != kind {
            return Err(TokenError::KindMismatch { expected: kind });
        }
        if self.clock.now().unix_timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

//! Upgrade gate: turn a bearer token into a verified [`Identity`].
//!
//! The hub only depends on [`IdentityVerifier`]; [`JwtVerifier`] is the
//! HS256 implementation the binary wires in.

use agora_core::{Identity, Role, UserId};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an upgrade was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Neither the `Authorization` header nor `?token=` carried a token.
    #[error("missing bearer token")]
    MissingToken,
    /// The token's `exp` has passed.
    #[error("token expired")]
    Expired,
    /// Bad signature, malformed token or wrong algorithm.
    #[error("invalid token: {0}")]
    Invalid(String),
    /// `sub` is not a user id.
    #[error("token subject {0:?} is not a user id")]
    InvalidSubject(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(e.to_string()),
        }
    }
}

/// Verifies credentials presented on upgrade.
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Resolve `token` to the identity it was issued for.
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Access token claims.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a decimal string.
    pub sub: String,
    /// Platform role; `user` when absent.
    #[serde(default)]
    pub role: Role,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

/// HS256 verifier over a shared secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Verifier for tokens signed with `secret`, tolerating `leeway_secs` of
    /// clock skew on `exp`.
    pub fn new(secret: &[u8], leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)?.claims;
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidSubject(claims.sub.clone()))?;
        Ok(Identity {
            user_id: UserId::new(user_id),
            role: claims.role,
        })
    }
}

/// Pull the bearer token from `Authorization: Bearer ..`, falling back to
/// the `token` query parameter.
pub fn bearer_token(headers: &HeaderMap, query_token: Option<&str>) -> Result<String, AuthError> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    from_header
        .or(query_token.filter(|t| !t.is_empty()))
        .map(str::to_owned)
        .ok_or(AuthError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &[u8] = b"test-secret-test-secret-test-secret";

    fn now() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap()
    }

    fn token(sub: &str, role: Option<&str>, exp: u64, secret: &[u8]) -> String {
        let mut claims = serde_json::json!({ "sub": sub, "exp": exp });
        if let Some(role) = role {
            claims["role"] = role.into();
        }
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn valid_token_yields_identity() {
        let verifier = JwtVerifier::new(SECRET, 0);
        let identity = verifier
            .verify(&token("42", Some("moderator"), now() + 600, SECRET))
            .unwrap();
        assert_eq!(identity.user_id, UserId::new(42));
        assert_eq!(identity.role, Role::Moderator);
    }

    #[test]
    fn role_defaults_to_user() {
        let verifier = JwtVerifier::new(SECRET, 0);
        let identity = verifier.verify(&token("7", None, now() + 600, SECRET)).unwrap();
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn expired_token_rejected() {
        let verifier = JwtVerifier::new(SECRET, 0);
        let err = verifier.verify(&token("7", None, now() - 600, SECRET)).unwrap_err();
        assert_eq!(err, AuthError::Expired);
    }

    #[test]
    fn leeway_admits_recently_expired() {
        let verifier = JwtVerifier::new(SECRET, 120);
        assert!(verifier.verify(&token("7", None, now() - 30, SECRET)).is_ok());
    }

    #[test]
    fn wrong_secret_rejected() {
        let verifier = JwtVerifier::new(SECRET, 0);
        let err = verifier
            .verify(&token("7", None, now() + 600, b"another-secret"))
            .unwrap_err();
        assert_matches!(err, AuthError::Invalid(_));
    }

    #[test]
    fn non_numeric_subject_rejected() {
        let verifier = JwtVerifier::new(SECRET, 0);
        let err = verifier
            .verify(&token("alice", None, now() + 600, SECRET))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidSubject("alice".into()));
    }

    #[test]
    fn garbage_rejected() {
        let verifier = JwtVerifier::new(SECRET, 0);
        assert_matches!(verifier.verify("not.a.jwt"), Err(AuthError::Invalid(_)));
    }

    #[test]
    fn header_token_preferred_over_query() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers, Some("xyz")).unwrap(), "abc");
    }

    #[test]
    fn query_token_used_without_header() {
        assert_eq!(bearer_token(&HeaderMap::new(), Some("xyz")).unwrap(), "xyz");
    }

    #[test]
    fn non_bearer_header_falls_back_to_query() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&headers, Some("xyz")).unwrap(), "xyz");
        assert_eq!(bearer_token(&headers, None), Err(AuthError::MissingToken));
    }

    #[test]
    fn empty_tokens_are_missing() {
        assert_eq!(bearer_token(&HeaderMap::new(), Some("")), Err(AuthError::MissingToken));
    }
}

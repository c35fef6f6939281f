//! Bearer-token validation for gateway handshakes.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried on a chat bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The authenticated identity attached to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
}

/// Why a connection attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No token in the handshake query or Authorization header.
    MissingCredential,
    /// Token failed signature, issuer, or expiry checks.
    InvalidCredential,
}

/// Pick the bearer token out of the handshake.
///
/// An explicit `token` query parameter wins; otherwise the Authorization
/// header, with or without a `Bearer ` prefix.
pub fn extract_token<'a>(
    query_token: Option<&'a str>,
    authorization: Option<&'a str>,
) -> Result<&'a str, AuthError> {
    if let Some(token) = query_token.filter(|t| !t.is_empty()) {
        return Ok(token);
    }
    if let Some(header) = authorization.filter(|h| !h.is_empty()) {
        return Ok(header.strip_prefix("Bearer ").unwrap_or(header));
    }
    Err(AuthError::MissingCredential)
}

/// Validate a bearer token and return its principal.
///
/// Checks the HS256 signature, `exp`, and `iss`. The failure detail stays in
/// the logs; callers close the connection without a payload.
pub fn verify_token(token: &str, secret: &str, issuer: &str) -> Result<Principal, AuthError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);

    let token_data =
        jsonwebtoken::decode::<TokenClaims>(token, &key, &validation).map_err(|e| {
            tracing::debug!(?e, "bearer token validation failed");
            AuthError::InvalidCredential
        })?;

    let claims = token_data.claims;
    Ok(Principal {
        user_id: claims.sub,
        username: claims.username,
        email: claims.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    const SECRET: &str = "test-secret";
    const ISSUER: &str = "chat-hub";

    fn mint(user_id: &str, issuer: &str, exp_offset_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iss: issuer.to_string(),
            sub: user_id.to_string(),
            iat: now,
            exp: now + exp_offset_secs,
            username: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode token")
    }

    #[test]
    fn valid_token_yields_principal() {
        let token = mint("usr_1", ISSUER, 3600);
        let principal = verify_token(&token, SECRET, ISSUER).expect("valid token");
        assert_eq!(principal.user_id, "usr_1");
        assert_eq!(principal.username, "alice");
        assert_eq!(principal.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint("usr_1", ISSUER, -3600);
        assert_eq!(
            verify_token(&token, SECRET, ISSUER),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let token = mint("usr_1", "somewhere-else", 3600);
        assert_eq!(
            verify_token(&token, SECRET, ISSUER),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("usr_1", ISSUER, 3600);
        assert_eq!(
            verify_token(&token, "other-secret", ISSUER),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert_eq!(
            verify_token("not-a-jwt", SECRET, ISSUER),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn extract_prefers_query_token() {
        let token = extract_token(Some("abc"), Some("Bearer xyz")).unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn extract_strips_bearer_prefix() {
        let token = extract_token(None, Some("Bearer xyz")).unwrap();
        assert_eq!(token, "xyz");
    }

    #[test]
    fn extract_accepts_bare_header() {
        let token = extract_token(None, Some("xyz")).unwrap();
        assert_eq!(token, "xyz");
    }

    #[test]
    fn extract_without_credentials_is_missing() {
        assert_eq!(extract_token(None, None), Err(AuthError::MissingCredential));
        assert_eq!(
            extract_token(Some(""), None),
            Err(AuthError::MissingCredential)
        );
    }
}

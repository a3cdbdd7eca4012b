//! Opaque session tokens, stored hashed at rest.

use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap, StatusCode,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::error;
use uuid::Uuid;

use super::SESSION_COOKIE;

#[derive(Debug)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

/// Only the hash is stored; a leaked sessions table cannot be replayed.
pub fn hash_session_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    Base64UrlUnpadded::encode_string(&digest)
}

/// Pull the session token from the `rollcall_session` cookie or a bearer header.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(cookies) = headers.get(COOKIE).and_then(|value| value.to_str().ok()) {
        for pair in cookies.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if parts.next() == Some(SESSION_COOKIE) {
                if let Some(value) = parts.next() {
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolve the presented token to an unexpired session row.
pub async fn authenticate_session(
    headers: &HeaderMap,
    pool: &PgPool,
) -> Result<Option<SessionRecord>, StatusCode> {
    let Some(token) = token_from_headers(headers) else {
        return Ok(None);
    };
    let hash = hash_session_token(&token);

    let query = r"
        SELECT u.id, u.email, u.role
        FROM user_sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.session_hash = $1 AND s.expires_at > NOW()
        LIMIT 1
    ";
    match sqlx::query(query).bind(&hash).fetch_optional(pool).await {
        Ok(row) => Ok(row.map(|row| SessionRecord {
            user_id: row.get("id"),
            email: row.get("email"),
            role: row.get("role"),
        })),
        Err(err) => {
            error!("Failed to resolve session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; rollcall_session=abc123; locale=en"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_cookie_value_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("rollcall_session="));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn missing_headers_yield_no_token() {
        let headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn hash_is_deterministic_and_not_identity() {
        let token = "not-a-real-token";
        let hash = hash_session_token(token);
        assert_eq!(hash, hash_session_token(token));
        assert_ne!(hash, token);
        assert_ne!(hash, hash_session_token("another-token"));
    }
}

use crate::domain::models::{Role, User};
use crate::state::SharedState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, HeaderValue, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "session";

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub user_id: String,
    pub role: Role,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

pub fn sign_session(user_id: &str, role: Role, key: &[u8], ttl_hours: i64) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(ttl_hours);
    sign_payload(user_id, role, exp.timestamp(), key)
}

fn sign_payload(user_id: &str, role: Role, exp: i64, key: &[u8]) -> Result<String, SessionError> {
    let payload = format!("{}|{}|{}", user_id, role.as_str(), exp);
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::Invalid)?;
    let payload_bytes = general_purpose::STANDARD
        .decode(payload_b64)
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(sig_b64)
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    // Access keys may contain '|', so split from the right.
    let mut pieces = payload.rsplitn(3, '|');
    let exp: i64 = pieces
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or(SessionError::Invalid)?;
    let role = parse_role(pieces.next().ok_or(SessionError::Invalid)?)?;
    let user_id = pieces.next().ok_or(SessionError::Invalid)?.to_string();

    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims { user_id, role, exp })
}

impl SessionClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                if let Some(rest) = pair.trim().strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

pub fn session_cookie(token: &str, secure: bool) -> Result<HeaderValue, StatusCode> {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{COOKIE_NAME}={token}; HttpOnly; SameSite=Lax; Path=/{secure_flag}")
        .parse()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn clear_cookie(secure: bool) -> HeaderValue {
    let secure_flag = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{COOKIE_NAME}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{secure_flag}"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("session=; Path=/; Max-Age=0"))
}

fn parse_role(raw: &str) -> Result<Role, SessionError> {
    match raw {
        "admin" => Ok(Role::Admin),
        "user" => Ok(Role::User),
        _ => Err(SessionError::Role),
    }
}

/// Axum extractor for the logged-in user.
///
/// The token must verify and its user must still be in the roster with the
/// same role. The verified claims ride along.
pub struct UserSession(pub User, pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared_state = SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = verify_session(&token, &shared_state.session_key).map_err(|e| {
            tracing::warn!("Session verification failed: {}", e);
            StatusCode::UNAUTHORIZED
        })?;

        let Some(user) = shared_state.catalog.user(&claims.user_id) else {
            tracing::warn!("Session refers to a user that is no longer in the roster");
            return Err(StatusCode::UNAUTHORIZED);
        };

        if user.role != claims.role {
            tracing::warn!("Session role no longer matches the roster for {}", user.full_name());
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(UserSession(user.clone(), claims))
    }
}

pub fn require_admin(user: &User) -> Result<(), StatusCode> {
    if !user.is_admin() {
        tracing::warn!("Non-admin {} tried to reach the admin area", user.full_name());
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_sign_and_verify() {
        let token = sign_session("key|with|pipes", Role::Admin, KEY, 1).unwrap();
        let claims = verify_session(&token, KEY).unwrap();
        assert_eq!(claims.user_id, "key|with|pipes");
        assert_eq!(claims.role, Role::Admin);
        let expires_at = claims.expires_at().unwrap();
        assert!(expires_at > Utc::now() && expires_at <= Utc::now() + Duration::hours(1));
    }

    #[test]
    fn test_wrong_key_and_tampering() {
        let token = sign_session("key-ana", Role::User, KEY, 1).unwrap();
        assert!(matches!(
            verify_session(&token, b"another-key-another-key-another!!"),
            Err(SessionError::Signature)
        ));

        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", general_purpose::STANDARD.encode("key-ana|admin|9999999999"), sig);
        assert!(matches!(verify_session(&forged, KEY), Err(SessionError::Signature)));
        assert!(matches!(verify_session("garbage", KEY), Err(SessionError::Invalid)));
    }

    #[test]
    fn test_expired() {
        let token = sign_payload("key-ana", Role::User, Utc::now().timestamp() - 10, KEY).unwrap();
        assert!(matches!(verify_session(&token, KEY), Err(SessionError::Expired)));
    }

    #[test]
    fn test_extract_token_from_cookie_and_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer xyz.uvw"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz.uvw"));
    }
}

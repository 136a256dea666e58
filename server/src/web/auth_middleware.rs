use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

use crate::auth::token::validate_session_token;

use super::app_state::AppState;

/// Name of the cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "guildhall_session";

/// Extractor that validates the session JWT from the `guildhall_session` cookie.
///
/// Use `AuthUser` in handlers that require authentication and
/// `Option<AuthUser>` where an anonymous caller is acceptable.
pub struct AuthUser {
    pub user_id: i64,
}

enum SessionError {
    Missing,
    Invalid,
}

fn session_user(parts: &Parts, state: &AppState) -> Result<AuthUser, SessionError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let cookie = jar.get(SESSION_COOKIE).ok_or(SessionError::Missing)?;

    let claims = validate_session_token(cookie.value(), &state.auth_config.jwt_secret)
        .map_err(|_| SessionError::Invalid)?;
    let user_id = claims.user_id().ok_or(SessionError::Invalid)?;

    Ok(AuthUser { user_id })
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        session_user(parts, state).map_err(|e| match e {
            SessionError::Missing => {
                (StatusCode::UNAUTHORIZED, "Not authenticated").into_response()
            }
            SessionError::Invalid => {
                (StatusCode::UNAUTHORIZED, "Invalid or expired session").into_response()
            }
        })
    }
}

/// A missing or invalid session yields an anonymous caller.
impl OptionalFromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(session_user(parts, state).ok())
    }
}

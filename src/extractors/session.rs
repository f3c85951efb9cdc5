//! Session extraction: bearer token or session cookie, resolved to the signed-in user.

use crate::error::AppError;
use crate::model::{Role, User};
use crate::service::AuthService;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Session token from `Authorization: Bearer <token>`, falling back to the `cookie_name` cookie.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

async fn resolve(headers: &HeaderMap, state: &AppState) -> Result<User, AppError> {
    let token = session_token(headers, &state.settings.session_cookie).ok_or(AppError::Unauthorized)?;
    AuthService::user_for_session(&state.pool, &state.tables, &token)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// The signed-in user. Rejects with 401 when there is no valid session.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(CurrentUser(user.clone()));
        }
        let user = resolve(&parts.headers, state).await?;
        parts.extensions.insert(user.clone());
        Ok(CurrentUser(user))
    }
}

/// Route layer for the back office: 401 without a session, 403 for non-admins.
pub async fn require_admin(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let user = resolve(req.headers(), &state).await?;
    if user.role != Role::Admin {
        tracing::info!(user_id = %user.id, "back-office access denied");
        return Err(AppError::Forbidden("admin role required".into()));
    }
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

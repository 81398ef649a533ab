use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::db::User;
use crate::error::AppError;

use super::{blocking, AppState, SESSION_COOKIE};

/// The signed-in user, resolved once per request from the session cookie.
/// Handlers taking this reject anonymous requests with `Unauthenticated`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let user_id = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| state.sessions.verify(cookie.value(), Utc::now()))
            .ok_or(AppError::Unauthenticated)?;

        let db = state.db.clone();
        let user = blocking(move || Ok(db.get_user(user_id)?)).await?;
        user.map(CurrentUser).ok_or(AppError::Unauthenticated)
    }
}

/// Session cookie carrying a signed token, kept for `max_age`.
pub fn session_cookie(token: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

/// Matches the session cookie for removal.
pub fn session_cookie_removal() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

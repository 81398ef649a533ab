use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::db::User;
use crate::error::Rejection;
use crate::identity::{self, LoginForm, ProfileForm, RegisterForm};
use crate::web::extract::{session_cookie, session_cookie_removal};
use crate::web::{blocking, flash, pages, AppState, CurrentUser};

use super::{redirect_with_flash, render};

pub async fn register_page(jar: CookieJar) -> Response {
    render(jar, pages::register)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, Rejection> {
    let worker = state.clone();
    let user = blocking(move || identity::register(&worker.db, &worker.hasher, &form))
        .await
        .map_err(|e| e.redirect_to("/register"))?;

    Ok(start_session(
        jar,
        &state,
        &user,
        format!("Welcome to naturelog, {}!", user.username),
    ))
}

pub async fn login_page(jar: CookieJar) -> Response {
    render(jar, pages::login)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, Rejection> {
    let worker = state.clone();
    let user = blocking(move || identity::login(&worker.db, &worker.hasher, &form))
        .await
        .map_err(|e| e.redirect_to("/login"))?;

    info!(user_id = user.id, "User {} logged in", user.username);
    Ok(start_session(
        jar,
        &state,
        &user,
        format!("Welcome back, {}!", user.username),
    ))
}

pub async fn logout(jar: CookieJar) -> Response {
    redirect_with_flash(
        jar.remove(session_cookie_removal()),
        "/login",
        "You have been logged out.",
    )
}

pub async fn profile_page(CurrentUser(user): CurrentUser, jar: CookieJar) -> Response {
    render(jar, |flashes| pages::profile(&user, flashes))
}

pub async fn edit_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Form(form): Form<ProfileForm>,
) -> Result<Response, Rejection> {
    let worker = state.clone();
    blocking(move || identity::edit_profile(&worker.db, &worker.hasher, &user, &form))
        .await
        .map_err(|e| e.redirect_to("/profile"))?;

    Ok(redirect_with_flash(jar, "/profile", "Profile updated."))
}

fn start_session(jar: CookieJar, state: &AppState, user: &User, greeting: String) -> Response {
    let token = state.sessions.issue(user.id, Utc::now());
    let jar = jar.add(session_cookie(token, state.sessions.max_age()));
    (flash::push(jar, &[greeting]), Redirect::to("/")).into_response()
}

//! Route handlers, grouped by the pages they serve.

pub mod account;
pub mod explore;
pub mod observations;

use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use super::flash;

/// Render a page with the queued flashes, consuming them.
fn render(jar: CookieJar, page: impl FnOnce(&[String]) -> String) -> Response {
    let (jar, flashes) = flash::take(jar);
    (jar, Html(page(&flashes))).into_response()
}

/// 303 to `path` with a single flash message queued.
fn redirect_with_flash(jar: CookieJar, path: &str, message: impl Into<String>) -> Response {
    (flash::push(jar, &[message.into()]), Redirect::to(path)).into_response()
}

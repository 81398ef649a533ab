use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use thiserror::Error;
use tracing::error;

use crate::web::flash;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("That username is already taken")]
    DuplicateUser,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Please log in to continue")]
    Unauthenticated,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {0}")]
    InvalidField(&'static str),

    #[error("Image is larger than the {limit} byte upload limit")]
    PayloadTooLarge { limit: usize },

    #[error("Unsupported image format, upload a JPEG, PNG, GIF or WebP")]
    UnsupportedMediaType,

    #[error("Not found")]
    NotFound,

    #[error("You can only change your own observations")]
    NotOwner,

    #[error("Encyclopedia lookup timed out")]
    UpstreamTimeout,

    #[error("Encyclopedia lookup failed: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    /// Surface this error as a flash message on `path` instead of the
    /// default page for its kind.
    pub fn redirect_to(self, path: &'static str) -> Rejection {
        Rejection {
            error: self,
            redirect: Some(path),
        }
    }

    fn default_redirect(&self) -> Option<&'static str> {
        match self {
            AppError::DuplicateUser => Some("/register"),
            AppError::InvalidCredentials | AppError::Unauthenticated => Some("/login"),
            AppError::MissingField(_)
            | AppError::InvalidField(_)
            | AppError::PayloadTooLarge { .. }
            | AppError::UnsupportedMediaType => Some("/upload"),
            AppError::NotOwner => Some("/my_observations"),
            AppError::UpstreamTimeout | AppError::Upstream(_) => Some("/"),
            AppError::NotFound | AppError::Store(_) => None,
        }
    }
}

/// An error together with the page the user is sent back to.
#[derive(Debug)]
pub struct Rejection {
    error: AppError,
    redirect: Option<&'static str>,
}

impl From<AppError> for Rejection {
    fn from(error: AppError) -> Self {
        let redirect = error.default_redirect();
        Self { error, redirect }
    }
}

impl From<anyhow::Error> for Rejection {
    fn from(error: anyhow::Error) -> Self {
        AppError::Store(error).into()
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match (self.error, self.redirect) {
            (AppError::NotFound, _) => (StatusCode::NOT_FOUND, "Not found").into_response(),
            (AppError::Store(e), _) => {
                error!("Request failed: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html("<!doctype html><title>Error</title><h1>Something went wrong</h1><p>Please try again later.</p>"),
                )
                    .into_response()
            }
            (other, Some(path)) => {
                let message = other.to_string();
                (flash::push(CookieJar::new(), &[message]), Redirect::to(path)).into_response()
            }
            (other, None) => (StatusCode::BAD_REQUEST, other.to_string()).into_response(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Rejection::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::{LOCATION, SET_COOKIE};

    use super::*;

    #[test]
    fn test_user_facing_errors_redirect_with_flash() {
        let resp = AppError::MissingField("species").into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[LOCATION], "/upload");
        assert!(resp.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .starts_with("naturelog_flash="));
    }

    #[test]
    fn test_redirect_override() {
        let resp = AppError::MissingField("username")
            .redirect_to("/register")
            .into_response();
        assert_eq!(resp.headers()[LOCATION], "/register");
    }

    #[test]
    fn test_not_found_is_plain_404() {
        let resp = AppError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_store_failure_is_500() {
        let resp = AppError::Store(anyhow::anyhow!("disk full")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

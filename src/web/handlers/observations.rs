use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, Rejection};
use crate::feed;
use crate::observations::{self, UploadForm, UploadedFile};
use crate::web::{blocking, pages, AppState, CurrentUser};

use super::{redirect_with_flash, render};

const HOME_PREVIEW_LIMIT: usize = 10;

pub async fn home(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Result<Response, Rejection> {
    let db = state.db.clone();
    let (recent, total) = blocking(move || {
        let recent = feed::recent_observations(&db, HOME_PREVIEW_LIMIT)?;
        Ok((recent, db.observation_count()?))
    })
    .await?;

    Ok(render(jar, |flashes| {
        pages::home(&user, flashes, &recent, total)
    }))
}

pub async fn upload_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Response {
    render(jar, |flashes| {
        pages::upload(&user, flashes, state.max_upload_bytes)
    })
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, Rejection> {
    let form = read_upload_form(multipart, state.max_upload_bytes).await?;

    let db = state.db.clone();
    let max_bytes = state.max_upload_bytes;
    let observation =
        blocking(move || observations::upload(&db, &user, form, max_bytes, Utc::now())).await?;

    Ok(redirect_with_flash(
        jar,
        "/my_observations",
        format!("Observation of {} saved.", observation.species),
    ))
}

pub async fn image(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<String>,
) -> Result<Response, Rejection> {
    let db = state.db.clone();
    let image = blocking(move || observations::get_image(&db, &image_id)).await?;

    Ok((
        [
            (CONTENT_TYPE, image.content_type),
            (
                CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", image.filename),
            ),
            // Image ids are never reused
            (CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        image.data,
    )
        .into_response())
}

pub async fn my_observations(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Result<Response, Rejection> {
    let db = state.db.clone();
    let user_id = user.id;
    let mine = blocking(move || feed::list_my_observations(&db, user_id)).await?;

    Ok(render(jar, |flashes| {
        pages::my_observations(&user, flashes, &mine)
    }))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(observation_id): Path<i64>,
) -> Result<Response, Rejection> {
    let db = state.db.clone();
    blocking(move || observations::delete_observation(&db, &user, observation_id)).await?;

    Ok(redirect_with_flash(jar, "/my_observations", "Observation deleted."))
}

/// Collect the upload fields. Unknown parts are skipped; a body over the
/// request limit becomes `PayloadTooLarge`.
async fn read_upload_form(mut multipart: Multipart, max_bytes: usize) -> Result<UploadForm, AppError> {
    let too_large = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge { limit: max_bytes }
        } else {
            warn!("Malformed upload: {}", e.body_text());
            AppError::MissingField("image")
        }
    };

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(too_large)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let filename = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(too_large)?;
                form.image = Some(UploadedFile {
                    filename,
                    data: data.to_vec(),
                });
            }
            "species" => form.species = Some(field.text().await.map_err(too_large)?),
            "latitude" => form.latitude = Some(field.text().await.map_err(too_large)?),
            "longitude" => form.longitude = Some(field.text().await.map_err(too_large)?),
            _ => {}
        }
    }
    Ok(form)
}

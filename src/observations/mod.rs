//! Observation upload, image retrieval and deletion.

use chrono::{DateTime, Utc};
use image::ImageFormat;
use tracing::info;

use crate::db::{Database, NewImage, NewObservation, Observation, StoredImage, User};
use crate::error::AppError;

/// A file part received with an upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// Raw upload fields as submitted; anything may be missing.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub image: Option<UploadedFile>,
    pub species: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// Check an upload and turn it into something storable.
///
/// Order of checks: required fields, coordinate ranges, size ceiling, then
/// content sniffing. Nothing is written here.
pub fn validate_upload(form: UploadForm, max_bytes: usize) -> Result<NewObservation, AppError> {
    let image = form
        .image
        .filter(|file| !file.data.is_empty())
        .ok_or(AppError::MissingField("image"))?;
    let species = required(form.species, "species")?;
    let latitude = required(form.latitude, "latitude")?;
    let longitude = required(form.longitude, "longitude")?;

    let latitude = parse_coordinate(&latitude, 90.0, "latitude")?;
    let longitude = parse_coordinate(&longitude, 180.0, "longitude")?;

    if image.data.len() > max_bytes {
        return Err(AppError::PayloadTooLarge { limit: max_bytes });
    }

    let format = sniff_format(&image.data).ok_or(AppError::UnsupportedMediaType)?;
    let filename = sanitize_filename(image.filename.as_deref(), format);

    Ok(NewObservation {
        species,
        latitude,
        longitude,
        image: NewImage {
            filename,
            content_type: format.to_mime_type().to_string(),
            data: image.data,
        },
    })
}

pub fn upload(
    db: &Database,
    uploader: &User,
    form: UploadForm,
    max_bytes: usize,
    now: DateTime<Utc>,
) -> Result<Observation, AppError> {
    let new_observation = validate_upload(form, max_bytes)?;
    let observation = db.create_observation(uploader, &new_observation, now)?;

    info!(
        observation_id = observation.id,
        user_id = uploader.id,
        "Stored observation of {} ({} bytes)",
        observation.species,
        new_observation.image.data.len()
    );
    Ok(observation)
}

pub fn get_image(db: &Database, image_id: &str) -> Result<StoredImage, AppError> {
    db.get_image(image_id)?.ok_or(AppError::NotFound)
}

/// Delete one of the caller's observations along with its image.
pub fn delete_observation(db: &Database, user: &User, observation_id: i64) -> Result<(), AppError> {
    let observation = db
        .get_observation(observation_id)?
        .ok_or(AppError::NotFound)?;
    if observation.uploader_id != user.id {
        return Err(AppError::NotOwner);
    }

    if !db.delete_observation(observation_id)? {
        return Err(AppError::NotFound);
    }
    info!(observation_id, user_id = user.id, "Deleted observation");
    Ok(())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::MissingField(field))
}

fn parse_coordinate(raw: &str, bound: f64, field: &'static str) -> Result<f64, AppError> {
    let value: f64 = raw.parse().map_err(|_| AppError::InvalidField(field))?;
    if !value.is_finite() || value.abs() > bound {
        return Err(AppError::InvalidField(field));
    }
    Ok(value)
}

/// Formats accepted for upload, identified by magic bytes rather than the
/// client-supplied name or content type.
fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(data).ok()? {
        format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP) => {
            Some(format)
        }
        _ => None,
    }
}

/// Keep the base name only, restricted to a safe character set, with the
/// extension matching the sniffed format.
fn sanitize_filename(original: Option<&str>, format: ImageFormat) -> String {
    let extension = format.extensions_str().first().copied().unwrap_or("img");

    let stem = original
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(|name| name.rsplit_once('.').map_or(name, |(stem, _)| stem))
        .unwrap_or("");
    let stem: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(64)
        .collect();
    let stem = if stem.is_empty() { "observation".to_string() } else { stem };

    format!("{stem}.{extension}")
}

use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::PathRejection;
use axum::extract::{Multipart, Path};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use image::ImageFormat;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::err::Error;
use crate::models::{ImageMeta, ImagePayload};
use crate::validate::{Text, Validator};
use crate::{breaks, created, proceeds, Payload};

/// Upload ceiling: 5120 KiB.
pub const MAX_IMAGE_BYTES: usize = 5120 * 1024;

const META_COLUMNS: &str =
    "id, name, mime_type, size, alt_text, description, created_at, updated_at";

/// Renders a byte count with binary prefixes, e.g. `1.5 KB`.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", (value * 100.0).round() / 100.0, UNITS[unit])
}

/// MIME type of an accepted upload, sniffed from its leading bytes.
fn sniff_mime(bytes: &[u8]) -> Result<&'static str, &'static str> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Ok("image/jpeg"),
        Ok(ImageFormat::Png) => Ok("image/png"),
        Ok(ImageFormat::Gif) => Ok("image/gif"),
        Ok(ImageFormat::WebP) => Ok("image/webp"),
        Ok(_) => Err("The image field must be a file of type: jpeg, png, jpg, gif, webp."),
        Err(_) => Err("The image field must be an image."),
    }
}

/// Filename as it may appear inside a quoted header parameter.
fn disposition_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect()
}

fn image_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, Error> {
    path.map(|Path(id)| id).map_err(|err| Error::NotFound {
        message: format!("Image non trouvée: {}", err),
    })
}

fn not_found(id: i64) -> Error {
    Error::NotFound {
        message: format!("Image #{} non trouvée", id),
    }
}

/// Reads a file field up to [`MAX_IMAGE_BYTES`]. Returns the bytes read and
/// whether the field went past the limit, in which case reading stopped there.
async fn read_capped(field: &mut Field<'_>) -> Result<(Vec<u8>, bool), Error> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        let room = MAX_IMAGE_BYTES - bytes.len();
        if chunk.len() > room {
            bytes.extend_from_slice(&chunk[..room]);
            return Ok((bytes, true));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok((bytes, false))
}

async fn fetch_meta(pool: &SqlitePool, id: i64) -> Result<ImageMeta, Error> {
    sqlx::query_as::<_, ImageMeta>(&format!(
        "SELECT {} FROM images WHERE id = ? LIMIT 1",
        META_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| not_found(id))
}

pub async fn list_images(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Arc<Config>>,
) -> Payload<ImageList> {
    let images = sqlx::query_as::<_, ImageMeta>(&format!(
        "SELECT {} FROM images ORDER BY created_at DESC, id DESC",
        META_COLUMNS
    ))
    .fetch_all(&pool)
    .await?;

    proceeds(ImageList {
        data: images
            .into_iter()
            .map(|meta| ImageView::new(meta, &config))
            .collect(),
        message: "Images récupérées avec succès (sans données binaires)",
    })
}

pub async fn store_image(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Arc<Config>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Payload<ImageDetail> {
    let mut multipart = multipart?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut oversized = false;
    let mut alt_text: Option<Text> = None;
    let mut description: Option<Text> = None;
    while let Some(mut field) = multipart.next_field().await? {
        match field.name().map(str::to_owned).as_deref() {
            Some("image") => {
                let name = field.file_name().unwrap_or("image").to_string();
                let (bytes, over) = read_capped(&mut field).await?;
                upload = Some((name, bytes));
                if over {
                    // the rest of the body is left unread
                    oversized = true;
                    break;
                }
            }
            Some("alt_text") => alt_text = Some(field.text().await?.into()),
            Some("description") => description = Some(field.text().await?.into()),
            _ => {}
        }
    }

    let mut v = Validator::new();
    let mut mime_type = None;
    match &upload {
        Some((_, bytes)) if !bytes.is_empty() => {
            match sniff_mime(bytes) {
                Ok(mime) => mime_type = Some(mime),
                Err(message) => v.fail("image", message),
            }
            if oversized {
                v.fail(
                    "image",
                    format!(
                        "The image field must not be greater than {} kilobytes.",
                        MAX_IMAGE_BYTES / 1024
                    ),
                );
            }
        }
        _ => v.fail("image", "The image field is required."),
    }
    let alt_text = v.optional_string("alt_text", alt_text.as_ref(), 255);
    let description = v.optional_string("description", description.as_ref(), 255);
    v.finish().map_err(Error::invalid)?;

    let (Some((name, bytes)), Some(mime_type)) = (&upload, mime_type) else {
        return breaks(Error::invalid(Default::default()));
    };

    let now = Utc::now();
    let res = sqlx::query(
        "INSERT INTO images (name, image_data, mime_type, size, alt_text, description, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(STANDARD.encode(bytes))
    .bind(mime_type)
    .bind(bytes.len() as i64)
    .bind(alt_text)
    .bind(description)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    let meta = fetch_meta(&pool, res.last_insert_rowid()).await?;
    log::info!(
        "Stored image #{} `{}` ({}, {})",
        meta.id,
        meta.name,
        meta.mime_type,
        format_bytes(meta.size)
    );

    created(ImageDetail {
        data: ImageView::new(meta, &config),
        message: "Image uploadée avec succès!",
    })
}

pub async fn serve_image(
    path: Result<Path<i64>, PathRejection>,
    Extension(pool): Extension<SqlitePool>,
) -> Result<Response, Error> {
    let id = image_id(path)?;
    let image = sqlx::query_as::<_, ImagePayload>(
        "SELECT name, mime_type, image_data FROM images WHERE id = ? LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| not_found(id))?;

    let bytes = STANDARD.decode(image.image_data.as_bytes())?;
    let headers = [
        (CONTENT_TYPE, image.mime_type),
        (
            CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", disposition_name(&image.name)),
        ),
        (CACHE_CONTROL, "public, max-age=3600".to_string()),
    ];
    Ok((headers, bytes).into_response())
}

pub async fn show_image(
    path: Result<Path<i64>, PathRejection>,
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Arc<Config>>,
) -> Payload<ImageDetail> {
    let meta = fetch_meta(&pool, image_id(path)?).await?;
    proceeds(ImageDetail {
        data: ImageView::new(meta, &config),
        message: "Image trouvée (métadonnées seulement)",
    })
}

pub async fn destroy_image(
    path: Result<Path<i64>, PathRejection>,
    Extension(pool): Extension<SqlitePool>,
) -> Payload<ImageDeleted> {
    let id = image_id(path)?;
    let res = sqlx::query("DELETE FROM images WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;
    if res.rows_affected() < 1 {
        return breaks(not_found(id));
    }
    log::info!("Deleted image #{}", id);

    proceeds(ImageDeleted {
        message: "Image supprimée avec succès",
    })
}

/// Image metadata as sent to clients: never the payload.
#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    #[serde(flatten)]
    pub meta: ImageMeta,
    pub formatted_size: String,
    pub url: String,
}

impl ImageView {
    pub fn new(meta: ImageMeta, config: &Config) -> Self {
        Self {
            formatted_size: format_bytes(meta.size),
            url: config.serve_url(meta.id),
            meta,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageList {
    pub data: Vec<ImageView>,
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageDetail {
    pub data: ImageView,
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageDeleted {
    pub message: &'static str,
}

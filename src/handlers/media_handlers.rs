//! HTTP handlers for ingesting images, browsing them by day, and serving the
//! stored bytes back to viewers.

use crate::{
    errors::AppError,
    models::gallery::GalleryPage,
    services::{ingestion_service::IngestOutcome, query_service::DateQueryResult},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

/// Query params accepted by `GET /media`.
#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    /// Calendar day, `YYYY-MM-DD`. Without it every record is listed.
    pub date: Option<NaiveDate>,
}

/// `POST /media`: multipart upload.
///
/// Expects a `file` part carrying a file name and the image bytes, and an
/// optional `description` text part.
pub async fn upload_media(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut description = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::bad_request("`file` part has no file name"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::bad_request(err.body_text()))?;
                file = Some((file_name, bytes));
            }
            Some("description") => {
                description = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(err.body_text()))?;
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| AppError::bad_request("missing `file` part"))?;
    info!("upload of {} ({} bytes)", file_name, bytes.len());

    let outcome: IngestOutcome = state
        .ingestion
        .ingest(bytes, &file_name, &description)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `GET /media?date=YYYY-MM-DD`: gallery for one day.
/// `GET /media`: every record.
pub async fn list_media(
    State(state): State<AppState>,
    Query(q): Query<GalleryQuery>,
) -> Result<Json<GalleryPage>, AppError> {
    let Some(date) = q.date else {
        let records = state.query.list_all().await?;
        return Ok(Json(GalleryPage::new(None, &records)));
    };

    match state.query.find_by_date(date).await {
        DateQueryResult::Failed(err) => Err(err.into()),
        result => Ok(Json(GalleryPage::new(Some(date), result.records()))),
    }
}

/// `GET /blobs/{container}/{key}`: stored image bytes.
pub async fn get_blob(
    State(state): State<AppState>,
    Path((container, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    if container != state.blobs.container() {
        return Err(AppError::new(
            StatusCode::NOT_FOUND,
            format!("container `{}` not found", container),
        ));
    }

    let bytes = state.blobs.get(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], bytes).into_response())
}

/// Content type guessed from the key's extension.
fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

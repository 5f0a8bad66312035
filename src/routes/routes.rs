//! Defines routes for ingestion, the date gallery, and blob downloads.
//!
//! ## Structure
//! - `POST /media`                     multipart upload (`file`, `description`)
//! - `GET  /media?date=YYYY-MM-DD`     images dated that day
//! - `GET  /media`                     every record
//! - `GET  /blobs/{container}/{key}`   stored image bytes
//! - `GET  /healthz`, `GET /readyz`    liveness / readiness

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        media_handlers::{get_blob, list_media, upload_media},
    },
    state::AppState,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the router. Handlers share `AppState`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/media",
            get(list_media)
                .post(upload_media)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/blobs/{container}/{key}", get(get_blob))
}

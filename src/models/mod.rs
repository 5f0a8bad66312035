//! Data models for the media store.
//!
//! `MediaRecord` maps to the metadata table via `sqlx::FromRow`; the gallery
//! types are what the HTTP layer serializes for viewers.

pub mod gallery;
pub mod media_record;

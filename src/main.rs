use anyhow::{Context, Result};
use axum::Router;
use bytes::Bytes;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::{
    blob_store::{BlobStore, DiskBlobStore},
    metadata_store::{MetadataStore, SqliteMetadataStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Environment + logging setup ---
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + mode flags ---
    let (cfg, args) = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting pest-gallery on {} (container {}, table {})",
        cfg.addr(),
        cfg.container,
        cfg.table
    );

    // --- Open stores ---
    let blobs = Arc::new(DiskBlobStore::new(
        &cfg.connection.blob_root,
        &cfg.container,
        &cfg.connection.public_url,
    )?);
    let db = Arc::new(connect_sqlite(&cfg.connection.database_url).await?);
    let metadata = Arc::new(SqliteMetadataStore::new(db, &cfg.table)?);

    blobs.ensure_container_exists().await?;
    metadata.ensure_table_exists().await?;

    // --- Handle one-shot modes ---
    if args.migrate {
        tracing::info!("Container and table are ready.");
        return Ok(());
    }

    let app_state = state::AppState::new(blobs, metadata, cfg.partition.clone());

    if let Some(path) = args.ingest.as_deref() {
        return ingest_file(&app_state, path, args.description.as_deref().unwrap_or("")).await;
    }

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(app_state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Open the SQLite pool, creating the database file and its parent directory
/// when missing.
async fn connect_sqlite(database_url: &str) -> Result<sqlx::SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parsing database url `{}`", database_url))?
        .create_if_missing(true);

    let db_path = options.get_filename();
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    tracing::debug!("Connecting to SQLite at {:?}", db_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to `{}`", database_url))?;
    Ok(pool)
}

/// Ingest one local file and print the result.
async fn ingest_file(state: &state::AppState, path: &Path, description: &str) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;

    let outcome = state
        .ingestion
        .ingest(Bytes::from(bytes), file_name, description)
        .await?;

    println!("Image URL: {}", outcome.blob_url);
    println!("Metadata stored: {}", serde_json::to_string_pretty(&outcome.record)?);
    Ok(())
}

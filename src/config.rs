use crate::services::error::{MediaError, MediaResult};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf};

pub const CONNECTION_STRING_VAR: &str = "MEDIA_STORE_CONNECTION_STRING";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub connection: ConnectionString,
    pub container: String,
    pub table: String,
    pub partition: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Date-indexed image store")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage connection string (overrides MEDIA_STORE_CONNECTION_STRING)
    #[arg(long)]
    pub connection_string: Option<String>,

    /// Blob container name (overrides MEDIA_STORE_CONTAINER)
    #[arg(long)]
    pub container: Option<String>,

    /// Metadata table name (overrides MEDIA_STORE_TABLE)
    #[arg(long)]
    pub table: Option<String>,

    /// Partition every record is written under (overrides MEDIA_STORE_PARTITION)
    #[arg(long)]
    pub partition: Option<String>,

    /// Create the blob container and metadata table, then exit
    #[arg(long)]
    pub migrate: bool,

    /// Ingest a single local image file, then exit
    #[arg(long, value_name = "PATH")]
    pub ingest: Option<PathBuf>,

    /// Description stored with `--ingest`
    #[arg(long, requires = "ingest")]
    pub description: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<(Self, Args)> {
        let args = Args::parse();
        let cfg = Self::from_sources(&args, |name| env::var(name).ok())?;
        Ok((cfg, args))
    }

    /// Merge CLI args over values looked up through `var`.
    pub fn from_sources(args: &Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_host = var("MEDIA_STORE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match var("MEDIA_STORE_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing MEDIA_STORE_PORT value `{}`", value))?,
            None => 3000,
        };
        let host = args.host.clone().unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);

        let raw_connection = args
            .connection_string
            .clone()
            .or_else(|| var(CONNECTION_STRING_VAR))
            .unwrap_or_default();
        let default_public_url = format!("http://{}:{}", public_host(&host), port);
        let connection = ConnectionString::parse(&raw_connection, &default_public_url)?;

        Ok(Self {
            host,
            port,
            connection,
            container: args
                .container
                .clone()
                .or_else(|| var("MEDIA_STORE_CONTAINER"))
                .unwrap_or_else(|| "pestimage".into()),
            table: args
                .table
                .clone()
                .or_else(|| var("MEDIA_STORE_TABLE"))
                .unwrap_or_else(|| "DeviceTest01".into()),
            partition: args
                .partition
                .clone()
                .or_else(|| var("MEDIA_STORE_PARTITION"))
                .unwrap_or_else(|| "ImageDescription".into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Wildcard bind addresses are not reachable URLs.
fn public_host(host: &str) -> &str {
    match host {
        "0.0.0.0" | "::" => "127.0.0.1",
        other => other,
    }
}

/// The single storage credential: `;`-separated `Key=Value` pairs.
///
/// ```text
/// BlobRoot=./data/blobs;DatabaseUrl=sqlite://./data/meta/media.db;PublicUrl=http://localhost:3000
/// ```
///
/// `BlobRoot` and `DatabaseUrl` are required. Keys are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub blob_root: PathBuf,
    pub database_url: String,
    pub public_url: String,
}

impl ConnectionString {
    pub fn parse(raw: &str, default_public_url: &str) -> MediaResult<Self> {
        if raw.trim().is_empty() {
            return Err(MediaError::ConfigurationMissing(format!(
                "{} is not set",
                CONNECTION_STRING_VAR
            )));
        }

        let mut blob_root = None;
        let mut database_url = None;
        let mut public_url = None;
        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                MediaError::ConfigurationMissing(format!(
                    "connection string segment `{}` is not Key=Value",
                    segment
                ))
            })?;
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim().to_ascii_lowercase().as_str() {
                "blobroot" => blob_root = Some(PathBuf::from(value)),
                "databaseurl" => database_url = Some(value.to_string()),
                "publicurl" => public_url = Some(value.to_string()),
                other => tracing::debug!("ignoring connection string key `{}`", other),
            }
        }

        let required = |name: &str| {
            MediaError::ConfigurationMissing(format!("connection string has no `{}`", name))
        };
        Ok(Self {
            blob_root: blob_root.ok_or_else(|| required("BlobRoot"))?,
            database_url: database_url.ok_or_else(|| required("DatabaseUrl"))?,
            public_url: public_url.unwrap_or_else(|| default_public_url.to_string()),
        })
    }
}

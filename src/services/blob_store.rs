//! src/services/blob_store.rs
//!
//! Blob storage for image payloads. `DiskBlobStore` keeps every blob of a
//! container beneath `root/{container}/{shard}/{shard}/{key}` and hands out a
//! URL under the service's `/blobs` route for each write.

use crate::services::error::{MediaError, MediaResult};
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

pub const MAX_KEY_LEN: usize = 1024;
const CONTAINER_NAME_MIN_LEN: usize = 3;
const CONTAINER_NAME_MAX_LEN: usize = 63;

/// Characters left untouched when a key is placed into a URL path segment.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Durable byte storage addressed by key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the backing container. Succeeds when it already exists.
    async fn ensure_container_exists(&self) -> MediaResult<()>;

    /// Store `bytes` under `key`, replacing any previous blob, and return the
    /// URL the blob can be fetched from.
    async fn put(&self, key: &str, bytes: Bytes) -> MediaResult<String>;

    /// Read a blob back.
    async fn get(&self, key: &str) -> MediaResult<Bytes>;

    /// Name of the container blobs are written to.
    fn container(&self) -> &str;

    /// Probe that the store accepts writes.
    async fn health_check(&self) -> MediaResult<()>;
}

/// Local-disk blob store.
#[derive(Clone, Debug)]
pub struct DiskBlobStore {
    root: PathBuf,
    container: String,
    public_url: String,
}

impl DiskBlobStore {
    /// Build a store rooted at `root`. The container name is validated here;
    /// nothing touches the filesystem until [`BlobStore::ensure_container_exists`].
    pub fn new(
        root: impl Into<PathBuf>,
        container: impl Into<String>,
        public_url: impl Into<String>,
    ) -> MediaResult<Self> {
        let container = container.into();
        ensure_container_name_safe(&container)?;
        Ok(Self {
            root: root.into(),
            container,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn container_root(&self) -> PathBuf {
        self.root.join(&self.container)
    }

    /// Two-level shard directories from MD5(container/key), as lowercase hex.
    fn blob_shards(&self, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", self.container, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = self.blob_shards(key);
        let mut path = self.container_root();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    fn blob_url(&self, key: &str) -> String {
        format!(
            "{}/blobs/{}/{}",
            self.public_url,
            self.container,
            utf8_percent_encode(key, KEY_ENCODE_SET)
        )
    }

    /// Write into a temp file next to the target, fsync, then rename over it.
    async fn write_atomically(&self, file_path: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                io::Error::new(ErrorKind::Other, "blob path missing parent directory")
            })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let result: io::Result<()> = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);

            if let Err(err) = fs::rename(&tmp_path, file_path).await {
                if err.kind() != ErrorKind::AlreadyExists {
                    return Err(err);
                }
                fs::remove_file(file_path).await?;
                fs::rename(&tmp_path, file_path).await?;
            }
            Ok::<(), io::Error>(())
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        result
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn ensure_container_exists(&self) -> MediaResult<()> {
        let path = self.container_root();
        if fs::try_exists(&path).await? {
            debug!("container {} already exists", self.container);
            return Ok(());
        }
        fs::create_dir_all(&path).await?;
        info!("created container {} at {}", self.container, path.display());
        Ok(())
    }

    async fn put(&self, key: &str, bytes: Bytes) -> MediaResult<String> {
        ensure_key_safe(key)?;
        let file_path = self.blob_path(key);
        self.write_atomically(&file_path, &bytes).await?;
        debug!(
            "stored {} bytes for {} at {}",
            bytes.len(),
            key,
            file_path.display()
        );
        Ok(self.blob_url(key))
    }

    async fn get(&self, key: &str) -> MediaResult<Bytes> {
        ensure_key_safe(key)?;
        match fs::read(self.blob_path(key)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(MediaError::BlobNotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn container(&self) -> &str {
        &self.container
    }

    async fn health_check(&self) -> MediaResult<()> {
        let probe = self
            .container_root()
            .join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        if read_back? != b"readyz" {
            return Err(MediaError::blob_unavailable("probe file content mismatch"));
        }
        Ok(())
    }
}

/// Reject keys that could escape the container directory.
///
/// Keys are single path segments: no separators, no `.`/`..`, no control
/// characters.
pub fn ensure_key_safe(key: &str) -> MediaResult<()> {
    let invalid = || MediaError::InvalidFileName(key.to_string());
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(invalid());
    }
    if key == "." || key == ".." {
        return Err(invalid());
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\')
    {
        return Err(invalid());
    }
    Ok(())
}

/// Validate a container name.
///
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - starts and ends with a letter or digit
/// - no consecutive dots or dot-hyphen pairs
pub fn ensure_container_name_safe(name: &str) -> MediaResult<()> {
    let reject = |reason: &str| {
        Err(MediaError::InvalidContainerName {
            name: name.to_string(),
            reason: reason.into(),
        })
    };

    let len = name.len();
    if !(CONTAINER_NAME_MIN_LEN..=CONTAINER_NAME_MAX_LEN).contains(&len) {
        return reject("must be between 3 and 63 characters");
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return reject("allowed characters are lowercase letters, digits, dots, and hyphens");
    }

    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return reject("must start and end with a lowercase letter or digit");
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return reject("cannot contain consecutive dots or dot-hyphen combinations");
    }

    Ok(())
}

use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::{DfsError, Result};

/// Flat directory of record files owned by one peer.
///
/// Files are sparse: a peer only ever writes the records it owns, each at its
/// logical offset, so the gaps between them read back as zeroes.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        tracing::info!("Peer store rooted at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a filename onto a path inside the root. Only single, normal path
    /// components are accepted.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let invalid = |reason: &str| DfsError::InvalidFilename {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("empty name"));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(invalid("path separators are not allowed"));
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(invalid("not a plain file name")),
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.resolve(name)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Creates `name`, truncating it if it already exists.
    pub async fn create(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        fs::File::create(&path).await?;
        tracing::debug!("Created {}", path.display());
        Ok(())
    }

    /// Returns whether a file was removed.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read(&self, name: &str, offset: u64, count: u64) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DfsError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        // Refuse before allocating; the file bounds what a read can return
        let len = file.metadata().await?.len();
        if offset.checked_add(count).is_none_or(|end| end > len) {
            return Err(DfsError::Io {
                message: format!(
                    "'{}' holds {} bytes, cannot read {} at offset {}",
                    name, len, count, offset
                ),
            });
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let mut buffer = vec![0u8; count as usize];
        file.read_exact(&mut buffer).await.map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                DfsError::Io {
                    message: format!(
                        "'{}' holds fewer than {} bytes at offset {}",
                        name, count, offset
                    ),
                }
            } else {
                e.into()
            }
        })?;

        Ok(buffer)
    }

    pub async fn write(&self, name: &str, offset: u64, data: &[u8]) -> Result<()> {
        let path = self.resolve(name)?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .await?;

        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }
}

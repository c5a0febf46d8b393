//! Upload directory for original document files

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

const MAX_NAME_ATTEMPTS: usize = 16;

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

/// Stores uploaded files under a single directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` as `{unix_nanos}-{sanitized name}` and return the path.
    ///
    /// Existing files are never overwritten; a taken name is retried with a
    /// later prefix.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        self.write_new(&sanitize_filename(original_name), data, unix_nanos())
            .await
    }

    async fn write_new(&self, name: &str, data: &[u8], mut prefix: u128) -> Result<PathBuf> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.root.join(format!("{}-{}", prefix, name));
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(data).await?;
                    file.flush().await?;
                    tracing::debug!("Stored upload at {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    prefix = prefix.max(unix_nanos()) + 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::internal(format!(
            "No free upload name for {} after {} attempts",
            name, MAX_NAME_ATTEMPTS
        )))
    }

    /// Remove a stored file; returns `false` if it was already gone
    pub async fn remove_if_present(&self, path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keep only the final path component, with anything outside
/// `[A-Za-z0-9._-]` replaced by `_`
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim_start_matches('.');

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

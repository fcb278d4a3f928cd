//! File sink that never overwrites.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{CaptureError, Result};

/// Where a capture landed on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFile {
    pub path: String,
    pub size_bytes: usize,
    /// SHA-256, lowercase hex
    pub hash: String,
}

/// Writes captures under a base directory (normally the download folder).
#[derive(Debug, Clone)]
pub struct DiskSink {
    base_dir: PathBuf,
}

impl DiskSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `<download dir>` or, failing that, the working directory.
    pub fn downloads() -> Self {
        Self::new(dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Save `bytes` at `relative` (`/`-separated). An existing file is kept
    /// and the new one becomes `name (1).png`, `name (2).png`, ...
    pub async fn save(&self, relative: &str, bytes: &[u8]) -> Result<SavedFile> {
        if bytes.is_empty() {
            return Err(CaptureError::Transport("Screenshot data is empty".to_string()));
        }

        let target = relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.base_dir.clone(), |path, segment| path.join(segment));
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (path, mut file) = open_unique(&target).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        Ok(SavedFile {
            path: path.to_string_lossy().to_string(),
            size_bytes: bytes.len(),
            hash: sha256_hex(bytes),
        })
    }
}

async fn open_unique(target: &Path) -> Result<(PathBuf, tokio::fs::File)> {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = target.extension().map(|e| e.to_string_lossy().to_string());

    for attempt in 0u32.. {
        let candidate = if attempt == 0 {
            target.to_path_buf()
        } else {
            let name = match &extension {
                Some(ext) => format!("{} ({}).{}", stem, attempt, ext),
                None => format!("{} ({})", stem, attempt),
            };
            target.with_file_name(name)
        };

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(CaptureError::Other(format!(
        "No free file name for {}",
        target.display()
    )))
}

/// SHA-256 of a byte slice, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conflicts_are_uniquified() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DiskSink::new(dir.path());

        let first = sink.save("F24/F24ABC/F24ABC-1-2.png", b"one").await.unwrap();
        let second = sink.save("F24/F24ABC/F24ABC-1-2.png", b"two").await.unwrap();
        let third = sink.save("F24/F24ABC/F24ABC-1-2.png", b"three").await.unwrap();

        assert!(first.path.ends_with("F24ABC-1-2.png"));
        assert!(second.path.ends_with("F24ABC-1-2 (1).png"));
        assert!(third.path.ends_with("F24ABC-1-2 (2).png"));

        let kept = std::fs::read(dir.path().join("F24/F24ABC/F24ABC-1-2.png")).unwrap();
        assert_eq!(kept, b"one");
    }

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = DiskSink::new(dir.path()).save("a/b.png", &[]).await;
        assert!(matches!(result, Err(CaptureError::Transport(_))));
    }

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex(b"hello world");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}

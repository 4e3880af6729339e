//! Filesystem artifact repository

use std::fmt::Write as _;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use frame_codec::Frame;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use visibility::Reason;

use crate::StorageError;

/// Reference to a persisted artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    pub subject: String,
    pub filename: String,
    pub path: String,
}

/// Listing entry for a persisted artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    pub filename: String,
    pub path: String,
    pub reason: String,
    pub timestamp: String,
}

/// Where captured frames go.
///
/// Every `save` creates a new artifact; nothing is ever overwritten.
pub trait ArtifactStore: Send + Sync {
    fn save(&self, subject: &str, reason: &Reason, frame: &Frame) -> Result<ArtifactRef, StorageError>;

    /// Artifacts captured for a subject, oldest first
    fn list(&self, subject: &str) -> Result<Vec<ArtifactEntry>, StorageError>;

    /// Raw bytes of one artifact
    fn read(&self, subject: &str, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete one artifact
    fn remove(&self, subject: &str, name: &str) -> Result<(), StorageError>;

    fn root(&self) -> &Path;
}

/// Artifact store rooted at a directory: `<root>/<subject>/<reason>_<timestamp>.jpg`.
///
/// Subject directories are percent-encoded so distinct subjects never share one.
/// Artifacts are written to a temp file and only moved into place once complete.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create the store, making sure the root directory exists
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("Artifact store rooted at {}", root.display());
        Ok(Self { root })
    }

    fn subject_dir(&self, subject: &str) -> PathBuf {
        self.root.join(directory_name(subject))
    }

    /// Resolve `<root>/<subject>/<name>`, refusing anything outside the root
    fn resolve(&self, subject: &str, name: &str) -> Result<PathBuf, StorageError> {
        ensure_plain_component(name)?;
        if name.starts_with('.') {
            return Err(StorageError::NotFound);
        }

        let path = self.subject_dir(subject).join(name);
        if !path.exists() {
            return Err(StorageError::NotFound);
        }

        // Symlinks inside the root could still point elsewhere
        let root = self.root.canonicalize()?;
        let resolved = path.canonicalize()?;
        if !resolved.starts_with(&root) {
            warn!("Rejected artifact path outside root: {}", resolved.display());
            return Err(StorageError::Forbidden(format!("{}/{}", subject, name)));
        }
        Ok(resolved)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, subject: &str, reason: &Reason, frame: &Frame) -> Result<ArtifactRef, StorageError> {
        let jpeg = frame
            .encode_jpeg()
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let dir = self.subject_dir(subject);
        fs::create_dir_all(&dir)?;

        // Dot-prefixed temp name; removed on drop if anything below fails
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&jpeg)?;
        tmp.as_file().sync_all()?;

        let stem = format!("{}_{}", reason.label(), Local::now().format("%Y%m%d_%H%M%S_%6f"));
        let mut attempt = 0u32;
        loop {
            let filename = if attempt == 0 {
                format!("{}.jpg", stem)
            } else {
                format!("{}-{}.jpg", stem, attempt)
            };
            let path = dir.join(&filename);

            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    debug!("Wrote {} bytes to {}", jpeg.len(), path.display());
                    return Ok(ArtifactRef {
                        subject: subject.to_string(),
                        filename,
                        path: path.display().to_string(),
                    });
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists && attempt < 100 => {
                    tmp = e.file;
                    attempt += 1;
                }
                Err(e) => return Err(e.error.into()),
            }
        }
    }

    fn list(&self, subject: &str) -> Result<Vec<ArtifactEntry>, StorageError> {
        let dir = self.subject_dir(subject);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().into_owned();
            // In-flight temp files
            if filename.starts_with('.') {
                continue;
            }
            let (reason, timestamp) = parse_artifact_name(&filename);
            entries.push(ArtifactEntry {
                path: entry.path().display().to_string(),
                filename,
                reason,
                timestamp,
            });
        }

        // Timestamped names sort chronologically within a reason; order by time overall
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.filename.cmp(&b.filename)));
        Ok(entries)
    }

    fn read(&self, subject: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(subject, name)?;
        Ok(fs::read(path)?)
    }

    fn remove(&self, subject: &str, name: &str) -> Result<(), StorageError> {
        let path = self.resolve(subject, name)?;
        fs::remove_file(&path)?;
        info!("Removed artifact {}", path.display());
        Ok(())
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// Reject anything that is not a single ordinary path component
fn ensure_plain_component(value: &str) -> Result<(), StorageError> {
    let mut components = Path::new(value).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain || value.contains(&['/', '\\', '\0'][..]) {
        return Err(StorageError::Forbidden(value.to_string()));
    }
    Ok(())
}

/// Directory name for a subject; identifiers are client supplied.
///
/// Percent-encodes every byte outside `[A-Za-z0-9_@-]` (and `.` in all-dot
/// names), so the mapping is reversible and distinct subjects never collide.
fn directory_name(subject: &str) -> String {
    if subject.is_empty() {
        return "%".to_string();
    }

    let all_dots = subject.bytes().all(|b| b == b'.');
    let mut name = String::with_capacity(subject.len());
    for byte in subject.bytes() {
        let safe = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b'@')
            || (byte == b'.' && !all_dots);
        if safe {
            name.push(byte as char);
        } else {
            let _ = write!(name, "%{:02X}", byte);
        }
    }
    name
}

/// Split `<reason>_<YYYYmmdd>_<HHMMSS>_<micros>[-n].jpg` into reason and timestamp
fn parse_artifact_name(filename: &str) -> (String, String) {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    let parts: Vec<&str> = stem.rsplitn(4, '_').collect();

    match parts.as_slice() {
        [micros, time, date, reason]
            if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) =>
        {
            (reason.to_string(), format!("{}_{}_{}", date, time, micros))
        }
        _ => ("unknown".to_string(), "unknown".to_string()),
    }
}

//! On-disk blob storage for contract attachments and versions.
//!
//! # Responsibility
//! - Validate uploads (extension allowlist, size limit, file name).
//! - Lay out blobs as `contracts/<id>/files/<name>` and
//!   `contracts/<id>/versions/<name>` under a configured root.
//! - Describe stored files for preview.
//!
//! # Invariants
//! - Stored paths are relative, `/`-separated and never escape the root.
//! - An existing blob is never overwritten; collisions get `-<n>` suffixes.
//!   The name is claimed with an exclusive create, so concurrent stores of
//!   the same name land on distinct paths.

use crate::model::contract::ContractId;
use crate::model::document::ContractFile;
use log::{error, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Default upload limit: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Extensions accepted for contract attachments.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xlsx", "xls", "ppt", "pptx", "txt", "jpg", "jpeg", "png",
];

const MAX_FILE_NAME_CHARS: usize = 200;
const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Storage failures.
#[derive(Debug)]
pub enum StorageError {
    Io { path: PathBuf, source: io::Error },
    DisallowedExtension(String),
    TooLarge { size: u64, max: u64 },
    EmptyFile,
    InvalidName(String),
    /// Relative path pointing outside the storage root.
    OutsideRoot(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "storage io error at {}: {source}", path.display()),
            Self::DisallowedExtension(ext) => write!(f, "file type `.{ext}` is not allowed"),
            Self::TooLarge { size, max } => {
                write!(f, "file is {size} bytes; the limit is {max} bytes")
            }
            Self::EmptyFile => write!(f, "file is empty"),
            Self::InvalidName(name) => write!(f, "invalid file name `{name}`"),
            Self::OutsideRoot(path) => write!(f, "path `{path}` escapes the storage root"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Blob family under one contract directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    File,
    Version,
}

impl BlobKind {
    fn dir_name(self) -> &'static str {
        match self {
            Self::File => "files",
            Self::Version => "versions",
        }
    }
}

/// Result of a successful store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub relative_path: String,
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
}

/// Preview metadata for one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePreview {
    pub name: String,
    pub size: u64,
    pub size_label: String,
    pub mime_type: String,
    pub extension: String,
    pub previewable: bool,
}

/// File-system blob store rooted at one directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    max_upload_bytes: u64,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>, max_upload_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_upload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Checks name, extension and size; returns the sanitized file name.
    pub fn validate_upload(&self, original_name: &str, size: u64) -> Result<String, StorageError> {
        let name = sanitize_file_name(original_name)?;
        let extension = extension_of(&name);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(StorageError::DisallowedExtension(extension));
        }
        if size == 0 {
            return Err(StorageError::EmptyFile);
        }
        if size > self.max_upload_bytes {
            return Err(StorageError::TooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }
        Ok(name)
    }

    /// Writes `bytes` for `contract_id` and returns the stored location.
    pub fn store(
        &self,
        contract_id: ContractId,
        kind: BlobKind,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredBlob, StorageError> {
        let name = self.validate_upload(original_name, bytes.len() as u64)?;
        let relative_dir = format!("contracts/{contract_id}/{}", kind.dir_name());
        let absolute_dir = self.root.join(&relative_dir);
        fs::create_dir_all(&absolute_dir).map_err(|source| io_error(&absolute_dir, source))?;

        let (file_name, mut file) = create_unique(&absolute_dir, &name)?;
        let absolute_path = absolute_dir.join(&file_name);
        if let Err(source) = file.write_all(bytes).and_then(|()| file.sync_all()) {
            error!(
                "event=blob_store module=storage status=error kind={} error={}",
                kind.dir_name(),
                source
            );
            drop(file);
            let _ = fs::remove_file(&absolute_path);
            return Err(io_error(&absolute_path, source));
        }

        info!(
            "event=blob_store module=storage status=ok kind={} size={}",
            kind.dir_name(),
            bytes.len()
        );
        Ok(StoredBlob {
            relative_path: format!("{relative_dir}/{file_name}"),
            mime_type: mime_for_name(&file_name).to_string(),
            file_name,
            size: bytes.len() as u64,
        })
    }

    pub fn read(&self, relative_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(relative_path)?;
        fs::read(&path).map_err(|source| io_error(&path, source))
    }

    /// Removes one blob; a missing blob is not an error.
    pub fn remove(&self, relative_path: &str) -> Result<(), StorageError> {
        let path = self.resolve(relative_path)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    /// Removes every blob of one contract.
    pub fn remove_contract(&self, contract_id: ContractId) -> Result<(), StorageError> {
        let path = self.root.join(format!("contracts/{contract_id}"));
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    /// Absolute path of a stored blob after checking it stays under root.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(relative_path);
        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if relative_path.trim().is_empty() || escapes {
            return Err(StorageError::OutsideRoot(relative_path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

/// Preview metadata from stored file metadata.
pub fn preview(file: &ContractFile) -> FilePreview {
    let extension = extension_of(&file.original_filename);
    FilePreview {
        name: file.original_filename.clone(),
        size: file.file_size,
        size_label: human_size(file.file_size),
        mime_type: if file.mime_type.is_empty() {
            mime_for_name(&file.original_filename).to_string()
        } else {
            file.mime_type.clone()
        },
        previewable: is_previewable(&extension),
        extension,
    }
}

/// Strips directories and unsafe characters from an uploaded file name.
pub fn sanitize_file_name(original: &str) -> Result<String, StorageError> {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '.' | '-' | '_' | ' ' | '(' | ')') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|ch: char| ch == '.' || ch.is_whitespace());

    if cleaned.is_empty() {
        return Err(StorageError::InvalidName(original.to_string()));
    }

    let (stem, extension) = split_name(cleaned);
    let stem: String = stem.chars().take(MAX_FILE_NAME_CHARS).collect();
    Ok(match extension {
        Some(extension) => format!("{stem}.{}", extension.to_ascii_lowercase()),
        None => stem,
    })
}

pub fn extension_of(name: &str) -> String {
    split_name(name)
        .1
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

pub fn mime_for_name(name: &str) -> &'static str {
    match extension_of(name).as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

fn is_previewable(extension: &str) -> bool {
    matches!(extension, "pdf" | "jpg" | "jpeg" | "png" | "txt")
}

/// `B`, `KB`, `MB` with one decimal above bytes.
pub fn human_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    let value = size as f64;
    if value < KB {
        format!("{size} B")
    } else if value < KB * KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{:.1} MB", value / (KB * KB))
    }
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => {
            (stem, Some(extension))
        }
        _ => (name, None),
    }
}

/// Creates the first free `name`, `name-1`, ... in `dir` and returns it open
/// for writing.
fn create_unique(dir: &Path, name: &str) -> Result<(String, File), StorageError> {
    let (stem, extension) = split_name(name);
    for suffix in 0..=MAX_COLLISION_SUFFIX {
        let candidate = match (suffix, extension) {
            (0, _) => name.to_string(),
            (_, Some(extension)) => format!("{stem}-{suffix}.{extension}"),
            (_, None) => format!("{stem}-{suffix}"),
        };
        let path = dir.join(&candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((candidate, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(io_error(&path, source)),
        }
    }
    Err(StorageError::InvalidName(name.to_string()))
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn sanitize_strips_directories_and_lowercases_extension() {
        assert_eq!(sanitize_file_name("../../etc/passwd.PDF").unwrap(), "passwd.pdf");
        assert_eq!(sanitize_file_name("C:\\docs\\msa v2.docx").unwrap(), "msa v2.docx");
        assert_eq!(sanitize_file_name("a<b>.txt").unwrap(), "a_b_.txt");
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("../..").is_err());
        assert_eq!(sanitize_file_name("Offer..v2.pdf").unwrap(), "Offer..v2.pdf");
        assert!(sanitize_file_name("   ").is_err());
    }

    #[test]
    fn validate_upload_enforces_allowlist_and_limit() {
        let store = DocumentStore::new("/tmp/unused", 10);
        assert_eq!(store.validate_upload("deck.pptx", 5).unwrap(), "deck.pptx");
        assert!(matches!(
            store.validate_upload("run.exe", 5),
            Err(StorageError::DisallowedExtension(ext)) if ext == "exe"
        ));
        assert!(matches!(
            store.validate_upload("big.pdf", 11),
            Err(StorageError::TooLarge { size: 11, max: 10 })
        ));
        assert!(matches!(store.validate_upload("empty.pdf", 0), Err(StorageError::EmptyFile)));
    }

    #[test]
    fn store_suffixes_collisions_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), DEFAULT_MAX_UPLOAD_BYTES);
        let id = Uuid::new_v4();

        let first = store.store(id, BlobKind::File, "msa.pdf", b"one").unwrap();
        let second = store.store(id, BlobKind::File, "msa.pdf", b"two").unwrap();
        assert_eq!(first.relative_path, format!("contracts/{id}/files/msa.pdf"));
        assert_eq!(second.relative_path, format!("contracts/{id}/files/msa-1.pdf"));
        assert_eq!(first.mime_type, "application/pdf");
        assert_eq!(store.read(&second.relative_path).unwrap(), b"two");

        store.remove(&first.relative_path).unwrap();
        store.remove(&first.relative_path).unwrap();
        store.remove_contract(id).unwrap();
        assert!(store.read(&second.relative_path).is_err());
    }

    #[test]
    fn concurrent_stores_of_one_name_never_share_a_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), DEFAULT_MAX_UPLOAD_BYTES);
        let id = Uuid::new_v4();

        for round in 0..25 {
            let name = format!("r{round}.pdf");
            let stored: Vec<(StoredBlob, Vec<u8>)> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..8)
                    .map(|writer| {
                        let (store, name) = (&store, &name);
                        scope.spawn(move || {
                            let bytes = format!("round {round} writer {writer}").into_bytes();
                            (store.store(id, BlobKind::File, name, &bytes).unwrap(), bytes)
                        })
                    })
                    .collect();
                handles.into_iter().map(|handle| handle.join().unwrap()).collect()
            });

            let mut paths: Vec<&str> = stored
                .iter()
                .map(|(blob, _)| blob.relative_path.as_str())
                .collect();
            paths.sort_unstable();
            paths.dedup();
            assert_eq!(paths.len(), 8, "round {round} reused a path");
            for (blob, bytes) in &stored {
                assert_eq!(&store.read(&blob.relative_path).unwrap(), bytes);
            }
        }
    }

    #[test]
    fn resolve_rejects_escaping_paths() {
        let store = DocumentStore::new("/srv/blobs", DEFAULT_MAX_UPLOAD_BYTES);
        assert!(store.resolve("../secret").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("contracts/x/files/a.pdf").is_ok());
    }

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}

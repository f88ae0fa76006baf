//! Owner-scoped, content-addressed file storage.
//!
//! Files are identified by their SHA-256 hash, which gives:
//!
//! - **Integrity**: content is re-hashed and verified on every read
//! - **Immutability**: an existing hash is never overwritten
//! - **Deterministic paths**: the same content always lands at the same location
//!
//! Storage for one owner never touches another owner's directory; the owner identifier is a
//! canonical UUID, so sharded paths cannot escape the root.

use crate::{FilesError, FILES_FOLDER_NAME, HASH_ALGORITHM};
use chrono::{DateTime, Utc};
use riskcare_types::NonEmptyText;
use riskcare_uuid::{Sha256Hash, ShardableUuid};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata for a stored file.
///
/// Contains no patient identifiers beyond the owning directory, so it can be embedded in report
/// records and serialised alongside them.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    /// Hashing algorithm used (always "sha256" for current implementation)
    pub hash_algorithm: NonEmptyText,

    /// Hexadecimal digest of the file content
    pub hash: Sha256Hash,

    /// Path relative to the owner's storage root
    pub relative_path: NonEmptyText,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Detected media type, if the content has a recognisable signature.
    ///
    /// Best-effort only; plain-text formats such as Markdown are not detected.
    pub media_type: Option<NonEmptyText>,

    /// File name supplied when the content was added
    pub original_filename: NonEmptyText,

    /// UTC timestamp when the file was stored
    pub stored_at: DateTime<Utc>,
}

/// Service for managing stored documents under a single root directory.
#[derive(Debug, Clone)]
pub struct FilesService {
    root_directory: PathBuf,
}

impl FilesService {
    /// Creates a new `FilesService` rooted at `root_directory`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the root does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root_directory: &Path) -> Result<Self, FilesError> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Adds `bytes` to the owner's content-addressed storage.
    ///
    /// # Arguments
    ///
    /// * `owner` - Identifier of the owning patient
    /// * `original_filename` - Display name recorded in the metadata (no path separators)
    /// * `bytes` - File content
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - the file name is empty or contains a path separator
    /// - content with the same hash is already stored (immutability violation)
    /// - directory creation or the write fails
    pub fn add_bytes(
        &self,
        owner: &ShardableUuid,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<FileMetadata, FilesError> {
        let original_filename = NonEmptyText::new(original_filename)
            .map_err(|_| FilesError::InvalidFileName("file name cannot be empty".into()))?;
        if original_filename.as_str().contains(['/', '\\'])
            || original_filename.as_str().contains("..")
        {
            return Err(FilesError::InvalidFileName(
                original_filename.as_str().to_string(),
            ));
        }

        let hash = hash_bytes(bytes);
        let storage_path = self.storage_path(owner, &hash);

        if storage_path.exists() {
            return Err(FilesError::FileAlreadyExists(hash.to_string()));
        }

        if let Some(parent) = storage_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create storage directory {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        // Stage under a temporary name; the content address only ever holds complete blobs.
        let tmp_path = storage_path.with_extension("tmp");
        fs::write(&tmp_path, bytes).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write file to {}: {}", tmp_path.display(), e),
            ))
        })?;
        fs::rename(&tmp_path, &storage_path)?;

        let media_type = infer::get(bytes).and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        Ok(FileMetadata {
            hash_algorithm: NonEmptyText::new(HASH_ALGORITHM).expect("sha256 is non-empty"),
            relative_path: relative_path(&hash),
            hash,
            size_bytes: bytes.len() as u64,
            media_type,
            original_filename,
            stored_at: Utc::now(),
        })
    }

    /// Reads a stored file and verifies it still matches its hash.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - no file is stored for `hash` ([`FilesError::NotFound`])
    /// - the file cannot be read (I/O)
    /// - the content no longer matches the hash ([`FilesError::IntegrityMismatch`])
    pub fn read(&self, owner: &ShardableUuid, hash: &Sha256Hash) -> Result<Vec<u8>, FilesError> {
        let storage_path = self.storage_path(owner, hash);

        if !storage_path.is_file() {
            return Err(FilesError::NotFound(hash.to_string()));
        }

        let bytes = fs::read(&storage_path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to read file from {}: {}",
                    storage_path.display(),
                    e
                ),
            ))
        })?;

        if &hash_bytes(&bytes) != hash {
            return Err(FilesError::IntegrityMismatch(hash.to_string()));
        }

        Ok(bytes)
    }

    /// Returns true if content with `hash` is stored for `owner`.
    pub fn contains(&self, owner: &ShardableUuid, hash: &Sha256Hash) -> bool {
        self.storage_path(owner, hash).is_file()
    }

    /// Root directory containing every owner's storage.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    fn owner_root(&self, owner: &ShardableUuid) -> PathBuf {
        owner.sharded_dir(&self.root_directory)
    }

    /// `<owner_root>/files/sha256/<h[0..2]>/<h[2..4]>/<hash>`
    fn storage_path(&self, owner: &ShardableUuid, hash: &Sha256Hash) -> PathBuf {
        self.owner_root(owner).join(relative_path(hash).as_str())
    }
}

fn hash_bytes(bytes: &[u8]) -> Sha256Hash {
    let digest: [u8; 32] = Sha256::digest(bytes).into();
    Sha256Hash::from_bytes(&digest)
}

fn relative_path(hash: &Sha256Hash) -> NonEmptyText {
    let hex = hash.as_str();
    NonEmptyText::new(format!(
        "{}/{}/{}/{}/{}",
        FILES_FOLDER_NAME,
        HASH_ALGORITHM,
        &hex[0..2],
        &hex[2..4],
        hex
    ))
    .expect("computed path is non-empty")
}

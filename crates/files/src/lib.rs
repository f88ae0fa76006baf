//! Document storage for rendered risk reports.
//!
//! Rendered report documents are stored as immutable, content-addressed blobs, scoped per owning
//! patient. Report records only ever hold a reference (the hash plus metadata), so a report stays
//! valid even when its document bytes are missing; callers regenerate on demand in that case.
//!
//! ## Storage model
//!
//! ```text
//! documents/
//! └── <s1>/<s2>/<owner_id>/
//!     └── files/
//!         └── sha256/
//!             └── ab/
//!                 └── cd/
//!                     └── abcd3f9e…
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use riskcare_files::FilesService;
//! use riskcare_uuid::ShardableUuid;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::new(Path::new("risk_data/documents"))?;
//! let owner = ShardableUuid::parse("550e8400e29b41d4a716446655440000")?;
//! let meta = service.add_bytes(&owner, "report.md", b"# Report")?;
//! let bytes = service.read(&owner, &meta.hash)?;
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::{FILES_FOLDER_NAME, HASH_ALGORITHM};
pub use files::{FileMetadata, FilesService};
pub use riskcare_uuid::{Sha256Hash, ShardableUuid};

/// Errors that can occur during document storage operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// A file name supplied by the caller was empty or unsafe
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// File already exists in content-addressed storage (immutability violation)
    #[error("File with hash {0} already exists in storage")]
    FileAlreadyExists(String),

    /// No stored file matches the requested hash
    #[error("File not found for hash: {0}")]
    NotFound(String),

    /// Stored bytes no longer hash to the name they are stored under
    #[error("Stored file {0} failed integrity verification")]
    IntegrityMismatch(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

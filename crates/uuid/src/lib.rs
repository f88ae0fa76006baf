//! Identifier and sharded-path utilities.
//!
//! Records and stored documents live under sharded directories derived from an identifier.
//!
//! To keep path derivation deterministic, every record identifier uses a *canonical* UUID
//! representation: **32 lowercase hexadecimal characters** (no hyphens). Content-addressed
//! documents use a lowercase SHA-256 hex digest in the same way.
//!
//! This crate provides:
//! - [`ShardableUuid`], which guarantees the canonical format once constructed
//! - [`Sha256Hash`], a validated 64-character hex digest
//! - the shared sharding rule used by both
//!
//! ## Sharded directory layout
//! For a canonical value `u`, data is stored under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>`
//!
//! Example:
//! `risk_data/review_requests/55/0e/550e8400e29b41d4a716446655440000.yaml`

mod service;

pub use service::{Sha256Hash, ShardableUuid, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;

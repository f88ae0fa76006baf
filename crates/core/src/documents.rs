//! Storage of rendered report documents.

use crate::ids::UserId;
use crate::model::DocumentRef;
use crate::render::RenderedDocument;
use crate::{CoreError, CoreResult};
use chrono::Utc;
use riskcare_files::{FilesError, FilesService, Sha256Hash};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

pub trait DocumentStore: Send + Sync {
    /// Stores `document` for `owner` and returns a reference to it.
    fn put(&self, owner: UserId, document: &RenderedDocument) -> CoreResult<DocumentRef>;

    /// Reads back the bytes behind `document`.
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes are missing or fail verification; callers regenerate in
    /// that case.
    fn get(&self, owner: UserId, document: &DocumentRef) -> CoreResult<Vec<u8>>;
}

/// Content-addressed document storage on disk, one directory per owning patient.
#[derive(Debug, Clone)]
pub struct FilesDocumentStore {
    files: FilesService,
}

impl FilesDocumentStore {
    /// Opens document storage under `root`, creating the directory if needed.
    pub fn open(root: &Path) -> CoreResult<Self> {
        std::fs::create_dir_all(root).map_err(CoreError::StorageDirCreation)?;
        Ok(Self {
            files: FilesService::new(root)?,
        })
    }
}

impl DocumentStore for FilesDocumentStore {
    fn put(&self, owner: UserId, document: &RenderedDocument) -> CoreResult<DocumentRef> {
        match self
            .files
            .add_bytes(owner.shardable(), &document.file_name, &document.bytes)
        {
            Ok(meta) => Ok(DocumentRef {
                key: meta.hash.to_string(),
                file_name: meta.original_filename.into_inner(),
                media_type: meta
                    .media_type
                    .map(|m| m.into_inner())
                    .unwrap_or_else(|| document.media_type.clone()),
                size_bytes: meta.size_bytes,
                stored_at: meta.stored_at,
            }),
            // Identical bytes are already stored; reuse them.
            Err(FilesError::FileAlreadyExists(hash)) => Ok(DocumentRef {
                key: hash,
                file_name: document.file_name.clone(),
                media_type: document.media_type.clone(),
                size_bytes: document.bytes.len() as u64,
                stored_at: Utc::now(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, owner: UserId, document: &DocumentRef) -> CoreResult<Vec<u8>> {
        let hash = Sha256Hash::parse(&document.key)?;
        Ok(self.files.read(owner.shardable(), &hash)?)
    }
}

/// Document storage held in process memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<(UserId, String), Vec<u8>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn put(&self, owner: UserId, document: &RenderedDocument) -> CoreResult<DocumentRef> {
        let key = Uuid::new_v4().simple().to_string();
        self.documents
            .lock()
            .map_err(|_| CoreError::LockPoisoned)?
            .insert((owner, key.clone()), document.bytes.clone());
        Ok(DocumentRef {
            key,
            file_name: document.file_name.clone(),
            media_type: document.media_type.clone(),
            size_bytes: document.bytes.len() as u64,
            stored_at: Utc::now(),
        })
    }

    fn get(&self, owner: UserId, document: &DocumentRef) -> CoreResult<Vec<u8>> {
        self.documents
            .lock()
            .map_err(|_| CoreError::LockPoisoned)?
            .get(&(owner, document.key.clone()))
            .cloned()
            .ok_or_else(|| CoreError::not_found("document", &document.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(body: &str) -> RenderedDocument {
        RenderedDocument {
            file_name: "risk_report.md".into(),
            media_type: "text/markdown; charset=utf-8".into(),
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_files_document_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FilesDocumentStore::open(&temp.path().join("documents")).unwrap();
        let owner = UserId::new();

        let reference = store.put(owner, &doc("# Report")).unwrap();
        assert_eq!(reference.key.len(), 64);
        assert_eq!(reference.media_type, "text/markdown; charset=utf-8");
        assert_eq!(store.get(owner, &reference).unwrap(), b"# Report");

        // Same bytes again reuse the stored blob.
        let again = store.put(owner, &doc("# Report")).unwrap();
        assert_eq!(again.key, reference.key);
    }

    #[test]
    fn test_files_document_store_is_owner_scoped() {
        let temp = TempDir::new().unwrap();
        let store = FilesDocumentStore::open(temp.path()).unwrap();

        let reference = store.put(UserId::new(), &doc("private")).unwrap();
        assert!(store.get(UserId::new(), &reference).is_err());
    }

    #[test]
    fn test_memory_document_store() {
        let store = MemoryDocumentStore::new();
        let owner = UserId::new();
        let reference = store.put(owner, &doc("body")).unwrap();
        assert_eq!(store.get(owner, &reference).unwrap(), b"body");
        assert!(matches!(
            store.get(UserId::new(), &reference),
            Err(CoreError::NotFound { .. })
        ));
    }
}

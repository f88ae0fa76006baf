//! Wiring of stores and services for a given [`CoreConfig`].

use crate::access::ReportAccessService;
use crate::accounts::AccountService;
use crate::config::{CoreConfig, StorageBackend};
use crate::documents::{DocumentStore, FilesDocumentStore, MemoryDocumentStore};
use crate::notifications::NotificationService;
use crate::render::MarkdownReportRenderer;
use crate::reports::ReportMaterializer;
use crate::results::ResultService;
use crate::review::ReviewService;
use crate::store::{FileStore, MemoryStore, RecordStore};
use crate::CoreResult;
use std::sync::Arc;

/// Every core service, sharing one record store and one document store.
#[derive(Clone)]
pub struct Platform {
    pub accounts: AccountService,
    pub results: ResultService,
    pub reviews: ReviewService,
    pub notifications: NotificationService,
    pub reports: ReportAccessService,
}

impl Platform {
    /// Opens the configured storage and builds the services on top of it.
    pub fn from_config(config: &CoreConfig) -> CoreResult<Self> {
        let (store, documents): (Arc<dyn RecordStore>, Arc<dyn DocumentStore>) =
            match config.storage_backend() {
                StorageBackend::Files => (
                    Arc::new(FileStore::open(config.data_dir())?),
                    Arc::new(FilesDocumentStore::open(&config.documents_dir())?),
                ),
                StorageBackend::Memory => (
                    Arc::new(MemoryStore::new()),
                    Arc::new(MemoryDocumentStore::new()),
                ),
            };
        tracing::info!(
            "storage: {} ({})",
            config.storage_backend(),
            config.data_dir().display()
        );
        Ok(Self::with_stores(store, documents))
    }

    pub fn with_stores(store: Arc<dyn RecordStore>, documents: Arc<dyn DocumentStore>) -> Self {
        let materializer =
            ReportMaterializer::new(store.clone(), documents, Arc::new(MarkdownReportRenderer::new()));
        let notifications = NotificationService::new(store.clone());

        Self {
            accounts: AccountService::new(store.clone()),
            results: ResultService::new(store.clone()),
            reviews: ReviewService::new(store.clone(), materializer.clone(), notifications.clone()),
            reports: ReportAccessService::new(store, materializer),
            notifications,
        }
    }

    /// An in-memory platform, for tests and demos.
    pub fn in_memory() -> Self {
        Self::with_stores(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryDocumentStore::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::NewAccount;
    use crate::caller::CallerContext;
    use crate::model::{Disease, Role};
    use crate::results::NewPredictionResult;
    use crate::review::NewReviewRequest;
    use crate::status::ReviewStatus;
    use tempfile::TempDir;

    fn register_patient(platform: &Platform, name: &str) -> CallerContext {
        let user = platform
            .accounts
            .register(NewAccount {
                username: name.into(),
                email: format!("{name}@example.com"),
                role: Role::Patient,
                doctor_profile: None,
            })
            .unwrap();
        CallerContext::patient(user.id)
    }

    /// Runs the full review workflow end to end.
    fn run_workflow(platform: &Platform) {
        platform.accounts.seed_doctors().unwrap();
        let doctor = platform.accounts.list_doctors(true).unwrap()[0].clone();
        let doctor_ctx = CallerContext::doctor(doctor.id);
        let patient = register_patient(platform, "alice");

        let result = platform
            .results
            .record_result(
                &patient,
                NewPredictionResult {
                    disease: Some(Disease::HeartDisease),
                    prediction: Some("High Risk".into()),
                    probability: Some(0.82),
                    ..Default::default()
                },
            )
            .unwrap();
        let request = platform
            .reviews
            .create_request(
                &patient,
                NewReviewRequest {
                    doctor_id: Some(doctor.id),
                    result_id: Some(result.id),
                },
            )
            .unwrap();

        assert!(platform
            .reports
            .view_request_report(request.id, &doctor_ctx)
            .is_err());
        platform.reviews.accept(request.id, &doctor_ctx).unwrap();
        let view = platform
            .reports
            .view_request_report(request.id, &doctor_ctx)
            .unwrap();
        assert!(String::from_utf8(view.bytes)
            .unwrap()
            .contains("Consult a Cardiologist IMMEDIATELY"));

        let done = platform
            .reviews
            .submit_review(request.id, &doctor_ctx, Some("Book an ECG."), true)
            .unwrap();
        assert_eq!(done.status, ReviewStatus::Completed);
        assert_eq!(platform.notifications.unread_count(&patient).unwrap(), 2);
        assert_eq!(platform.notifications.unread_count(&doctor_ctx).unwrap(), 1);
    }

    #[test]
    fn test_in_memory_workflow() {
        run_workflow(&Platform::in_memory());
    }

    #[test]
    fn test_file_backed_workflow() {
        let temp = TempDir::new().unwrap();
        let config = CoreConfig::new(temp.path().join("data"), StorageBackend::Files).unwrap();
        run_workflow(&Platform::from_config(&config).unwrap());
        assert!(config.documents_dir().is_dir());
    }
}

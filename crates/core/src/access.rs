//! Who may read a report, and retrieval with regeneration fallback.

use crate::caller::CallerContext;
use crate::ids::{ReportId, RequestId};
use crate::model::{Report, ReviewRequest, Role};
use crate::reports::ReportMaterializer;
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use std::sync::Arc;

pub struct AccessPolicy;

impl AccessPolicy {
    /// The owning patient may always view; the assigned doctor only once the request has been
    /// accepted (and after it is completed); nobody else ever.
    pub fn can_view_report(request: &ReviewRequest, caller: &CallerContext) -> bool {
        match caller.role {
            Role::Patient => caller.user_id == request.patient_id,
            Role::Doctor => {
                caller.user_id == request.doctor_id && request.status.doctor_may_view()
            }
        }
    }
}

/// A report together with its document bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportView {
    pub report: Report,
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
    /// True when no stored document could be read and the bytes were rendered on the fly.
    pub regenerated: bool,
}

#[derive(Clone)]
pub struct ReportAccessService {
    store: Arc<dyn RecordStore>,
    materializer: ReportMaterializer,
}

impl ReportAccessService {
    pub fn new(store: Arc<dyn RecordStore>, materializer: ReportMaterializer) -> Self {
        Self {
            store,
            materializer,
        }
    }

    /// Returns the report attached to a review request, subject to [`AccessPolicy`].
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the request or its report does not exist
    /// - [`CoreError::ReportAccessDenied`] if the policy refuses the caller
    pub fn view_request_report(
        &self,
        request_id: RequestId,
        caller: &CallerContext,
    ) -> CoreResult<ReportView> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| CoreError::not_found("review request", request_id))?;

        if !AccessPolicy::can_view_report(&request, caller) {
            tracing::info!(
                "report access denied: request {} caller {} ({})",
                request.id,
                caller.user_id,
                caller.role
            );
            return Err(CoreError::ReportAccessDenied);
        }

        let report = self
            .store
            .get_report(request.report_id)?
            .ok_or_else(|| CoreError::not_found("report", request.report_id))?;
        self.load_view(report)
    }

    /// Returns one of the caller's own reports by id.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the report does not exist
    /// - [`CoreError::ReportNotOwned`] unless the caller is the owning patient
    pub fn view_own_report(
        &self,
        report_id: ReportId,
        caller: &CallerContext,
    ) -> CoreResult<ReportView> {
        let report = self
            .store
            .get_report(report_id)?
            .ok_or_else(|| CoreError::not_found("report", report_id))?;
        if caller.role != Role::Patient || report.patient_id != caller.user_id {
            return Err(CoreError::ReportNotOwned);
        }
        self.load_view(report)
    }

    fn load_view(&self, report: Report) -> CoreResult<ReportView> {
        if let Some(document) = &report.document {
            match self.materializer.read_document(&report, document) {
                Ok(bytes) => {
                    return Ok(ReportView {
                        file_name: document.file_name.clone(),
                        media_type: document.media_type.clone(),
                        bytes,
                        regenerated: false,
                        report,
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        "stored document for report {} unreadable, regenerating: {}",
                        report.id,
                        e
                    );
                }
            }
        }

        let rendered = self.materializer.regenerate(&report)?;
        let report = self.store.get_report(report.id)?.unwrap_or(report);
        Ok(ReportView {
            report,
            file_name: rendered.file_name,
            media_type: rendered.media_type,
            bytes: rendered.bytes,
            regenerated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{DocumentStore, MemoryDocumentStore};
    use crate::ids::UserId;
    use crate::model::DocumentRef;
    use crate::render::MarkdownReportRenderer;
    use crate::reports::tests::FailingRenderer;
    use crate::status::ReviewStatus;
    use crate::store::{contract, InsertOutcome, MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        documents: Arc<MemoryDocumentStore>,
        service: ReportAccessService,
        patient: UserId,
        doctor: UserId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let materializer = ReportMaterializer::new(
            store.clone(),
            documents.clone(),
            Arc::new(MarkdownReportRenderer::new()),
        );
        let patient = contract::patient("alice");
        let doctor = contract::doctor("drsarah", None);
        store.insert_user(&patient).unwrap();
        store.insert_user(&doctor).unwrap();
        Fixture {
            service: ReportAccessService::new(store.clone(), materializer),
            store,
            documents,
            patient: patient.id,
            doctor: doctor.id,
        }
    }

    fn request_with_report(fx: &Fixture, status: ReviewStatus) -> (ReviewRequest, Report) {
        let result = contract::result_for(fx.patient);
        fx.store.put_result(&result).unwrap();
        let materializer = ReportMaterializer::new(
            fx.store.clone(),
            fx.documents.clone(),
            Arc::new(MarkdownReportRenderer::new()),
        );
        let report = materializer.ensure_report(&result).unwrap();
        let mut request = contract::request(fx.patient, fx.doctor, report.id);
        request.status = status;
        match fx.store.insert_request_unless_active(request).unwrap() {
            InsertOutcome::Inserted(r) => (r, report),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_can_view_report_policy() {
        let patient = UserId::new();
        let doctor = UserId::new();
        let mut request = contract::request(patient, doctor, ReportId::new());

        for status in ReviewStatus::ALL {
            request.status = status;
            assert!(AccessPolicy::can_view_report(
                &request,
                &CallerContext::patient(patient)
            ));
            assert_eq!(
                AccessPolicy::can_view_report(&request, &CallerContext::doctor(doctor)),
                matches!(status, ReviewStatus::Accepted | ReviewStatus::Completed),
                "doctor in {status}"
            );
            assert!(!AccessPolicy::can_view_report(
                &request,
                &CallerContext::doctor(UserId::new())
            ));
            assert!(!AccessPolicy::can_view_report(
                &request,
                &CallerContext::patient(UserId::new())
            ));
            // The patient's id presented with the doctor role is not the assigned doctor.
            assert!(!AccessPolicy::can_view_report(
                &request,
                &CallerContext::doctor(patient)
            ));
        }
    }

    #[test]
    fn test_doctor_view_follows_status() {
        let fx = fixture();
        let (pending, _) = request_with_report(&fx, ReviewStatus::Pending);
        assert!(matches!(
            fx.service
                .view_request_report(pending.id, &CallerContext::doctor(fx.doctor)),
            Err(CoreError::ReportAccessDenied)
        ));

        let (accepted, report) = request_with_report(&fx, ReviewStatus::Accepted);
        let view = fx
            .service
            .view_request_report(accepted.id, &CallerContext::doctor(fx.doctor))
            .unwrap();
        assert_eq!(view.report.id, report.id);
        assert!(!view.regenerated);
        assert!(String::from_utf8(view.bytes).unwrap().contains("alice"));
    }

    #[test]
    fn test_missing_document_is_regenerated() {
        let fx = fixture();
        let result = contract::result_for(fx.patient);
        fx.store.put_result(&result).unwrap();
        let failing = ReportMaterializer::new(
            fx.store.clone(),
            fx.documents.clone(),
            Arc::new(FailingRenderer),
        );
        let report = failing.ensure_report(&result).unwrap();
        assert!(report.document.is_none());

        let view = fx
            .service
            .view_own_report(report.id, &CallerContext::patient(fx.patient))
            .unwrap();
        assert!(view.regenerated);
        assert!(view.report.document.is_some());
        assert!(String::from_utf8(view.bytes).unwrap().contains("High Risk"));
    }

    #[test]
    fn test_unreadable_document_is_regenerated() {
        let fx = fixture();
        let (request, report) = request_with_report(&fx, ReviewStatus::Completed);
        let dangling = DocumentRef {
            key: "missing".into(),
            ..report.document.clone().unwrap()
        };
        fx.store.attach_report_document(report.id, dangling).unwrap();

        let view = fx
            .service
            .view_request_report(request.id, &CallerContext::patient(fx.patient))
            .unwrap();
        assert!(view.regenerated);
        let attached = view.report.document.unwrap();
        assert_ne!(attached.key, "missing");
        assert!(fx.documents.get(fx.patient, &attached).is_ok());
    }

    #[test]
    fn test_view_own_report_is_owner_only() {
        let fx = fixture();
        let (_, report) = request_with_report(&fx, ReviewStatus::Accepted);

        assert!(matches!(
            fx.service
                .view_own_report(report.id, &CallerContext::doctor(fx.doctor)),
            Err(CoreError::ReportNotOwned)
        ));
        assert!(matches!(
            fx.service
                .view_own_report(ReportId::new(), &CallerContext::patient(fx.patient)),
            Err(CoreError::NotFound { .. })
        ));
    }
}

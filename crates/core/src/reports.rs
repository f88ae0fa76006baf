//! Report materialisation.
//!
//! A [`Report`] is derived from exactly one prediction result and created lazily, the first time
//! anything needs it. Document rendering and storage are best-effort: failures are logged and
//! the report is stored without a document reference.

use crate::documents::DocumentStore;
use crate::ids::{ReportId, UserId};
use crate::model::{DocumentRef, PredictionResult, Report};
use crate::render::{DocumentRenderer, RenderedDocument, ReportData};
use crate::store::RecordStore;
use crate::CoreResult;
use chrono::Utc;
use riskcare_types::Probability;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReportMaterializer {
    store: Arc<dyn RecordStore>,
    documents: Arc<dyn DocumentStore>,
    renderer: Arc<dyn DocumentRenderer>,
}

impl ReportMaterializer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        documents: Arc<dyn DocumentStore>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            store,
            documents,
            renderer,
        }
    }

    /// Returns the report for `result`, creating it on first use.
    ///
    /// Idempotent: a second call returns the same report unchanged. The risk score is the
    /// result's probability, or zero when the classifier reported none. Only the caller whose
    /// record wins the insert renders and attaches a document, so a lost race leaves no
    /// unreferenced document behind.
    ///
    /// # Errors
    ///
    /// Returns a storage error only if the report record itself cannot be read or written.
    pub fn ensure_report(&self, result: &PredictionResult) -> CoreResult<Report> {
        if let Some(existing) = self.store.find_report_for_result(result.id)? {
            return Ok(existing);
        }

        let candidate = Report {
            id: ReportId::new(),
            patient_id: result.owner_id,
            result_id: result.id,
            disease: result.disease,
            risk_score: result.probability.unwrap_or(Probability::ZERO),
            document: None,
            created_at: Utc::now(),
        };
        let candidate_id = candidate.id;
        let stored = self.store.insert_report_if_absent(candidate)?;
        if stored.id != candidate_id {
            return Ok(stored);
        }
        tracing::info!("created report {} for result {}", stored.id, result.id);

        let data = ReportData {
            patient_name: self.patient_name(result.owner_id),
            generated_at: stored.created_at,
            disease: result.disease,
            prediction: result.prediction.to_string(),
            probability: stored.risk_score,
        };
        let attached = self
            .render_and_store(result.owner_id, &data)
            .and_then(|document| self.store.attach_report_document(stored.id, document));
        match attached {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::warn!(
                    "report document for result {} not stored: {}",
                    result.id,
                    e
                );
                Ok(stored)
            }
        }
    }

    /// Renders `report` afresh and tries to store and attach the new document.
    ///
    /// Storage and attachment are best-effort; the rendered document is returned either way.
    ///
    /// # Errors
    ///
    /// Returns an error only when rendering itself fails.
    pub fn regenerate(&self, report: &Report) -> CoreResult<RenderedDocument> {
        let prediction = match self.store.get_result(report.result_id) {
            Ok(Some(result)) => result.prediction.into_inner(),
            _ => "N/A".to_string(),
        };
        let data = ReportData {
            patient_name: self.patient_name(report.patient_id),
            generated_at: report.created_at,
            disease: report.disease,
            prediction,
            probability: report.risk_score,
        };
        let rendered = self.renderer.render(&data)?;

        match self
            .documents
            .put(report.patient_id, &rendered)
            .and_then(|document| self.store.attach_report_document(report.id, document))
        {
            Ok(_) => tracing::info!("regenerated document for report {}", report.id),
            Err(e) => tracing::warn!(
                "regenerated document for report {} not persisted: {}",
                report.id,
                e
            ),
        }

        Ok(rendered)
    }

    /// Reads the stored document bytes of `report`, if it has a document.
    pub(crate) fn read_document(&self, report: &Report, document: &DocumentRef) -> CoreResult<Vec<u8>> {
        self.documents.get(report.patient_id, document)
    }

    fn render_and_store(&self, owner: UserId, data: &ReportData) -> CoreResult<DocumentRef> {
        let rendered = self.renderer.render(data)?;
        self.documents.put(owner, &rendered)
    }

    fn patient_name(&self, owner: UserId) -> Option<String> {
        match self.store.get_user(owner) {
            Ok(user) => user.map(|u| u.username.into_inner()),
            Err(e) => {
                tracing::warn!("could not load patient {} for report: {}", owner, e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::documents::MemoryDocumentStore;
    use crate::render::MarkdownReportRenderer;
    use crate::store::{contract, MemoryStore};
    use crate::CoreError;
    use riskcare_types::NonEmptyText;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    /// Renderer that always fails, for exercising the non-fatal path.
    pub struct FailingRenderer;

    impl DocumentRenderer for FailingRenderer {
        fn render(&self, _data: &ReportData) -> CoreResult<RenderedDocument> {
            Err(CoreError::Render("renderer unavailable".into()))
        }
    }

    /// Markdown renderer that counts how often it was asked to render.
    #[derive(Default)]
    struct CountingRenderer {
        renders: AtomicUsize,
    }

    impl DocumentRenderer for CountingRenderer {
        fn render(&self, data: &ReportData) -> CoreResult<RenderedDocument> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            MarkdownReportRenderer::new().render(data)
        }
    }

    fn materializer(renderer: Arc<dyn DocumentRenderer>) -> (Arc<MemoryStore>, ReportMaterializer) {
        let store = Arc::new(MemoryStore::new());
        let materializer = ReportMaterializer::new(
            store.clone(),
            Arc::new(MemoryDocumentStore::new()),
            renderer,
        );
        (store, materializer)
    }

    #[test]
    fn test_ensure_report_is_idempotent() {
        let (store, materializer) = materializer(Arc::new(MarkdownReportRenderer::new()));
        let patient = contract::patient("alice");
        store.insert_user(&patient).unwrap();
        let result = contract::result_for(patient.id);
        store.put_result(&result).unwrap();

        let first = materializer.ensure_report(&result).unwrap();
        let second = materializer.ensure_report(&result).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first, second);
        assert_eq!(first.risk_score.value(), 0.82);
        assert!(first.document.is_some());

        let bytes = materializer
            .read_document(&first, first.document.as_ref().unwrap())
            .unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("alice"));
    }

    #[test]
    fn test_missing_probability_scores_zero() {
        let (store, materializer) = materializer(Arc::new(MarkdownReportRenderer::new()));
        let mut result = contract::result_for(UserId::new());
        result.probability = None;
        result.prediction = NonEmptyText::new("Unknown").unwrap();
        store.put_result(&result).unwrap();

        let report = materializer.ensure_report(&result).unwrap();
        assert_eq!(report.risk_score.value(), 0.0);
    }

    #[test]
    fn test_render_failure_is_not_fatal() {
        let (store, materializer) = materializer(Arc::new(FailingRenderer));
        let result = contract::result_for(UserId::new());
        store.put_result(&result).unwrap();

        let report = materializer.ensure_report(&result).unwrap();
        assert!(report.document.is_none());
        assert_eq!(
            store.find_report_for_result(result.id).unwrap().map(|r| r.id),
            Some(report.id)
        );
    }

    #[test]
    fn test_regenerate_attaches_document() {
        let (store, failing) = materializer(Arc::new(FailingRenderer));
        let result = contract::result_for(UserId::new());
        store.put_result(&result).unwrap();
        let report = failing.ensure_report(&result).unwrap();

        let working = ReportMaterializer::new(
            store.clone(),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MarkdownReportRenderer::new()),
        );
        let rendered = working.regenerate(&report).unwrap();
        assert!(String::from_utf8(rendered.bytes).unwrap().contains("High Risk"));
        assert!(store
            .get_report(report.id)
            .unwrap()
            .unwrap()
            .document
            .is_some());
    }

    #[test]
    fn test_concurrent_ensure_report_renders_once() {
        let renderer = Arc::new(CountingRenderer::default());
        let (store, materializer) = materializer(renderer.clone());
        let result = contract::result_for(UserId::new());
        store.put_result(&result).unwrap();

        let barrier = Barrier::new(6);
        let reports: Vec<Report> = thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        materializer.ensure_report(&result).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(reports.iter().all(|r| r.id == reports[0].id));
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);

        let stored = store.find_report_for_result(result.id).unwrap().unwrap();
        assert!(stored.document.is_some());
        assert!(reports
            .iter()
            .any(|r| r.document.is_some() && r.document == stored.document));

        materializer.ensure_report(&result).unwrap();
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);
    }
}

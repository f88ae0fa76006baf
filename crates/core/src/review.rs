//! Doctor review request lifecycle.
//!
//! A patient asks a doctor to review the report derived from one of their prediction results.
//! The request starts `pending`; only the assigned doctor moves it on, and every move goes
//! through [`ReviewStatus::apply`] followed by a compare-and-set on the status that was read.
//!
//! Notifications are sent only after the status write has committed. A notification failure
//! at that point is logged; the transition itself stands.

use crate::caller::CallerContext;
use crate::ids::{RequestId, ResultId, UserId};
use crate::model::{optional_text, required_text, ReviewRequest, Role};
use crate::notifications::NotificationService;
use crate::reports::ReportMaterializer;
use crate::status::{ReviewEvent, ReviewStatus};
use crate::store::{CasOutcome, InsertOutcome, RecordStore, RequestFilter, RequestUpdate};
use crate::{CoreError, CoreResult};
use chrono::Utc;
use std::sync::Arc;

/// Input for [`ReviewService::create_request`]. Both fields are required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewReviewRequest {
    pub doctor_id: Option<UserId>,
    pub result_id: Option<ResultId>,
}

#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn RecordStore>,
    materializer: ReportMaterializer,
    notifications: NotificationService,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        materializer: ReportMaterializer,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            materializer,
            notifications,
        }
    }

    /// Creates a `pending` request from the calling patient to a doctor.
    ///
    /// The report for the result is materialised first if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MissingField`] if the doctor or result id is absent
    /// - [`CoreError::RoleRequired`] unless the caller is, and is registered as, a patient
    /// - [`CoreError::NotFound`] if the caller, doctor or result does not exist
    /// - [`CoreError::NotADoctor`] if the target account is not a doctor
    /// - [`CoreError::ResultNotOwned`] if the result belongs to someone else
    /// - [`CoreError::DuplicateRequest`] if the same (patient, doctor, report) already has a
    ///   pending, accepted or completed request
    pub fn create_request(
        &self,
        caller: &CallerContext,
        input: NewReviewRequest,
    ) -> CoreResult<ReviewRequest> {
        let doctor_id = input.doctor_id.ok_or(CoreError::MissingField("doctor_id"))?;
        let result_id = input.result_id.ok_or(CoreError::MissingField("result_id"))?;
        caller.require_role(Role::Patient)?;

        let patient = self
            .store
            .get_user(caller.user_id)?
            .ok_or_else(|| CoreError::not_found("user", caller.user_id))?;
        if patient.role != Role::Patient {
            return Err(CoreError::RoleRequired(Role::Patient.as_str()));
        }
        let doctor = self
            .store
            .get_user(doctor_id)?
            .ok_or_else(|| CoreError::not_found("doctor", doctor_id))?;
        if !doctor.is_doctor() {
            return Err(CoreError::NotADoctor);
        }

        let result = self
            .store
            .get_result(result_id)?
            .ok_or_else(|| CoreError::not_found("prediction result", result_id))?;
        if result.owner_id != patient.id {
            return Err(CoreError::ResultNotOwned);
        }

        let report = self.materializer.ensure_report(&result)?;
        if report.patient_id != patient.id {
            return Err(CoreError::ReportNotOwned);
        }

        let now = Utc::now();
        let candidate = ReviewRequest {
            id: RequestId::new(),
            status: ReviewStatus::Pending,
            patient_id: patient.id,
            doctor_id: doctor.id,
            report_id: report.id,
            doctor_notes: None,
            created_at: now,
            updated_at: now,
        };

        let request = match self.store.insert_request_unless_active(candidate)? {
            InsertOutcome::Inserted(request) => request,
            InsertOutcome::Existing(existing) => {
                return Err(CoreError::DuplicateRequest {
                    existing_id: existing.id,
                    status: existing.status,
                })
            }
        };
        tracing::info!(
            "review request {} created: patient {} -> doctor {} (report {})",
            request.id,
            request.patient_id,
            request.doctor_id,
            request.report_id
        );

        self.notify_after_commit(
            request.doctor_id,
            &format!(
                "New review request from {} for a {} report.",
                patient.username,
                report.disease
            ),
        );
        Ok(request)
    }

    /// Accepts a pending request.
    ///
    /// # Errors
    ///
    /// - [`CoreError::RoleRequired`] / [`CoreError::NotAssignedDoctor`] for the wrong caller
    /// - [`CoreError::NotFound`] if the request does not exist
    /// - [`CoreError::InvalidTransition`] unless the request is `pending`
    /// - [`CoreError::ConcurrentTransition`] if the status changed since it was read
    pub fn accept(&self, request_id: RequestId, caller: &CallerContext) -> CoreResult<ReviewRequest> {
        self.transition(request_id, caller, ReviewEvent::Accept, None)
    }

    /// Rejects a pending request. A non-blank `reason` is stored as the doctor's notes.
    ///
    /// # Errors
    ///
    /// As for [`ReviewService::accept`].
    pub fn reject(
        &self,
        request_id: RequestId,
        caller: &CallerContext,
        reason: Option<&str>,
    ) -> CoreResult<ReviewRequest> {
        self.transition(request_id, caller, ReviewEvent::Reject, optional_text(reason))
    }

    /// Records the doctor's notes on an accepted (or already completed) request.
    ///
    /// With `finalize` the request becomes `completed`; otherwise it stays `accepted` so the
    /// doctor can revise the notes later. A completed request stays completed.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MissingField`] / [`CoreError::InvalidInput`] if the notes are absent or
    ///   blank
    /// - otherwise as for [`ReviewService::accept`]
    pub fn submit_review(
        &self,
        request_id: RequestId,
        caller: &CallerContext,
        notes: Option<&str>,
        finalize: bool,
    ) -> CoreResult<ReviewRequest> {
        let notes = required_text("notes", notes)?;
        self.transition(
            request_id,
            caller,
            ReviewEvent::SubmitReview { finalize },
            Some(notes),
        )
    }

    /// Returns a request to either of its parties.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the request does not exist
    /// - [`CoreError::NotRequestParty`] for anyone else
    pub fn get_request(
        &self,
        request_id: RequestId,
        caller: &CallerContext,
    ) -> CoreResult<ReviewRequest> {
        let request = self.load(request_id)?;
        let is_party = match caller.role {
            Role::Patient => request.patient_id == caller.user_id,
            Role::Doctor => request.doctor_id == caller.user_id,
        };
        if !is_party {
            return Err(CoreError::NotRequestParty);
        }
        Ok(request)
    }

    /// Requests the calling patient has sent, newest first.
    pub fn list_patient_requests(&self, caller: &CallerContext) -> CoreResult<Vec<ReviewRequest>> {
        caller.require_role(Role::Patient)?;
        self.store
            .list_requests(&RequestFilter::for_patient(caller.user_id))
    }

    /// Requests the calling doctor has received, newest first, optionally by status.
    pub fn list_doctor_requests(
        &self,
        caller: &CallerContext,
        status: Option<ReviewStatus>,
    ) -> CoreResult<Vec<ReviewRequest>> {
        caller.require_role(Role::Doctor)?;
        self.store
            .list_requests(&RequestFilter::for_doctor(caller.user_id, status))
    }

    fn load(&self, request_id: RequestId) -> CoreResult<ReviewRequest> {
        self.store
            .get_request(request_id)?
            .ok_or_else(|| CoreError::not_found("review request", request_id))
    }

    fn transition(
        &self,
        request_id: RequestId,
        caller: &CallerContext,
        event: ReviewEvent,
        doctor_notes: Option<String>,
    ) -> CoreResult<ReviewRequest> {
        caller.require_role(Role::Doctor)?;
        let current = self.load(request_id)?;
        if current.doctor_id != caller.user_id {
            return Err(CoreError::NotAssignedDoctor);
        }

        let next = current.status.apply(event)?;
        let update = RequestUpdate {
            status: next,
            doctor_notes,
            updated_at: Utc::now(),
        };

        let updated = match self
            .store
            .compare_and_set_request(current.id, current.status, update)?
        {
            CasOutcome::Updated(updated) => updated,
            CasOutcome::StatusMismatch(actual) => {
                tracing::warn!(
                    "review request {} changed concurrently: expected {}, found {}",
                    current.id,
                    current.status,
                    actual
                );
                return Err(CoreError::ConcurrentTransition { actual });
            }
            CasOutcome::Missing => return Err(CoreError::not_found("review request", request_id)),
        };
        tracing::info!(
            "review request {}: {} -> {} ({})",
            updated.id,
            current.status,
            updated.status,
            event
        );

        if updated.status != current.status {
            self.notify_after_commit(updated.patient_id, &status_message(&updated));
        }
        Ok(updated)
    }

    fn notify_after_commit(&self, recipient: UserId, message: &str) {
        if let Err(e) = self.notifications.notify(recipient, message) {
            tracing::error!("failed to notify {} after commit: {}", recipient, e);
        }
    }
}

fn status_message(request: &ReviewRequest) -> String {
    match request.status {
        ReviewStatus::Accepted => "Your review request has been accepted.".to_string(),
        ReviewStatus::Rejected => match &request.doctor_notes {
            Some(reason) => format!("Your review request has been rejected: {}", reason),
            None => "Your review request has been rejected.".to_string(),
        },
        ReviewStatus::Completed => {
            "Your doctor has completed the review of your report.".to_string()
        }
        ReviewStatus::Pending => "Your review request is pending.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::MemoryDocumentStore;
    use crate::model::UserAccount;
    use crate::render::MarkdownReportRenderer;
    use crate::ids::{NotificationId, ReportId};
    use crate::model::{DocumentRef, Notification, PredictionResult, Report};
    use crate::store::{contract, FileStore, MemoryStore};
    use crate::ErrorKind;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    struct Fixture {
        store: Arc<dyn RecordStore>,
        service: ReviewService,
        patient: UserAccount,
        doctor: UserAccount,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_store(Arc::new(MemoryStore::new()))
        }

        fn with_store(store: Arc<dyn RecordStore>) -> Self {
            let materializer = ReportMaterializer::new(
                store.clone(),
                Arc::new(MemoryDocumentStore::new()),
                Arc::new(MarkdownReportRenderer::new()),
            );
            let notifications = NotificationService::new(store.clone());
            let service = ReviewService::new(store.clone(), materializer, notifications);

            let patient = contract::patient("alice");
            let doctor = contract::doctor("drsarah", Some("LIC-1"));
            store.insert_user(&patient).unwrap();
            store.insert_user(&doctor).unwrap();
            Self {
                store,
                service,
                patient,
                doctor,
            }
        }

        fn patient_ctx(&self) -> CallerContext {
            CallerContext::patient(self.patient.id)
        }

        fn doctor_ctx(&self) -> CallerContext {
            CallerContext::doctor(self.doctor.id)
        }

        fn add_result(&self) -> ResultId {
            let result = contract::result_for(self.patient.id);
            self.store.put_result(&result).unwrap();
            result.id
        }

        fn create(&self, result_id: ResultId) -> CoreResult<ReviewRequest> {
            self.service.create_request(
                &self.patient_ctx(),
                NewReviewRequest {
                    doctor_id: Some(self.doctor.id),
                    result_id: Some(result_id),
                },
            )
        }

        fn inbox(&self, user: UserId) -> usize {
            self.store.list_notifications(user).unwrap().len()
        }
    }

    #[test]
    fn test_create_request_materialises_report_and_notifies_doctor() {
        let fx = Fixture::new();
        let result_id = fx.add_result();

        let request = fx.create(result_id).unwrap();
        assert_eq!(request.status, ReviewStatus::Pending);
        assert_eq!(request.patient_id, fx.patient.id);
        assert_eq!(request.doctor_id, fx.doctor.id);

        let report = fx.store.find_report_for_result(result_id).unwrap().unwrap();
        assert_eq!(request.report_id, report.id);

        let doctor_inbox = fx.store.list_notifications(fx.doctor.id).unwrap();
        assert_eq!(doctor_inbox.len(), 1);
        assert!(doctor_inbox[0].message.as_str().contains("alice"));
        assert_eq!(fx.inbox(fx.patient.id), 0);
    }

    #[test]
    fn test_create_request_validation_and_guards() {
        let fx = Fixture::new();
        let result_id = fx.add_result();

        let missing = fx
            .service
            .create_request(
                &fx.patient_ctx(),
                NewReviewRequest {
                    doctor_id: None,
                    result_id: Some(result_id),
                },
            )
            .unwrap_err();
        assert!(matches!(missing, CoreError::MissingField("doctor_id")));

        let not_patient = fx
            .service
            .create_request(
                &fx.doctor_ctx(),
                NewReviewRequest {
                    doctor_id: Some(fx.doctor.id),
                    result_id: Some(result_id),
                },
            )
            .unwrap_err();
        assert_eq!(not_patient.kind(), ErrorKind::Authorization);

        let other_patient = contract::patient("bob");
        fx.store.insert_user(&other_patient).unwrap();
        let not_a_doctor = fx
            .service
            .create_request(
                &fx.patient_ctx(),
                NewReviewRequest {
                    doctor_id: Some(other_patient.id),
                    result_id: Some(result_id),
                },
            )
            .unwrap_err();
        assert!(matches!(not_a_doctor, CoreError::NotADoctor));

        let unknown_doctor = fx
            .service
            .create_request(
                &fx.patient_ctx(),
                NewReviewRequest {
                    doctor_id: Some(UserId::new()),
                    result_id: Some(result_id),
                },
            )
            .unwrap_err();
        assert_eq!(unknown_doctor.kind(), ErrorKind::NotFound);

        let bobs_result = contract::result_for(other_patient.id);
        fx.store.put_result(&bobs_result).unwrap();
        let not_owned = fx.create(bobs_result.id).unwrap_err();
        assert!(matches!(not_owned, CoreError::ResultNotOwned));
        assert!(fx.store.find_report_for_result(bobs_result.id).unwrap().is_none());

        assert_eq!(fx.inbox(fx.doctor.id), 0);
    }

    // Scenario A: create, accept, submit final review.
    #[test]
    fn test_happy_path_to_completed() {
        let fx = Fixture::new();
        let request = fx.create(fx.add_result()).unwrap();

        let accepted = fx.service.accept(request.id, &fx.doctor_ctx()).unwrap();
        assert_eq!(accepted.status, ReviewStatus::Accepted);
        assert_eq!(fx.inbox(fx.patient.id), 1);

        let completed = fx
            .service
            .submit_review(request.id, &fx.doctor_ctx(), Some("Looks fine."), true)
            .unwrap();
        assert_eq!(completed.status, ReviewStatus::Completed);
        assert_eq!(completed.doctor_notes.as_deref(), Some("Looks fine."));
        assert_eq!(fx.inbox(fx.patient.id), 2);
        assert!(completed.updated_at >= accepted.updated_at);
    }

    // Scenario B: reject with a reason, then a fresh request for the same triple succeeds.
    #[test]
    fn test_reject_then_request_again() {
        let fx = Fixture::new();
        let result_id = fx.add_result();
        let request = fx.create(result_id).unwrap();

        let rejected = fx
            .service
            .reject(request.id, &fx.doctor_ctx(), Some("Out of scope"))
            .unwrap();
        assert_eq!(rejected.status, ReviewStatus::Rejected);
        assert_eq!(rejected.doctor_notes.as_deref(), Some("Out of scope"));
        let patient_inbox = fx.store.list_notifications(fx.patient.id).unwrap();
        assert_eq!(patient_inbox.len(), 1);
        assert!(patient_inbox[0].message.as_str().contains("Out of scope"));

        let again = fx.create(result_id).unwrap();
        assert_ne!(again.id, request.id);
        assert_eq!(again.report_id, request.report_id);
        assert_eq!(again.status, ReviewStatus::Pending);
    }

    // Scenario C: a duplicate while active is refused with the existing id.
    #[test]
    fn test_duplicate_request_conflicts() {
        let fx = Fixture::new();
        let result_id = fx.add_result();
        let first = fx.create(result_id).unwrap();

        for _ in 0..2 {
            match fx.create(result_id) {
                Err(CoreError::DuplicateRequest {
                    existing_id,
                    status,
                }) => {
                    assert_eq!(existing_id, first.id);
                    assert_eq!(status, fx.store.get_request(first.id).unwrap().unwrap().status);
                }
                other => panic!("expected conflict, got {other:?}"),
            }
            let _ = fx.service.accept(first.id, &fx.doctor_ctx());
        }

        fx.service
            .submit_review(first.id, &fx.doctor_ctx(), Some("done"), true)
            .unwrap();
        assert!(matches!(
            fx.create(result_id),
            Err(CoreError::DuplicateRequest {
                status: ReviewStatus::Completed,
                ..
            })
        ));
        // Only the first creation notified the doctor.
        assert_eq!(fx.inbox(fx.doctor.id), 1);
    }

    #[test]
    fn test_only_assigned_doctor_may_transition() {
        let fx = Fixture::new();
        let request = fx.create(fx.add_result()).unwrap();
        let other = contract::doctor("drchen", Some("LIC-2"));
        fx.store.insert_user(&other).unwrap();

        assert!(matches!(
            fx.service.accept(request.id, &CallerContext::doctor(other.id)),
            Err(CoreError::NotAssignedDoctor)
        ));
        assert!(matches!(
            fx.service.accept(request.id, &fx.patient_ctx()),
            Err(CoreError::RoleRequired("doctor"))
        ));
        assert!(matches!(
            fx.service.accept(RequestId::new(), &fx.doctor_ctx()),
            Err(CoreError::NotFound { .. })
        ));
        assert_eq!(
            fx.store.get_request(request.id).unwrap().unwrap().status,
            ReviewStatus::Pending
        );
        assert_eq!(fx.inbox(fx.patient.id), 0);
    }

    #[test]
    fn test_invalid_transitions_leave_no_trace() {
        let fx = Fixture::new();
        let request = fx.create(fx.add_result()).unwrap();

        let early_review = fx
            .service
            .submit_review(request.id, &fx.doctor_ctx(), Some("notes"), true)
            .unwrap_err();
        assert_eq!(early_review.kind(), ErrorKind::InvalidState);

        fx.service
            .reject(request.id, &fx.doctor_ctx(), None)
            .unwrap();
        let after_reject = fx
            .service
            .accept(request.id, &fx.doctor_ctx())
            .unwrap_err();
        assert_eq!(after_reject.kind(), ErrorKind::InvalidState);
        let reject_again = fx
            .service
            .reject(request.id, &fx.doctor_ctx(), Some("again"))
            .unwrap_err();
        assert_eq!(reject_again.kind(), ErrorKind::InvalidState);

        let stored = fx.store.get_request(request.id).unwrap().unwrap();
        assert_eq!(stored.status, ReviewStatus::Rejected);
        assert_eq!(stored.doctor_notes, None);
        assert_eq!(fx.inbox(fx.patient.id), 1);
    }

    #[test]
    fn test_review_requires_notes() {
        let fx = Fixture::new();
        let request = fx.create(fx.add_result()).unwrap();
        fx.service.accept(request.id, &fx.doctor_ctx()).unwrap();

        assert!(matches!(
            fx.service
                .submit_review(request.id, &fx.doctor_ctx(), None, true),
            Err(CoreError::MissingField("notes"))
        ));
        assert_eq!(
            fx.service
                .submit_review(request.id, &fx.doctor_ctx(), Some("  "), true)
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            fx.store.get_request(request.id).unwrap().unwrap().status,
            ReviewStatus::Accepted
        );
    }

    #[test]
    fn test_deferred_and_repeated_reviews() {
        let fx = Fixture::new();
        let request = fx.create(fx.add_result()).unwrap();
        fx.service.accept(request.id, &fx.doctor_ctx()).unwrap();

        let draft = fx
            .service
            .submit_review(request.id, &fx.doctor_ctx(), Some("draft"), false)
            .unwrap();
        assert_eq!(draft.status, ReviewStatus::Accepted);
        assert_eq!(fx.inbox(fx.patient.id), 1);

        fx.service
            .submit_review(request.id, &fx.doctor_ctx(), Some("final"), true)
            .unwrap();
        assert_eq!(fx.inbox(fx.patient.id), 2);

        let revised = fx
            .service
            .submit_review(request.id, &fx.doctor_ctx(), Some("addendum"), false)
            .unwrap();
        assert_eq!(revised.status, ReviewStatus::Completed);
        assert_eq!(revised.doctor_notes.as_deref(), Some("addendum"));
        assert_eq!(fx.inbox(fx.patient.id), 2);
    }

    #[test]
    fn test_get_and_list_requests() {
        let fx = Fixture::new();
        let request = fx.create(fx.add_result()).unwrap();

        assert_eq!(
            fx.service
                .get_request(request.id, &fx.patient_ctx())
                .unwrap()
                .id,
            request.id
        );
        assert!(fx.service.get_request(request.id, &fx.doctor_ctx()).is_ok());
        let stranger = CallerContext::patient(UserId::new());
        assert!(matches!(
            fx.service.get_request(request.id, &stranger),
            Err(CoreError::NotRequestParty)
        ));

        assert_eq!(
            fx.service.list_patient_requests(&fx.patient_ctx()).unwrap().len(),
            1
        );
        assert_eq!(
            fx.service
                .list_doctor_requests(&fx.doctor_ctx(), Some(ReviewStatus::Pending))
                .unwrap()
                .len(),
            1
        );
        assert!(fx
            .service
            .list_doctor_requests(&fx.doctor_ctx(), Some(ReviewStatus::Completed))
            .unwrap()
            .is_empty());
        assert!(fx.service.list_doctor_requests(&fx.patient_ctx(), None).is_err());
    }

    #[test]
    fn test_notes_and_reasons_are_stored_verbatim() {
        let fx = Fixture::new();
        let request = fx.create(fx.add_result()).unwrap();
        fx.service.accept(request.id, &fx.doctor_ctx()).unwrap();

        let notes = "  1. BP high\n  2. Book ECG\n";
        let completed = fx
            .service
            .submit_review(request.id, &fx.doctor_ctx(), Some(notes), true)
            .unwrap();
        assert_eq!(completed.doctor_notes.as_deref(), Some(notes));
        assert_eq!(
            fx.store
                .get_request(request.id)
                .unwrap()
                .unwrap()
                .doctor_notes
                .as_deref(),
            Some(notes)
        );

        let second = fx.create(fx.add_result()).unwrap();
        let rejected = fx
            .service
            .reject(second.id, &fx.doctor_ctx(), Some(" Not my field.\n"))
            .unwrap();
        assert_eq!(rejected.doctor_notes.as_deref(), Some(" Not my field.\n"));

        let third = fx.create(fx.add_result()).unwrap();
        let blank = fx
            .service
            .reject(third.id, &fx.doctor_ctx(), Some(" \n "))
            .unwrap();
        assert_eq!(blank.doctor_notes, None);
    }

    #[test]
    fn test_doctor_account_cannot_request_as_patient() {
        let fx = Fixture::new();
        let own_result = contract::result_for(fx.doctor.id);
        fx.store.put_result(&own_result).unwrap();

        let err = fx
            .service
            .create_request(
                &CallerContext::patient(fx.doctor.id),
                NewReviewRequest {
                    doctor_id: Some(fx.doctor.id),
                    result_id: Some(own_result.id),
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::RoleRequired("patient")));
        assert!(fx.store.find_report_for_result(own_result.id).unwrap().is_none());
        assert!(fx
            .store
            .list_requests(&RequestFilter::for_doctor(fx.doctor.id, None))
            .unwrap()
            .is_empty());
        assert_eq!(fx.inbox(fx.doctor.id), 0);
    }

    /// Races accept against reject on fresh requests; exactly one side may win each round.
    fn race_accept_against_reject(fx: &Fixture) {
        const CONTENDERS: usize = 8;

        for round in 0..5 {
            let request_id = fx.create(fx.add_result()).unwrap().id;
            let before = fx.inbox(fx.patient.id);
            let barrier = Barrier::new(CONTENDERS);

            let outcomes: Vec<CoreResult<ReviewRequest>> = thread::scope(|scope| {
                let handles: Vec<_> = (0..CONTENDERS)
                    .map(|i| {
                        let barrier = &barrier;
                        let ctx = fx.doctor_ctx();
                        scope.spawn(move || {
                            barrier.wait();
                            if i % 2 == 0 {
                                fx.service.accept(request_id, &ctx)
                            } else {
                                fx.service.reject(request_id, &ctx, Some("busy"))
                            }
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let winners: Vec<&ReviewRequest> =
                outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
            assert_eq!(winners.len(), 1, "round {round}: {outcomes:?}");
            for loser in outcomes.iter().filter_map(|o| o.as_ref().err()) {
                assert_eq!(loser.kind(), ErrorKind::InvalidState, "round {round}: {loser}");
            }

            let stored = fx.store.get_request(request_id).unwrap().unwrap();
            assert_eq!(stored.status, winners[0].status);
            assert_eq!(fx.inbox(fx.patient.id), before + 1, "round {round}");
        }
    }

    #[test]
    fn test_racing_transitions_on_memory_store() {
        let fx = Fixture::new();
        race_accept_against_reject(&fx);
    }

    #[test]
    fn test_racing_transitions_on_file_store() {
        let temp = TempDir::new().unwrap();
        let fx = Fixture::with_store(Arc::new(FileStore::open(temp.path()).unwrap()));
        race_accept_against_reject(&fx);
    }

    /// Store whose compare-and-set always sees another writer's status.
    struct StaleCasStore {
        inner: MemoryStore,
        actual: ReviewStatus,
    }

    impl RecordStore for StaleCasStore {
        fn insert_user(&self, user: &UserAccount) -> CoreResult<()> {
            self.inner.insert_user(user)
        }
        fn get_user(&self, id: UserId) -> CoreResult<Option<UserAccount>> {
            self.inner.get_user(id)
        }
        fn find_user_by_username(&self, username: &str) -> CoreResult<Option<UserAccount>> {
            self.inner.find_user_by_username(username)
        }
        fn list_users(&self, role: Option<Role>) -> CoreResult<Vec<UserAccount>> {
            self.inner.list_users(role)
        }
        fn put_result(&self, result: &PredictionResult) -> CoreResult<()> {
            self.inner.put_result(result)
        }
        fn get_result(&self, id: ResultId) -> CoreResult<Option<PredictionResult>> {
            self.inner.get_result(id)
        }
        fn list_results_for_owner(&self, owner_id: UserId) -> CoreResult<Vec<PredictionResult>> {
            self.inner.list_results_for_owner(owner_id)
        }
        fn get_report(&self, id: ReportId) -> CoreResult<Option<Report>> {
            self.inner.get_report(id)
        }
        fn find_report_for_result(&self, result_id: ResultId) -> CoreResult<Option<Report>> {
            self.inner.find_report_for_result(result_id)
        }
        fn insert_report_if_absent(&self, report: Report) -> CoreResult<Report> {
            self.inner.insert_report_if_absent(report)
        }
        fn attach_report_document(&self, id: ReportId, document: DocumentRef) -> CoreResult<Report> {
            self.inner.attach_report_document(id, document)
        }
        fn insert_request_unless_active(&self, request: ReviewRequest) -> CoreResult<InsertOutcome> {
            self.inner.insert_request_unless_active(request)
        }
        fn get_request(&self, id: RequestId) -> CoreResult<Option<ReviewRequest>> {
            self.inner.get_request(id)
        }
        fn list_requests(&self, filter: &RequestFilter) -> CoreResult<Vec<ReviewRequest>> {
            self.inner.list_requests(filter)
        }
        fn compare_and_set_request(
            &self,
            _id: RequestId,
            _expected: ReviewStatus,
            _update: RequestUpdate,
        ) -> CoreResult<CasOutcome> {
            Ok(CasOutcome::StatusMismatch(self.actual))
        }
        fn append_notification(&self, notification: Notification) -> CoreResult<Notification> {
            self.inner.append_notification(notification)
        }
        fn get_notification(&self, id: NotificationId) -> CoreResult<Option<Notification>> {
            self.inner.get_notification(id)
        }
        fn list_notifications(&self, recipient_id: UserId) -> CoreResult<Vec<Notification>> {
            self.inner.list_notifications(recipient_id)
        }
        fn mark_notification_read(&self, id: NotificationId) -> CoreResult<bool> {
            self.inner.mark_notification_read(id)
        }
        fn mark_all_notifications_read(&self, recipient_id: UserId) -> CoreResult<usize> {
            self.inner.mark_all_notifications_read(recipient_id)
        }
    }

    #[test]
    fn test_lost_compare_and_set_reports_concurrent_transition() {
        let fx = Fixture::with_store(Arc::new(StaleCasStore {
            inner: MemoryStore::new(),
            actual: ReviewStatus::Rejected,
        }));
        let request = fx.create(fx.add_result()).unwrap();

        let err = fx.service.accept(request.id, &fx.doctor_ctx()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ConcurrentTransition {
                actual: ReviewStatus::Rejected
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            fx.store.get_request(request.id).unwrap().unwrap().status,
            ReviewStatus::Pending
        );
        assert_eq!(fx.inbox(fx.patient.id), 0);
    }
}

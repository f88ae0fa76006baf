//! Persistence for accounts, results, reports, review requests and notifications.
//!
//! [`RecordStore`] is the only seam between the services and storage. Operations that must be
//! atomic with respect to concurrent callers are expressed as single store calls:
//!
//! - [`RecordStore::insert_report_if_absent`] keyed by source result
//! - [`RecordStore::insert_request_unless_active`] keyed by (patient, doctor, report)
//! - [`RecordStore::compare_and_set_request`] keyed by the status the caller observed
//!
//! Two backends are provided: [`MemoryStore`] and the sharded YAML [`FileStore`].

mod files;
mod memory;

pub use files::FileStore;
pub use memory::MemoryStore;

use crate::ids::{NotificationId, ReportId, RequestId, ResultId, UserId};
use crate::model::{DocumentRef, Notification, PredictionResult, Report, ReviewRequest, Role, UserAccount};
use crate::status::ReviewStatus;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};

/// Result of an atomic insert-unless-active.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(ReviewRequest),
    /// A request for the same triple is already pending, accepted or completed.
    Existing(ReviewRequest),
}

/// Fields written by a successful status compare-and-set.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestUpdate {
    pub status: ReviewStatus,
    /// `None` leaves the stored notes untouched.
    pub doctor_notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    Updated(ReviewRequest),
    /// The stored status no longer equals the expected one.
    StatusMismatch(ReviewStatus),
    Missing,
}

/// Owner- and role-scoped request query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub patient_id: Option<UserId>,
    pub doctor_id: Option<UserId>,
    pub status: Option<ReviewStatus>,
}

impl RequestFilter {
    pub fn for_patient(patient_id: UserId) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Self::default()
        }
    }

    pub fn for_doctor(doctor_id: UserId, status: Option<ReviewStatus>) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            status,
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &ReviewRequest) -> bool {
        self.patient_id.is_none_or(|id| id == request.patient_id)
            && self.doctor_id.is_none_or(|id| id == request.doctor_id)
            && self.status.is_none_or(|status| status == request.status)
    }
}

pub trait RecordStore: Send + Sync {
    // Accounts

    /// Inserts a new account.
    ///
    /// # Errors
    ///
    /// [`CoreError::UsernameTaken`] or [`CoreError::LicenceTaken`] when a uniqueness constraint
    /// is violated; nothing is written in that case.
    fn insert_user(&self, user: &UserAccount) -> CoreResult<()>;
    fn get_user(&self, id: UserId) -> CoreResult<Option<UserAccount>>;
    fn find_user_by_username(&self, username: &str) -> CoreResult<Option<UserAccount>>;
    /// Accounts ordered by creation time, optionally restricted to one role.
    fn list_users(&self, role: Option<Role>) -> CoreResult<Vec<UserAccount>>;

    // Prediction results

    fn put_result(&self, result: &PredictionResult) -> CoreResult<()>;
    fn get_result(&self, id: ResultId) -> CoreResult<Option<PredictionResult>>;
    /// The owner's results, oldest first.
    fn list_results_for_owner(&self, owner_id: UserId) -> CoreResult<Vec<PredictionResult>>;

    // Reports

    fn get_report(&self, id: ReportId) -> CoreResult<Option<Report>>;
    fn find_report_for_result(&self, result_id: ResultId) -> CoreResult<Option<Report>>;
    /// Stores `report` unless one already exists for its result, returning whichever is stored.
    fn insert_report_if_absent(&self, report: Report) -> CoreResult<Report>;
    /// Sets the document reference of an existing report.
    fn attach_report_document(&self, id: ReportId, document: DocumentRef) -> CoreResult<Report>;

    // Review requests

    fn insert_request_unless_active(&self, request: ReviewRequest) -> CoreResult<InsertOutcome>;
    fn get_request(&self, id: RequestId) -> CoreResult<Option<ReviewRequest>>;
    /// Matching requests, newest first.
    fn list_requests(&self, filter: &RequestFilter) -> CoreResult<Vec<ReviewRequest>>;
    fn compare_and_set_request(
        &self,
        id: RequestId,
        expected: ReviewStatus,
        update: RequestUpdate,
    ) -> CoreResult<CasOutcome>;

    // Notifications

    /// Appends a notification, assigning its sequence number.
    fn append_notification(&self, notification: Notification) -> CoreResult<Notification>;
    fn get_notification(&self, id: NotificationId) -> CoreResult<Option<Notification>>;
    /// The recipient's notifications, most recent first.
    fn list_notifications(&self, recipient_id: UserId) -> CoreResult<Vec<Notification>>;
    /// Returns false when no such notification exists.
    fn mark_notification_read(&self, id: NotificationId) -> CoreResult<bool>;
    /// Returns how many notifications flipped from unread to read.
    fn mark_all_notifications_read(&self, recipient_id: UserId) -> CoreResult<usize>;
}

// ============================================================================
// Shared helpers for the backends
// ============================================================================

fn check_user_unique<'a>(
    existing: impl IntoIterator<Item = &'a UserAccount>,
    user: &UserAccount,
) -> CoreResult<()> {
    let licence = user
        .doctor_profile
        .as_ref()
        .and_then(|p| p.licence_number.as_ref());
    for other in existing {
        if other
            .username
            .as_str()
            .eq_ignore_ascii_case(user.username.as_str())
        {
            return Err(CoreError::UsernameTaken(user.username.to_string()));
        }
        let other_licence = other
            .doctor_profile
            .as_ref()
            .and_then(|p| p.licence_number.as_ref());
        if let (Some(a), Some(b)) = (licence, other_licence) {
            if a == b {
                return Err(CoreError::LicenceTaken(a.to_string()));
            }
        }
    }
    Ok(())
}

fn sort_users(users: &mut [UserAccount]) {
    users.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.username.as_str().cmp(b.username.as_str()))
    });
}

fn sort_results(results: &mut [PredictionResult]) {
    results.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}

fn sort_requests(requests: &mut [ReviewRequest]) {
    requests.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn sort_notifications(notifications: &mut [Notification]) {
    notifications.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.sequence.cmp(&a.sequence))
    });
}

fn apply_update(request: &mut ReviewRequest, update: RequestUpdate) {
    request.status = update.status;
    if let Some(notes) = update.doctor_notes {
        request.doctor_notes = Some(notes);
    }
    request.updated_at = update.updated_at;
}

fn find_active<'a>(
    existing: impl IntoIterator<Item = &'a ReviewRequest>,
    candidate: &ReviewRequest,
) -> Option<ReviewRequest> {
    existing
        .into_iter()
        .find(|r| {
            r.same_triple(candidate.patient_id, candidate.doctor_id, candidate.report_id)
                && r.status.blocks_new_request()
        })
        .cloned()
}

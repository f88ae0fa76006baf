//! JSON request and response bodies.
//!
//! Identifiers travel as canonical record id strings, timestamps as RFC 3339 strings and
//! probabilities as plain numbers in `[0, 1]`. Request bodies keep every field optional so the
//! core services report which required field is missing.

use chrono::{DateTime, Utc};
use riskcare_core::{
    CoreError, CoreResult, Disease, NewPredictionResult, NewReviewRequest, Notification,
    PredictionResult, ReportView, ResultId, ReviewRequest, UserAccount, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Structured error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// One of `authorization`, `not_found`, `invalid_state`, `validation`, `conflict`,
    /// `storage` or `unauthenticated`.
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_status: Option<String>,
}

impl ErrorRes {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            existing_request_id: None,
            existing_status: None,
        }
    }
}

impl From<&CoreError> for ErrorRes {
    fn from(err: &CoreError) -> Self {
        let mut res = ErrorRes::new(err.kind().as_str(), err.to_string());
        if let CoreError::DuplicateRequest {
            existing_id,
            status,
        } = err
        {
            res.existing_request_id = Some(existing_id.to_string());
            res.existing_status = Some(status.to_string());
        }
        res
    }
}

// ============================================================================
// Doctors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DoctorRes {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub specialization: String,
    pub experience_years: u32,
    pub hospital: String,
    pub contact_number: String,
    pub verified: bool,
}

impl DoctorRes {
    /// Directory entry for a doctor account, or `None` for accounts without a profile.
    pub fn from_account(account: &UserAccount) -> Option<Self> {
        let profile = account.doctor_profile.as_ref()?;
        Some(Self {
            id: account.id.to_string(),
            username: account.username.to_string(),
            display_name: profile
                .display_name
                .as_ref()
                .map(|n| n.to_string())
                .unwrap_or_else(|| account.username.to_string()),
            specialization: profile.specialization.to_string(),
            experience_years: profile.experience_years,
            hospital: profile.hospital.to_string(),
            contact_number: profile.contact_number.to_string(),
            verified: profile.verified,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListDoctorsRes {
    pub doctors: Vec<DoctorRes>,
}

// ============================================================================
// Prediction results
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecordResultReq {
    /// `heart_disease` or `diabetes`.
    pub disease: Option<String>,
    /// Label produced by the classifier, e.g. "High Risk".
    pub prediction: Option<String>,
    pub probability: Option<f64>,
    /// RFC 3339; defaults to the time of recording.
    pub timestamp: Option<String>,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

impl RecordResultReq {
    /// Parses the body into the core intake input.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for an unknown disease or a malformed timestamp.
    pub fn into_input(self) -> CoreResult<NewPredictionResult> {
        let disease = self
            .disease
            .map(|d| d.parse::<Disease>())
            .transpose()?;
        let timestamp = self
            .timestamp
            .map(|t| {
                DateTime::parse_from_rfc3339(t.trim())
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| CoreError::InvalidInput(format!("invalid timestamp {}: {}", t, e)))
            })
            .transpose()?;

        Ok(NewPredictionResult {
            disease,
            prediction: self.prediction,
            probability: self.probability,
            timestamp,
            features: self.features,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResultRes {
    pub id: String,
    pub disease: String,
    pub prediction: String,
    pub probability: Option<f64>,
    pub timestamp: String,
    pub features: BTreeMap<String, f64>,
}

impl From<&PredictionResult> for ResultRes {
    fn from(result: &PredictionResult) -> Self {
        Self {
            id: result.id.to_string(),
            disease: result.disease.as_str().into(),
            prediction: result.prediction.to_string(),
            probability: result.probability.map(|p| p.value()),
            timestamp: result.timestamp.to_rfc3339(),
            features: result.features.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListResultsRes {
    pub results: Vec<ResultRes>,
}

// ============================================================================
// Review requests
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateReviewRequestReq {
    pub doctor_id: Option<String>,
    pub result_id: Option<String>,
}

impl CreateReviewRequestReq {
    /// Parses the identifiers, leaving absent ones for the service to reject.
    pub fn into_input(self) -> CoreResult<NewReviewRequest> {
        Ok(NewReviewRequest {
            doctor_id: self.doctor_id.as_deref().map(UserId::parse).transpose()?,
            result_id: self.result_id.as_deref().map(ResultId::parse).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RejectReq {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubmitReviewReq {
    pub notes: Option<String>,
    /// Completes the request; otherwise the notes are saved as a draft.
    #[serde(default)]
    pub finalize: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewRequestRes {
    pub id: String,
    /// `pending`, `accepted`, `rejected` or `completed`.
    pub status: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub report_id: String,
    pub doctor_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ReviewRequest> for ReviewRequestRes {
    fn from(request: &ReviewRequest) -> Self {
        Self {
            id: request.id.to_string(),
            status: request.status.to_string(),
            patient_id: request.patient_id.to_string(),
            doctor_id: request.doctor_id.to_string(),
            report_id: request.report_id.to_string(),
            doctor_notes: request.doctor_notes.clone(),
            created_at: request.created_at.to_rfc3339(),
            updated_at: request.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListReviewRequestsRes {
    pub requests: Vec<ReviewRequestRes>,
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReportRes {
    pub id: String,
    pub patient_id: String,
    pub result_id: String,
    pub disease: String,
    pub risk_score: f64,
    pub file_name: String,
    pub media_type: String,
    /// The rendered document as text.
    pub content: String,
    /// True when the stored document was unavailable and the content was rendered on demand.
    pub regenerated: bool,
    pub created_at: String,
}

impl From<ReportView> for ReportRes {
    fn from(view: ReportView) -> Self {
        let report = view.report;
        Self {
            id: report.id.to_string(),
            patient_id: report.patient_id.to_string(),
            result_id: report.result_id.to_string(),
            disease: report.disease.as_str().into(),
            risk_score: report.risk_score.value(),
            file_name: view.file_name,
            media_type: view.media_type,
            content: String::from_utf8_lossy(&view.bytes).into_owned(),
            regenerated: view.regenerated,
            created_at: report.created_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRes {
    pub id: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

impl From<&Notification> for NotificationRes {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id.to_string(),
            message: notification.message.to_string(),
            is_read: notification.is_read,
            created_at: notification.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListNotificationsRes {
    pub notifications: Vec<NotificationRes>,
    pub unread_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadRes {
    pub updated: usize,
}

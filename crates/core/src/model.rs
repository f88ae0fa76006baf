//! Persisted records.
//!
//! These are plain serde structs; the stores decide how they are laid out on disk and the
//! services enforce the invariants around them.

use crate::ids::{NotificationId, ReportId, RequestId, ResultId, UserId};
use crate::status::ReviewStatus;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use riskcare_types::{NonEmptyText, Probability};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            other => Err(CoreError::InvalidInput(format!("unknown role: {}", other))),
        }
    }
}

/// Professional details held only on doctor accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    /// Name shown in the doctor directory, e.g. "Dr. Sarah Jenkins".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<NonEmptyText>,
    pub specialization: NonEmptyText,
    pub experience_years: u32,
    pub hospital: NonEmptyText,
    pub contact_number: NonEmptyText,
    pub licence_number: Option<NonEmptyText>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: NonEmptyText,
    pub email: NonEmptyText,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_profile: Option<DoctorProfile>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }
}

// ============================================================================
// Prediction results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disease {
    HeartDisease,
    Diabetes,
}

impl Disease {
    /// Machine name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Disease::HeartDisease => "heart_disease",
            Disease::Diabetes => "diabetes",
        }
    }

    /// Human-readable condition name used in documents and notifications.
    pub fn display_name(self) -> &'static str {
        match self {
            Disease::HeartDisease => "Heart Disease",
            Disease::Diabetes => "Diabetes",
        }
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Disease {
    type Err = CoreError;

    /// Accepts `heart_disease`, `heart-disease`, `Heart Disease`, `heart` and `diabetes`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalised.as_str() {
            "heartdisease" | "heart" => Ok(Disease::HeartDisease),
            "diabetes" => Ok(Disease::Diabetes),
            _ => Err(CoreError::InvalidInput(format!("unknown disease: {}", s))),
        }
    }
}

/// A classifier output recorded for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub id: ResultId,
    pub owner_id: UserId,
    pub disease: Disease,
    /// Predicted label as reported by the classifier (e.g. "High Risk").
    pub prediction: NonEmptyText,
    #[serde(default)]
    pub probability: Option<Probability>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

// ============================================================================
// Reports
// ============================================================================

/// Reference to a rendered document held by a [`crate::documents::DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Store-specific key (the SHA-256 hex digest for the file-backed store).
    pub key: String,
    pub file_name: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub stored_at: DateTime<Utc>,
}

/// Durable report derived from exactly one prediction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub patient_id: UserId,
    pub result_id: ResultId,
    pub disease: Disease,
    pub risk_score: Probability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRef>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Review requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub id: RequestId,
    pub status: ReviewStatus,
    pub patient_id: UserId,
    pub doctor_id: UserId,
    pub report_id: ReportId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewRequest {
    /// True when `(patient, doctor, report)` matches this request.
    pub fn same_triple(&self, patient_id: UserId, doctor_id: UserId, report_id: ReportId) -> bool {
        self.patient_id == patient_id && self.doctor_id == doctor_id && self.report_id == report_id
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub message: NonEmptyText,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    /// Store-assigned append order; breaks ties between equal timestamps.
    #[serde(default)]
    pub sequence: u64,
}

/// Parses an optional free-text field, mapping blank input to `None`.
pub fn optional_text(input: Option<&str>) -> Option<String> {
    input
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
}

/// Parses a required free-text field, kept verbatim once it is known not to be blank.
pub fn required_text(field: &'static str, input: Option<&str>) -> CoreResult<String> {
    match input {
        None => Err(CoreError::MissingField(field)),
        Some(value) if value.trim().is_empty() => Err(CoreError::InvalidInput(format!(
            "{} cannot be empty",
            field
        ))),
        Some(value) => Ok(value.to_owned()),
    }
}

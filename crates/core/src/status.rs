//! Review request status and its transition table.
//!
//! Status only ever changes through [`ReviewStatus::apply`]; the stores persist whatever `apply`
//! returned using a compare-and-set on the status the caller observed.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

/// An action a doctor takes on an existing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    Accept,
    Reject,
    /// Submit notes. `finalize` moves the request to `completed`; otherwise it stays `accepted`.
    SubmitReview { finalize: bool },
}

impl fmt::Display for ReviewEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewEvent::Accept => f.write_str("accept"),
            ReviewEvent::Reject => f.write_str("reject"),
            ReviewEvent::SubmitReview { finalize: true } => f.write_str("submit review (finalize)"),
            ReviewEvent::SubmitReview { finalize: false } => f.write_str("submit review (defer)"),
        }
    }
}

impl ReviewStatus {
    pub const ALL: [ReviewStatus; 4] = [
        ReviewStatus::Pending,
        ReviewStatus::Accepted,
        ReviewStatus::Rejected,
        ReviewStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Accepted => "accepted",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Completed => "completed",
        }
    }

    /// Returns the status reached by applying `event`.
    ///
    /// `completed` never regresses: a further review keeps it `completed` whatever `finalize`
    /// says.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] for every pair outside the transition table.
    pub fn apply(self, event: ReviewEvent) -> CoreResult<ReviewStatus> {
        use ReviewEvent::*;
        use ReviewStatus::*;

        match (self, event) {
            (Pending, Accept) => Ok(Accepted),
            (Pending, Reject) => Ok(Rejected),
            (Accepted, SubmitReview { finalize: true }) => Ok(Completed),
            (Accepted, SubmitReview { finalize: false }) => Ok(Accepted),
            (Completed, SubmitReview { .. }) => Ok(Completed),
            (from, event) => Err(CoreError::InvalidTransition { from, event }),
        }
    }

    /// Statuses that stop the same (patient, doctor, report) triple being requested again.
    pub fn blocks_new_request(self) -> bool {
        !matches!(self, ReviewStatus::Rejected)
    }

    /// The assigned doctor may read the report only once the request has been accepted.
    pub fn doctor_may_view(self) -> bool {
        matches!(self, ReviewStatus::Accepted | ReviewStatus::Completed)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ReviewStatus::Pending),
            "accepted" => Ok(ReviewStatus::Accepted),
            "rejected" => Ok(ReviewStatus::Rejected),
            "completed" => Ok(ReviewStatus::Completed),
            other => Err(CoreError::InvalidInput(format!(
                "unknown review status: {}",
                other
            ))),
        }
    }
}

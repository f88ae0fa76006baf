//! # RiskCare Core
//!
//! Business logic for the early risk review platform:
//! - accounts and the doctor directory
//! - intake of externally scored prediction results
//! - lazy report materialisation with best-effort document rendering
//! - the doctor review request lifecycle and its notifications
//! - report access control with regeneration fallback
//!
//! **No API concerns**: authentication, HTTP servers and request parsing belong in `api-rest`,
//! `api-shared` and the CLI. Every operation takes an explicit [`CallerContext`].
//!
//! ## Storage
//!
//! Records go through the [`store::RecordStore`] trait (in-memory or sharded YAML files);
//! rendered documents go through [`documents::DocumentStore`] (in-memory or content-addressed
//! files). [`Platform`] wires both into the services for a given [`CoreConfig`].

pub mod access;
pub mod accounts;
pub mod caller;
pub mod config;
pub mod constants;
pub mod documents;
pub mod error;
pub mod guidance;
pub mod ids;
pub mod model;
pub mod notifications;
pub mod platform;
pub mod render;
pub mod reports;
pub mod results;
pub mod review;
pub mod status;
pub mod store;

pub use access::{AccessPolicy, ReportAccessService, ReportView};
pub use accounts::{AccountService, NewAccount};
pub use caller::CallerContext;
pub use config::{resolve_data_dir, storage_backend_from_env_value, CoreConfig, StorageBackend};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use ids::{NotificationId, ReportId, RequestId, ResultId, UserId};
pub use model::{
    Disease, DocumentRef, DoctorProfile, Notification, PredictionResult, Report, ReviewRequest,
    Role, UserAccount,
};
pub use notifications::NotificationService;
pub use platform::Platform;
pub use results::{NewPredictionResult, ResultService};
pub use review::{NewReviewRequest, ReviewService};
pub use status::{ReviewEvent, ReviewStatus};

pub use riskcare_types::{NonEmptyText, Probability};

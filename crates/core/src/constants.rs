//! Constants used throughout the core crate.
//!
//! Path and file-name constants live here so every store lays records out the same way.

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "risk_data";

/// Directory name for user account records.
pub const USERS_DIR_NAME: &str = "users";

/// Directory name for prediction result records.
pub const RESULTS_DIR_NAME: &str = "results";

/// Directory name for report records.
pub const REPORTS_DIR_NAME: &str = "reports";

/// Directory name for review request records.
pub const REVIEW_REQUESTS_DIR_NAME: &str = "review_requests";

/// Directory name for notification records.
pub const NOTIFICATIONS_DIR_NAME: &str = "notifications";

/// Directory name for rendered report documents.
pub const DOCUMENTS_DIR_NAME: &str = "documents";

/// Extension of every record file.
pub const RECORD_FILE_EXTENSION: &str = "yaml";

/// Title printed at the top of every report document.
pub const REPORT_TITLE: &str = "Smart Healthcare Early Risk System";

/// Closing disclaimer of every report document.
pub const REPORT_DISCLAIMER: &str =
    "Disclaimer: This is an AI-generated report and not a substitute for professional medical advice.";

/// Media type of rendered Markdown documents.
pub const MARKDOWN_MEDIA_TYPE: &str = "text/markdown; charset=utf-8";

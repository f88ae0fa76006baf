//! # API Shared
//!
//! Shared definitions for the RiskCare APIs.
//!
//! Contains:
//! - JSON wire types (`wire` module) with OpenAPI schemas
//! - Shared services like `HealthService`
//! - Authentication utilities: API key check and caller identity headers
//!
//! Used by `api-rest` and the workspace binary for common functionality.

pub mod auth;
pub mod health;
pub mod wire;

pub use auth::AuthError;
pub use health::HealthService;
pub use wire::*;

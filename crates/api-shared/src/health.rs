use crate::wire::HealthRes;

/// Health service shared by every API surface.
///
/// Provides a standardised way to check the health status of the RiskCare system.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Checks health without creating an instance.
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "RiskCare is alive".into(),
        }
    }
}

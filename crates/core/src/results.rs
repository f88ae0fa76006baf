//! Intake of externally computed prediction results.
//!
//! The classifier runs elsewhere; this module only records what it produced for the calling
//! patient and returns their history for trend views.

use crate::caller::CallerContext;
use crate::ids::ResultId;
use crate::model::{Disease, PredictionResult, Role};
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use riskcare_types::{NonEmptyText, Probability};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct NewPredictionResult {
    pub disease: Option<Disease>,
    pub prediction: Option<String>,
    pub probability: Option<f64>,
    /// Defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
    pub features: BTreeMap<String, f64>,
}

#[derive(Clone)]
pub struct ResultService {
    store: Arc<dyn RecordStore>,
}

impl ResultService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Stores a scored result owned by the calling patient.
    ///
    /// # Errors
    ///
    /// - [`CoreError::RoleRequired`] unless the caller is, and is registered as, a patient
    /// - [`CoreError::NotFound`] if the caller has no account
    /// - [`CoreError::MissingField`] / [`CoreError::InvalidInput`] for absent or invalid fields
    pub fn record_result(
        &self,
        caller: &CallerContext,
        input: NewPredictionResult,
    ) -> CoreResult<PredictionResult> {
        caller.require_role(Role::Patient)?;
        let disease = input.disease.ok_or(CoreError::MissingField("disease"))?;
        let prediction = input
            .prediction
            .ok_or(CoreError::MissingField("prediction"))?;
        let prediction = NonEmptyText::new(prediction)
            .map_err(|_| CoreError::InvalidInput("prediction cannot be empty".into()))?;
        let probability = input.probability.map(Probability::new).transpose()?;
        if let Some((name, value)) = input.features.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CoreError::InvalidInput(format!(
                "feature {} is not a finite number: {}",
                name, value
            )));
        }

        let owner = self
            .store
            .get_user(caller.user_id)?
            .ok_or_else(|| CoreError::not_found("user", caller.user_id))?;
        if owner.role != Role::Patient {
            return Err(CoreError::RoleRequired(Role::Patient.as_str()));
        }

        let result = PredictionResult {
            id: ResultId::new(),
            owner_id: caller.user_id,
            disease,
            prediction,
            probability,
            timestamp: input.timestamp.unwrap_or_else(Utc::now),
            features: input.features,
        };
        self.store.put_result(&result)?;
        tracing::info!(
            "recorded {} result {} for {}",
            result.disease,
            result.id,
            result.owner_id
        );
        Ok(result)
    }

    /// The calling patient's results, oldest first.
    pub fn list_results(&self, caller: &CallerContext) -> CoreResult<Vec<PredictionResult>> {
        caller.require_role(Role::Patient)?;
        self.store.list_results_for_owner(caller.user_id)
    }
}

use tracing::instrument;

use crate::{
    error::ApiError,
    http::{ApiClient, ApiResponse},
    model::{RiskAssessment, RiskAssessmentDetail},
};

/// Risk evaluation endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Risk<'a> {
    api: &'a ApiClient,
}

impl<'a> Risk<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Asks the backend to score a client.
    ///
    /// # Errors
    ///
    /// An empty id is rejected before any request is made. Transport and
    /// status errors are propagated.
    #[instrument(skip(self))]
    pub async fn evaluate(&self, client_id: &str) -> Result<ApiResponse, ApiError> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(ApiError::Validation("Client ID is missing".to_string()));
        }
        self.api
            .post_empty(&format!("/risk/evaluate/{}", crate::http::encode(client_id)))
            .await
    }

    /// Assessments of a client, newest first.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn history(&self, client_id: i64) -> Result<Vec<RiskAssessment>, ApiError> {
        self.api.get(&format!("/risk/assessments/{client_id}")).await
    }

    /// Per-element breakdown of one assessment.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn details(&self, assessment_id: i64) -> Result<Vec<RiskAssessmentDetail>, ApiError> {
        self.api
            .get(&format!("/risk/assessment-details/{assessment_id}"))
            .await
    }
}

use serde_json::Value;

use crate::{
    error::ApiError,
    http::{ApiClient, ApiResponse},
};

/// Case questionnaire endpoints. Template and answers are free-form JSON
/// owned by the backend.
#[derive(Debug, Clone, Copy)]
pub struct Questionnaires<'a> {
    api: &'a ApiClient,
}

impl<'a> Questionnaires<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// The questionnaire template.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn template(&self) -> Result<Value, ApiError> {
        self.api.get("/questionnaire/template").await
    }

    /// Answers recorded for a case.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn responses(&self, case_id: i64) -> Result<Value, ApiError> {
        self.api.get(&format!("/questionnaire/case/{case_id}")).await
    }

    /// Saves the answers for a case.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn save(&self, case_id: i64, responses: &Value) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit(&format!("/questionnaire/case/{case_id}"), Some(responses))
            .await
    }
}

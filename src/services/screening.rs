use tracing::instrument;

use crate::{
    error::ApiError,
    http::ApiClient,
    model::{ScreeningInitiation, ScreeningLog, ScreeningStatus},
};

/// Individual screening endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Screening<'a> {
    api: &'a ApiClient,
}

impl<'a> Screening<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Starts screening a client against every context.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    #[instrument(skip(self))]
    pub async fn initiate(&self, client_id: i64) -> Result<ScreeningInitiation, ApiError> {
        self.api
            .post_for(&format!("/screening/initiate/{client_id}"))
            .await
    }

    /// Current per-context results of a screening request.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn status(&self, request_id: &str) -> Result<ScreeningStatus, ApiError> {
        self.api
            .get(&format!("/screening/status/{}", crate::http::encode(request_id)))
            .await
    }

    /// Past screenings of a client.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn history(&self, client_id: i64) -> Result<Vec<ScreeningLog>, ApiError> {
        self.api.get(&format!("/screening/history/{client_id}")).await
    }
}

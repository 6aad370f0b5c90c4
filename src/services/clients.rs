use serde::Serialize;
use tracing::instrument;

use super::or_empty;
use crate::{
    error::ApiError,
    http::{ApiClient, ApiResponse},
    model::{Case, Client, MaterialChange, NewRelatedParty, Page, RelatedParty, RiskAssessment},
};

/// Everything shown on a client's profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOverview {
    /// The client record.
    pub client: Client,
    /// Cases opened for the client.
    pub cases: Vec<Case>,
    /// Risk assessments, newest first.
    pub risk_history: Vec<RiskAssessment>,
    /// Material changes recorded for the client.
    pub material_changes: Vec<MaterialChange>,
}

impl ClientOverview {
    /// The most recent risk assessment.
    #[must_use]
    pub fn latest_risk(&self) -> Option<&RiskAssessment> {
        self.risk_history.first()
    }
}

/// Client directory endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Clients<'a> {
    api: &'a ApiClient,
}

impl<'a> Clients<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// One page of the directory, or of the search results when `query` is
    /// not blank.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn list(&self, query: &str, page: u32, size: u32) -> Result<Page<Client>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            self.api
                .get_with(
                    "/clients",
                    &[("page", page.to_string()), ("size", size.to_string())],
                )
                .await
        } else {
            self.api
                .get_with(
                    "/clients/search",
                    &[
                        ("query", query.to_string()),
                        ("page", page.to_string()),
                        ("size", size.to_string()),
                    ],
                )
                .await
        }
    }

    /// A single client.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn get(&self, id: i64) -> Result<Client, ApiError> {
        self.api.get(&format!("/clients/{id}")).await
    }

    /// The client profile: the record itself, then cases, risk history and
    /// material changes fetched concurrently. The secondary sections degrade
    /// to empty when their fetch fails.
    ///
    /// # Errors
    ///
    /// Fails only when the client record itself cannot be loaded.
    #[instrument(level = "debug", skip(self))]
    pub async fn overview(&self, id: i64) -> Result<ClientOverview, ApiError> {
        let client = self.get(id).await?;
        let (cases, risk_history, material_changes) = tokio::join!(
            self.api.cases().for_client(id),
            self.api.risk().history(id),
            self.changes(id),
        );

        Ok(ClientOverview {
            client,
            cases: or_empty("client cases", cases),
            risk_history: or_empty("risk history", risk_history),
            material_changes: or_empty("material changes", material_changes),
        })
    }

    /// Material changes recorded for one client.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn changes(&self, id: i64) -> Result<Vec<MaterialChange>, ApiError> {
        self.api.get(&format!("/clients/{id}/changes")).await
    }

    /// Attaches a related party.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn add_related_party(
        &self,
        id: i64,
        party: &NewRelatedParty,
    ) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit(&format!("/clients/{id}/related-parties"), Some(party))
            .await
    }

    /// A single related party.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn related_party(&self, party_id: i64) -> Result<RelatedParty, ApiError> {
        self.api
            .get(&format!("/clients/related-parties/{party_id}"))
            .await
    }

    /// Re-ingests the client from the source system.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn ingest(&self, id: i64) -> Result<ApiResponse, ApiError> {
        self.api.post_empty(&format!("/clients/{id}/ingest")).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::{Method, fake::FakeTransport};

    #[tokio::test]
    async fn blank_query_lists_and_text_searches() {
        let fake = FakeTransport::new();
        fake.on_json(
            Method::Get,
            "/clients?page=0&size=10",
            json!({"content": [], "totalElements": 0}),
        );
        fake.on_json(
            Method::Get,
            "/clients/search?query=smith&page=1&size=10",
            json!({"content": [{"clientID": 3, "lastName": "Smith"}], "totalElements": 11}),
        );
        let api = fake.client();

        let all = api.clients().list("  ", 0, 10).await.unwrap();
        let found = api.clients().list("smith", 1, 10).await.unwrap();

        assert!(all.content.is_empty());
        assert_eq!(found.content[0].client_id, 3);
        assert_eq!(found.total_elements(), 11);
    }

    #[tokio::test]
    async fn overview_tolerates_failing_sections() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, "/clients/5", json!({"clientID": 5, "firstName": "Ada"}));
        fake.on_json(
            Method::Get,
            "/cases/client/5",
            json!([{"caseID": 1, "clientID": 5, "status": "KYC_ANALYST"}]),
        );
        fake.on(
            Method::Get,
            "/risk/assessments/5",
            crate::http::RawResponse::text(500, "risk service down"),
        );

        let overview = fake.client().clients().overview(5).await.unwrap();

        assert_eq!(overview.client.client_id, 5);
        assert_eq!(overview.cases.len(), 1);
        assert!(overview.risk_history.is_empty());
        assert!(overview.material_changes.is_empty());
        assert!(overview.latest_risk().is_none());
    }

    #[tokio::test]
    async fn overview_fails_without_client() {
        let fake = FakeTransport::new();
        let error = fake.client().clients().overview(404).await.unwrap_err();
        assert_eq!(error.status(), Some(404));
    }
}

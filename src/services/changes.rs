use chrono::NaiveDate;
use tracing::instrument;

use crate::{
    error::ApiError,
    http::{ApiClient, ApiResponse},
    model::{ChangeAction, ChangeCategory, MaterialChange, MaterialChangeConfig, Page},
};

/// Sort order of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

impl SortDirection {
    /// Backend spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filters for the material change listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    /// Earliest change date, inclusive.
    pub start: Option<NaiveDate>,
    /// Latest change date, inclusive.
    pub end: Option<NaiveDate>,
    /// Column to sort by. The backend defaults to `changeDate`.
    pub sort_by: Option<String>,
    /// Sort direction.
    pub sort_dir: SortDirection,
}

impl ChangeFilter {
    fn date_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(start) = self.start {
            params.push(("startDate", start.to_string()));
        }
        if let Some(end) = self.end {
            params.push(("endDate", end.to_string()));
        }
        params
    }
}

/// Errors raised when running a row action on a listed change.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The change is not on the listed page.
    #[error("change {0} is not on this page")]
    NotListed(i64),

    /// The row does not offer the action.
    #[error("{} is not available on change {change_id} ({status}, {category})", .action.label())]
    NotAvailable {
        /// Id of the change.
        change_id: i64,
        /// The refused action.
        action: ChangeAction,
        /// Review status of the change.
        status: String,
        /// Category of the change.
        category: ChangeCategory,
    },

    /// The backend request failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Material change endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Changes<'a> {
    api: &'a ApiClient,
}

impl<'a> Changes<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// One page of material changes.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn list(
        &self,
        page: u32,
        size: u32,
        filter: &ChangeFilter,
    ) -> Result<Page<MaterialChange>, ApiError> {
        let mut params = vec![("page", page.to_string()), ("size", size.to_string())];
        params.extend(filter.date_params());
        if let Some(sort_by) = &filter.sort_by {
            params.push(("sortBy", sort_by.clone()));
        }
        params.push(("sortDir", filter.sort_dir.as_str().to_string()));
        self.api.get_with("/clients/changes", &params).await
    }

    /// Every change in the date range, as raw records for export.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn export(
        &self,
        filter: &ChangeFilter,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, ApiError> {
        self.api
            .get_with("/clients/changes/export", &filter.date_params())
            .await
    }

    /// Runs a row action: trigger risk, trigger screening or mark reviewed.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn apply(&self, change_id: i64, action: ChangeAction) -> Result<ApiResponse, ApiError> {
        self.api
            .post_empty(&format!("/clients/changes/{change_id}/{}", action.endpoint()))
            .await
    }

    /// Runs a row action on a change of the given page, then reloads that
    /// page.
    ///
    /// The action must be one of the row's
    /// [`MaterialChange::available_actions`]; otherwise nothing is sent.
    ///
    /// # Errors
    ///
    /// [`ApplyError::NotListed`] when the change is not on the page,
    /// [`ApplyError::NotAvailable`] when the row does not offer the action,
    /// and [`ApplyError::Api`] for failed requests.
    #[instrument(level = "debug", skip(self))]
    pub async fn apply_listed(
        &self,
        change_id: i64,
        action: ChangeAction,
        page: u32,
        size: u32,
        filter: &ChangeFilter,
    ) -> Result<Page<MaterialChange>, ApplyError> {
        let listed = self.list(page, size, filter).await?;
        let change = listed
            .content
            .iter()
            .find(|change| change.change_id == change_id)
            .ok_or(ApplyError::NotListed(change_id))?;
        if !change.available_actions().contains(&action) {
            return Err(ApplyError::NotAvailable {
                change_id,
                action,
                status: change.status.clone(),
                category: change.category.clone(),
            });
        }

        self.apply(change_id, action).await?;
        Ok(self.list(page, size, filter).await?)
    }

    /// Columns currently tracked as material.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn configs(&self) -> Result<Vec<MaterialChangeConfig>, ApiError> {
        self.api.get("/clients/admin/configs").await
    }

    /// Creates or updates one tracked column.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn save_config(&self, config: &MaterialChangeConfig) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit("/clients/admin/configs", Some(config))
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::http::{Method, fake::FakeTransport};

    #[tokio::test]
    async fn list_sends_filters() {
        let fake = FakeTransport::new();
        fake.on_json(
            Method::Get,
            "/clients/changes?page=2&size=10&startDate=2024-01-01&endDate=2024-01-31&sortBy=clientID&sortDir=ASC",
            json!({"content": [], "totalElements": 0}),
        );

        let filter = ChangeFilter {
            start: NaiveDate::from_ymd_opt(2024, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 31),
            sort_by: Some("clientID".into()),
            sort_dir: SortDirection::Asc,
        };
        let page = fake.client().changes().list(2, 10, &filter).await.unwrap();

        assert!(page.content.is_empty());
    }

    #[tokio::test]
    async fn actions_hit_their_endpoints() {
        let fake = FakeTransport::new();
        for suffix in ["trigger-risk", "trigger-screening", "review"] {
            fake.on_json(Method::Post, &format!("/clients/changes/9/{suffix}"), json!({}));
        }
        let api = fake.client();

        for action in [ChangeAction::Risk, ChangeAction::Screen, ChangeAction::Done] {
            api.changes().apply(9, action).await.unwrap();
        }

        assert_eq!(
            fake.paths(),
            [
                "POST /clients/changes/9/trigger-risk",
                "POST /clients/changes/9/trigger-screening",
                "POST /clients/changes/9/review",
            ]
        );
    }

    const PAGE_TWO: &str = "/clients/changes?page=2&size=5&sortDir=DESC";

    fn listed(status: &str, category: &str) -> serde_json::Value {
        json!({
            "content": [{"changeID": 9, "clientID": 4, "status": status, "category": category}],
            "totalElements": 11,
        })
    }

    #[tokio::test]
    async fn listed_action_runs_and_reloads_the_same_page() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, PAGE_TWO, listed("PENDING", "SCREENING"));
        fake.on_json(Method::Post, "/clients/changes/9/trigger-screening", json!({}));
        fake.on_json(Method::Get, PAGE_TWO, listed("REVIEWED", "SCREENING"));

        let page = fake
            .client()
            .changes()
            .apply_listed(9, ChangeAction::Screen, 2, 5, &ChangeFilter::default())
            .await
            .unwrap();

        assert_eq!(page.content[0].status, "REVIEWED");
        assert_eq!(
            fake.paths(),
            [
                format!("GET {PAGE_TWO}"),
                "POST /clients/changes/9/trigger-screening".to_string(),
                format!("GET {PAGE_TWO}"),
            ]
        );
    }

    #[test_case("PENDING", "SCREENING", ChangeAction::Risk; "risk on a screening change")]
    #[test_case("PENDING", "RISK", ChangeAction::Screen; "screening on a risk change")]
    #[test_case("REVIEWED", "BOTH", ChangeAction::Done; "reviewed change")]
    #[tokio::test]
    async fn unavailable_actions_send_nothing(status: &str, category: &str, action: ChangeAction) {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, PAGE_TWO, listed(status, category));

        let error = fake
            .client()
            .changes()
            .apply_listed(9, action, 2, 5, &ChangeFilter::default())
            .await
            .unwrap_err();

        assert!(matches!(error, ApplyError::NotAvailable { change_id: 9, .. }));
        assert_eq!(fake.paths(), [format!("GET {PAGE_TWO}")]);
    }

    #[tokio::test]
    async fn changes_off_the_page_are_refused() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, PAGE_TWO, listed("PENDING", "BOTH"));

        let error = fake
            .client()
            .changes()
            .apply_listed(10, ChangeAction::Done, 2, 5, &ChangeFilter::default())
            .await
            .unwrap_err();

        assert!(matches!(error, ApplyError::NotListed(10)));
        assert_eq!(fake.count(Method::Post, "/clients/changes/10/review"), 0);
    }

    #[tokio::test]
    async fn export_keeps_backend_column_order() {
        let fake = FakeTransport::new();
        fake.on(
            Method::Get,
            "/clients/changes/export",
            crate::http::RawResponse {
                status: 200,
                content_type: Some("application/json".into()),
                body: br#"[{"changeID":1,"clientID":2,"category":"RISK"}]"#.to_vec(),
            },
        );

        let rows = fake
            .client()
            .changes()
            .export(&ChangeFilter::default())
            .await
            .unwrap();

        let keys: Vec<_> = rows[0].keys().cloned().collect();
        assert_eq!(keys, ["changeID", "clientID", "category"]);
    }
}

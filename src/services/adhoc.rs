use serde::Serialize;
use tracing::instrument;

use crate::{
    error::ApiError,
    http::{ApiClient, ApiResponse, encode},
    model::{AdHocTask, NewAdHocTask},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Reply<'a> {
    response_text: &'a str,
}

#[derive(Serialize)]
struct Reassignment<'a> {
    assignee: &'a str,
}

/// Ad-hoc task endpoints.
#[derive(Debug, Clone, Copy)]
pub struct AdHocTasks<'a> {
    api: &'a ApiClient,
}

impl<'a> AdHocTasks<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Tasks the current user sent or received.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn list(&self) -> Result<Vec<AdHocTask>, ApiError> {
        self.api.get("/adhoc-tasks").await
    }

    /// A single task.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn get(&self, id: &str) -> Result<AdHocTask, ApiError> {
        self.api.get(&format!("/adhoc-tasks/{}", encode(id))).await
    }

    /// Sends a request to another user.
    ///
    /// # Errors
    ///
    /// Fails before sending when the assignee or the request text is blank.
    #[instrument(skip(self, task), fields(assignee = %task.assignee))]
    pub async fn create(&self, task: &NewAdHocTask) -> Result<ApiResponse, ApiError> {
        if task.assignee.trim().is_empty() || task.request_text.trim().is_empty() {
            return Err(ApiError::Validation(
                "Assignee and Request Text are required".to_string(),
            ));
        }
        self.api.post_unit("/adhoc-tasks", Some(task)).await
    }

    /// Answers a task.
    ///
    /// # Errors
    ///
    /// Fails before sending when the response is blank.
    #[instrument(skip(self, response_text))]
    pub async fn respond(&self, id: &str, response_text: &str) -> Result<ApiResponse, ApiError> {
        if response_text.trim().is_empty() {
            return Err(ApiError::Validation("Response is required".to_string()));
        }
        self.api
            .post_unit(
                &format!("/adhoc-tasks/{}/respond", encode(id)),
                Some(&Reply { response_text }),
            )
            .await
    }

    /// Hands a task to someone else.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn reassign(&self, id: &str, assignee: &str) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit(
                &format!("/adhoc-tasks/{}/reassign", encode(id)),
                Some(&Reassignment { assignee }),
            )
            .await
    }

    /// Closes a task.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn complete(&self, id: &str) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit(
                &format!("/adhoc-tasks/{}/complete", encode(id)),
                Some(&serde_json::json!({})),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::http::{Body, Method, RawResponse, fake::FakeTransport};

    #[test_case("", "please send docs"; "no assignee")]
    #[test_case("analyst", "  "; "no request")]
    #[tokio::test]
    async fn create_requires_assignee_and_text(assignee: &str, text: &str) {
        let fake = FakeTransport::new();
        let task = NewAdHocTask {
            assignee: assignee.into(),
            request_text: text.into(),
            client_id: None,
        };

        let error = fake.client().adhoc().create(&task).await.unwrap_err();

        assert_eq!(error.to_string(), "Assignee and Request Text are required");
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn respond_posts_response_text() {
        let fake = FakeTransport::new();
        fake.on(Method::Post, "/adhoc-tasks/t1/respond", RawResponse::text(200, "ok"));

        fake.client().adhoc().respond("t1", "attached").await.unwrap();

        assert_eq!(
            fake.requests()[0].body,
            Body::Json(json!({"responseText": "attached"}))
        );
    }

    #[tokio::test]
    async fn complete_sends_empty_object() {
        let fake = FakeTransport::new();
        fake.on(Method::Post, "/adhoc-tasks/t1/complete", RawResponse::text(200, ""));

        fake.client().adhoc().complete("t1").await.unwrap();

        assert_eq!(fake.requests()[0].body, Body::Json(json!({})));
    }
}

use non_empty_string::NonEmptyString;
use serde::Serialize;
use tracing::instrument;

use super::or_empty;
use crate::{
    error::{ApiError, CASE_VALIDATION_FAILED},
    http::{ApiClient, ApiResponse, FormPart, encode},
    model::{
        Case, CaseAction, CaseComment, CaseDocument, CaseEvent, NewCase, Page, ProcessInstance,
        RiskAssessment, TimelineItem, Transition, User, WorkflowTask,
    },
};

/// Reason recorded when a case is opened without one.
pub const DEFAULT_CASE_REASON: &str = "Periodic Review";

#[derive(Serialize)]
struct TransitionBody<'a> {
    action: Transition,
    comment: &'a str,
}

#[derive(Serialize)]
struct Assignment<'a> {
    assignee: &'a str,
}

/// A document to attach to a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    /// File name sent with the upload.
    pub file_name: String,
    /// MIME type, when known.
    pub mime: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Document category, for example `PASSPORT`.
    pub category: String,
    /// Free-text comment.
    pub comment: String,
    /// Display name overriding the file name. Re-using a name adds a version.
    pub document_name: Option<String>,
}

/// Everything shown on the case detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDetails {
    /// The case record.
    pub case: Case,
    /// Comments, oldest first.
    pub comments: Vec<CaseComment>,
    /// Uploaded documents.
    pub documents: Vec<CaseDocument>,
    /// Audit events.
    pub events: Vec<CaseEvent>,
    /// Other cases of the same client.
    pub related_cases: Vec<Case>,
    /// Risk assessments of the client.
    pub risk_history: Vec<RiskAssessment>,
    /// Only populated for CMMN cases.
    pub timeline: Vec<TimelineItem>,
    /// The current user's open tasks on this case.
    pub tasks: Vec<WorkflowTask>,
}

impl CaseDetails {
    /// Whether `username` may approve or reject the case.
    #[must_use]
    pub fn can_transition(&self, username: &str) -> bool {
        self.case.can_transition(username, self.tasks.len())
    }
}

/// Case, document and workflow task endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Cases<'a> {
    api: &'a ApiClient,
}

impl<'a> Cases<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// All cases visible to the user.
    ///
    /// The backend answers with a plain list, presented here as one page.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn list(&self) -> Result<Page<Case>, ApiError> {
        self.api.get("/cases").await.map(Page::single)
    }

    /// A single case.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn get(&self, id: i64) -> Result<Case, ApiError> {
        self.api.get(&format!("/cases/{id}")).await
    }

    /// Cases opened for a client.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn for_client(&self, client_id: i64) -> Result<Vec<Case>, ApiError> {
        self.api.get(&format!("/cases/client/{client_id}")).await
    }

    /// Comments on a case.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn comments(&self, id: i64) -> Result<Vec<CaseComment>, ApiError> {
        self.api.get(&format!("/cases/{id}/comments")).await
    }

    /// Latest version of each document attached to a case.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn documents(&self, id: i64) -> Result<Vec<CaseDocument>, ApiError> {
        self.api.get(&format!("/cases/{id}/documents")).await
    }

    /// Every version of the document called `name`.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn document_versions(&self, id: i64, name: &str) -> Result<Vec<CaseDocument>, ApiError> {
        self.api
            .get_with(
                &format!("/cases/{id}/documents/versions"),
                &[("name", name.to_string())],
            )
            .await
    }

    /// Raw content of a document.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn download(&self, document_id: i64) -> Result<Vec<u8>, ApiError> {
        self.api
            .get_bytes(&format!("/cases/documents/{document_id}"))
            .await
    }

    /// Audit events of a case.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn events(&self, id: i64) -> Result<Vec<CaseEvent>, ApiError> {
        self.api.get(&format!("/cases/{id}/events")).await
    }

    /// Plan items of a CMMN case.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn timeline(&self, id: i64) -> Result<Vec<TimelineItem>, ApiError> {
        self.api.get(&format!("/cases/{id}/timeline")).await
    }

    /// Discretionary actions currently available on a CMMN case.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn actions(&self, id: i64) -> Result<Vec<CaseAction>, ApiError> {
        self.api.get(&format!("/cases/{id}/actions")).await
    }

    /// Triggers a discretionary action with its form variables.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    #[instrument(level = "debug", skip(self, variables))]
    pub async fn trigger_action(
        &self,
        id: i64,
        action_id: &str,
        variables: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit(
                &format!("/cases/{id}/actions/{}", encode(action_id)),
                Some(variables),
            )
            .await
    }

    /// Approves or rejects a legacy case.
    ///
    /// Nothing changes locally: on success the caller refetches the case.
    ///
    /// # Errors
    ///
    /// A 400 that carries no explanation is reported as
    /// [`CASE_VALIDATION_FAILED`]; any other failure is propagated.
    #[instrument(skip(self, comment))]
    pub async fn transition(
        &self,
        id: i64,
        action: Transition,
        comment: &NonEmptyString,
    ) -> Result<ApiResponse, ApiError> {
        let body = TransitionBody {
            action,
            comment: comment.as_str(),
        };
        self.api
            .post_unit(&format!("/cases/{id}/transition"), Some(&body))
            .await
            .map_err(validation_failure)
    }

    /// Assigns a case to a user.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn assign(&self, id: i64, assignee: &str) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit(&format!("/cases/{id}/assign"), Some(&Assignment { assignee }))
            .await
    }

    /// Opens a case and returns its id.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    #[instrument(skip(self))]
    pub async fn create(&self, case: &NewCase) -> Result<i64, ApiError> {
        self.api.post("/cases", case).await
    }

    /// Uploads a document on behalf of `uploaded_by`.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    #[instrument(skip(self, upload), fields(file = %upload.file_name))]
    pub async fn upload(
        &self,
        id: i64,
        upload: DocumentUpload,
        uploaded_by: &str,
    ) -> Result<ApiResponse, ApiError> {
        let mut parts = vec![
            FormPart::file("file", upload.file_name, upload.mime, upload.bytes),
            FormPart::text("category", upload.category),
            FormPart::text("comment", upload.comment),
            FormPart::text("uploadedBy", uploaded_by),
        ];
        if let Some(name) = upload.document_name.filter(|n| !n.trim().is_empty()) {
            parts.push(FormPart::text("documentName", name));
        }
        self.api
            .post_multipart(&format!("/cases/{id}/documents"), parts)
            .await
    }

    /// Open workflow tasks of the current user.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn my_tasks(&self) -> Result<Vec<WorkflowTask>, ApiError> {
        self.api.get("/cases/tasks").await
    }

    /// Number of open tasks, zero when they cannot be loaded.
    pub async fn inbox_count(&self) -> usize {
        or_empty("task inbox", self.my_tasks().await).len()
    }

    /// Deletes every workflow task.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn clear_tasks(&self) -> Result<ApiResponse, ApiError> {
        self.api.delete("/cases/tasks").await
    }

    /// Completes a workflow task.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn complete_task(&self, task_id: &str) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit(
                &format!("/cases/tasks/{}/complete", encode(task_id)),
                Some(&serde_json::json!({})),
            )
            .await
    }

    /// Every open task in the engine.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn admin_tasks(&self) -> Result<Vec<WorkflowTask>, ApiError> {
        self.api.get("/cases/admin/tasks").await
    }

    /// Every running process and case instance.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn admin_processes(&self) -> Result<Vec<ProcessInstance>, ApiError> {
        self.api.get("/cases/admin/processes").await
    }

    /// Terminates a process instance.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn terminate_process(&self, process_id: &str) -> Result<ApiResponse, ApiError> {
        self.api
            .delete(&format!("/cases/admin/processes/{}", encode(process_id)))
            .await
    }

    /// Moves legacy cases onto the current workflow engine.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn migrate(&self) -> Result<ApiResponse, ApiError> {
        self.api.post_empty("/cases/migrate").await
    }

    /// Users holding a role, for the assignment picker.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn users_by_role(&self, role: &str) -> Result<Vec<User>, ApiError> {
        self.api.get(&format!("/users/role/{}", encode(role))).await
    }

    /// Loads the case detail page.
    ///
    /// The case, comments, documents and events are fetched together and any
    /// failure among them is fatal. Related cases, risk history, the timeline
    /// and the user's tasks are fetched afterwards and degrade to empty.
    ///
    /// # Errors
    ///
    /// Fails when one of the primary sections cannot be loaded.
    #[instrument(skip(self))]
    pub async fn details(&self, id: i64) -> Result<CaseDetails, ApiError> {
        let (case, comments, documents, events) = tokio::try_join!(
            self.get(id),
            self.comments(id),
            self.documents(id),
            self.events(id),
        )?;

        let timeline = async {
            if case.is_cmmn() {
                self.timeline(id).await
            } else {
                Ok(Vec::new())
            }
        };
        let (related, risk_history, timeline, tasks) = tokio::join!(
            self.for_client(case.client_id),
            self.api.risk().history(case.client_id),
            timeline,
            self.my_tasks(),
        );

        let related_cases = or_empty("related cases", related)
            .into_iter()
            .filter(|c| c.case_id != case.case_id)
            .collect();
        let tasks = or_empty("case tasks", tasks)
            .into_iter()
            .filter(|t| case.owns_task(t))
            .collect();

        Ok(CaseDetails {
            related_cases,
            risk_history: or_empty("risk history", risk_history),
            timeline: or_empty("case timeline", timeline),
            tasks,
            case,
            comments,
            documents,
            events,
        })
    }
}

fn validation_failure(error: ApiError) -> ApiError {
    match error {
        ApiError::Client { status: 400, ref message }
            if message == "API Error 400" || message.starts_with("400 ") =>
        {
            ApiError::Validation(CASE_VALIDATION_FAILED.to_string())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::{Body, Method, RawResponse, fake::FakeTransport, transport::PartContent};

    fn comment() -> NonEmptyString {
        NonEmptyString::new("looks fine".to_string()).unwrap()
    }

    #[tokio::test]
    async fn plain_list_becomes_single_page() {
        let fake = FakeTransport::new();
        fake.on_json(
            Method::Get,
            "/cases",
            json!([
                {"caseID": 1, "clientID": 5},
                {"caseID": 2, "clientID": 6},
            ]),
        );

        let page = fake.client().cases().list().await.unwrap();

        assert_eq!(page.content.len(), 2);
        assert_eq!(page.total_elements(), 2);
        assert_eq!(page.total_pages, Some(1));
    }

    #[tokio::test]
    async fn bare_400_transition_is_validation_failure() {
        let fake = FakeTransport::new();
        fake.on(Method::Post, "/cases/7/transition", RawResponse::text(400, ""));

        let error = fake
            .client()
            .cases()
            .transition(7, Transition::Approve, &comment())
            .await
            .unwrap_err();

        assert_eq!(error, ApiError::Validation(CASE_VALIDATION_FAILED.to_string()));
        assert_eq!(
            fake.requests()[0].body,
            Body::Json(json!({"action": "APPROVE", "comment": "looks fine"}))
        );
    }

    #[tokio::test]
    async fn transition_surfaces_backend_message() {
        let fake = FakeTransport::new();
        fake.on(
            Method::Post,
            "/cases/7/transition",
            RawResponse::json(400, &json!({"message": "Passport document missing"})),
        );

        let error = fake
            .client()
            .cases()
            .transition(7, Transition::Reject, &comment())
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "Passport document missing");
        assert_eq!(fake.count(Method::Get, "/cases/7"), 0);
    }

    #[tokio::test]
    async fn upload_sends_form_fields() {
        let fake = FakeTransport::new();
        fake.on(Method::Post, "/cases/3/documents", RawResponse::text(200, ""));

        fake.client()
            .cases()
            .upload(
                3,
                DocumentUpload {
                    file_name: "passport.pdf".into(),
                    mime: Some("application/pdf".into()),
                    bytes: b"%PDF".to_vec(),
                    category: "PASSPORT".into(),
                    comment: "front page".into(),
                    document_name: None,
                },
                "jdoe",
            )
            .await
            .unwrap();

        let Body::Multipart(parts) = &fake.requests()[0].body else {
            panic!("expected multipart body");
        };
        let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["file", "category", "comment", "uploadedBy"]);
        assert!(matches!(&parts[0].content, PartContent::File { file_name, .. } if file_name == "passport.pdf"));
        assert_eq!(parts[3].content, PartContent::Text("jdoe".into()));
    }

    #[tokio::test]
    async fn details_degrade_secondary_sections() {
        let fake = FakeTransport::new();
        fake.on_json(
            Method::Get,
            "/cases/4",
            json!({"caseID": 4, "clientID": 9, "status": "KYC_ANALYST", "workflowType": "CMMN", "instanceID": "ci-1"}),
        );
        fake.on_json(Method::Get, "/cases/4/comments", json!([]));
        fake.on_json(Method::Get, "/cases/4/documents", json!([]));
        fake.on_json(Method::Get, "/cases/4/events", json!([]));
        fake.on_json(
            Method::Get,
            "/cases/client/9",
            json!([{"caseID": 4, "clientID": 9}, {"caseID": 8, "clientID": 9}]),
        );
        fake.fail(Method::Get, "/risk/assessments/9", "connection reset");
        fake.on(Method::Get, "/cases/4/timeline", RawResponse::text(500, ""));
        fake.on_json(
            Method::Get,
            "/cases/tasks",
            json!([
                {"taskId": "t1", "caseInstanceId": "ci-1"},
                {"taskId": "t2", "caseId": 99},
            ]),
        );

        let details = fake.client().cases().details(4).await.unwrap();

        assert_eq!(details.related_cases.len(), 1);
        assert_eq!(details.related_cases[0].case_id, 8);
        assert!(details.risk_history.is_empty());
        assert!(details.timeline.is_empty());
        assert_eq!(details.tasks.len(), 1);
        assert!(details.can_transition("jdoe"));
    }

    #[tokio::test]
    async fn details_fail_when_primary_section_fails() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, "/cases/4", json!({"caseID": 4, "clientID": 9}));
        fake.on_json(Method::Get, "/cases/4/documents", json!([]));
        fake.on_json(Method::Get, "/cases/4/events", json!([]));

        let error = fake.client().cases().details(4).await.unwrap_err();

        assert_eq!(error.status(), Some(404));
    }

    #[tokio::test]
    async fn legacy_case_skips_timeline() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, "/cases/4", json!({"caseID": 4, "clientID": 9}));
        for section in ["comments", "documents", "events"] {
            fake.on_json(Method::Get, &format!("/cases/4/{section}"), json!([]));
        }

        fake.client().cases().details(4).await.unwrap();

        assert_eq!(fake.count(Method::Get, "/cases/4/timeline"), 0);
    }

    #[tokio::test]
    async fn inbox_count_degrades_to_zero() {
        let fake = FakeTransport::new();
        fake.fail(Method::Get, "/cases/tasks", "timeout");
        assert_eq!(fake.client().cases().inbox_count().await, 0);
    }
}

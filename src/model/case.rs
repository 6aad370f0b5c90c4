use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::time;

/// Statuses of the legacy (non-CMMN) approval chain, in order.
pub const LEGACY_WORKFLOW: [&str; 5] = [
    "KYC_ANALYST",
    "REVIEWER_REVIEW",
    "AFC_REVIEW",
    "ACO_REVIEW",
    "APPROVED",
];

/// A KYC review case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    /// Case id.
    #[serde(rename = "caseID")]
    pub case_id: i64,
    /// Client under review.
    #[serde(rename = "clientID")]
    pub client_id: i64,
    /// Display name of the client.
    #[serde(default)]
    pub client_name: Option<String>,
    /// Lifecycle status, e.g. `KYC_ANALYST`.
    #[serde(default)]
    pub status: Option<String>,
    /// Why the case was opened.
    #[serde(default)]
    pub reason: Option<String>,
    /// Role or user holding the case.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// `CMMN` for case-engine cases, otherwise the legacy workflow.
    #[serde(default)]
    pub workflow_type: Option<String>,
    /// Workflow or case instance id.
    #[serde(rename = "instanceID", default)]
    pub instance_id: Option<String>,
    /// Opening time.
    #[serde(default, with = "time")]
    pub created_date: Option<NaiveDateTime>,
}

impl Case {
    /// Status or an empty string.
    #[must_use]
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }

    /// True when the case runs on the CMMN engine and therefore has a
    /// timeline.
    #[must_use]
    pub fn is_cmmn(&self) -> bool {
        self.workflow_type.as_deref() == Some("CMMN")
    }

    /// True once the case reached a terminal status.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.status(), "APPROVED" | "REJECTED")
    }

    /// Counts toward the "pending" tile: waiting on processing or an analyst.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.status(), "PROCESSING" | "KYC_ANALYST")
    }

    /// Counts toward the "in review" tile.
    #[must_use]
    pub fn is_in_review(&self) -> bool {
        self.status().contains("REVIEW")
    }

    /// Whether `username` may approve or reject the case.
    ///
    /// The case must sit at a reviewable step and be assigned to the user or
    /// have an open task for them.
    #[must_use]
    pub fn can_transition(&self, username: &str, open_tasks: usize) -> bool {
        let at_step = LEGACY_WORKFLOW[..4].contains(&self.status());
        at_step && (self.assigned_to.as_deref() == Some(username) || open_tasks > 0)
    }

    /// Whether the case accepts assignment changes.
    #[must_use]
    pub fn can_assign(&self) -> bool {
        !self.is_closed()
    }

    /// Role whose members may be assigned at the current step.
    #[must_use]
    pub fn assignee_role(&self) -> Option<&'static str> {
        match self.status() {
            "PROCESSING" | "KYC_ANALYST" => Some("KYC_ANALYST"),
            "REVIEWER_REVIEW" => Some("KYC_REVIEWER"),
            "AFC_REVIEW" => Some("AFC_REVIEWER"),
            "ACO_REVIEW" => Some("ACO_REVIEWER"),
            _ => None,
        }
    }

    /// Whether a workflow task belongs to this case.
    #[must_use]
    pub fn owns_task(&self, task: &WorkflowTask) -> bool {
        task.case_id == Some(self.case_id)
            || (self.instance_id.is_some() && task.case_instance_id == self.instance_id)
    }
}

/// Decision submitted through `POST /cases/{id}/transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    /// Move to the next step.
    Approve,
    /// Reject the case.
    Reject,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        })
    }
}

/// A comment left on a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseComment {
    /// Comment id.
    #[serde(rename = "commentID", default)]
    pub comment_id: Option<i64>,
    /// Author.
    #[serde(rename = "userID", default)]
    pub user_id: Option<String>,
    /// The comment.
    #[serde(default)]
    pub comment_text: Option<String>,
    /// When it was written.
    #[serde(default, with = "time")]
    pub comment_date: Option<NaiveDateTime>,
    /// Role of the author at the time.
    #[serde(default)]
    pub role: Option<String>,
}

/// A document uploaded to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDocument {
    /// Document id.
    #[serde(rename = "documentID")]
    pub document_id: i64,
    /// Display name.
    #[serde(default)]
    pub document_name: Option<String>,
    /// Document category, e.g. `ID`.
    #[serde(default)]
    pub category: Option<String>,
    /// Content type of the upload.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Uploader.
    #[serde(default)]
    pub uploaded_by: Option<String>,
    /// Upload time.
    #[serde(default, with = "time")]
    pub upload_date: Option<NaiveDateTime>,
    /// Comment given on upload.
    #[serde(default)]
    pub comment: Option<String>,
    /// Version number within documents of the same name.
    #[serde(default)]
    pub version: Option<i32>,
}

/// An audit event recorded against a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseEvent {
    /// Event id.
    #[serde(rename = "eventID", default)]
    pub event_id: Option<i64>,
    /// Kind of event.
    #[serde(default)]
    pub event_type: Option<String>,
    /// Component that raised it.
    #[serde(default)]
    pub event_source: Option<String>,
    /// Human description.
    #[serde(default)]
    pub event_description: Option<String>,
    /// When it happened.
    #[serde(default, with = "time")]
    pub event_date: Option<NaiveDateTime>,
}

/// State of a CMMN plan item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineStatus {
    /// Finished normally.
    Completed,
    /// Stopped before completing.
    Terminated,
    /// Currently running.
    Active,
    /// Can be started.
    Available,
    /// Can be started manually.
    Enabled,
    /// Any state this client does not know.
    #[serde(other)]
    Unknown,
}

impl TimelineStatus {
    /// Glyph shown next to the item.
    #[must_use]
    pub const fn marker(&self) -> &'static str {
        match self {
            Self::Completed => "✓",
            Self::Terminated => "✗",
            Self::Active => "▶",
            Self::Available | Self::Enabled => "○",
            Self::Unknown => "?",
        }
    }
}

/// One entry of the CMMN case timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    /// Plan item name.
    #[serde(default)]
    pub name: Option<String>,
    /// Plan item kind, e.g. `humantask`.
    #[serde(default)]
    pub item_type: Option<String>,
    /// Current state.
    pub status: TimelineStatus,
    /// Start time.
    #[serde(default, with = "time")]
    pub start_time: Option<NaiveDateTime>,
    /// End time.
    #[serde(default, with = "time")]
    pub end_time: Option<NaiveDateTime>,
}

/// A discretionary action offered by the case engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseAction {
    /// Plan item instance id used to trigger the action.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Plan item definition, e.g. `evtOverrideRisk`.
    #[serde(default)]
    pub definition_id: Option<String>,
}

impl CaseAction {
    /// Form fields the action asks for before it can be triggered.
    #[must_use]
    pub fn required_variables(&self) -> &'static [&'static str] {
        match self.definition_id.as_deref() {
            Some("evtInitiateCommunication") => &["requestedInfo", "dueDate"],
            _ => &[],
        }
    }

    /// Human label, falling back to the known definitions.
    #[must_use]
    pub fn label(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match self.definition_id.as_deref() {
            Some("evtInitiateCommunication") => "Request Additional Documentation".to_string(),
            Some("evtChallengeScreening") => "Challenge Screening Hit".to_string(),
            Some("evtOverrideRisk") => "Override Risk Assessment".to_string(),
            _ => self.id.clone(),
        }
    }
}

/// A user task from the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTask {
    /// Task id.
    pub task_id: String,
    /// Task name.
    #[serde(default)]
    pub name: Option<String>,
    /// User or role the task is assigned to.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Creation time.
    #[serde(default, with = "time")]
    pub create_time: Option<NaiveDateTime>,
    /// Case the task belongs to.
    #[serde(default)]
    pub case_id: Option<i64>,
    /// Case-engine instance id, for CMMN tasks.
    #[serde(default)]
    pub case_instance_id: Option<String>,
    /// Client of the case.
    #[serde(rename = "clientID", default)]
    pub client_id: Option<i64>,
    /// User who started the process.
    #[serde(default)]
    pub initiator: Option<String>,
    /// Workflow the task belongs to.
    #[serde(default)]
    pub workflow_type: Option<String>,
}

/// A running workflow process or case instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    /// Instance id.
    pub id: String,
    /// Process or case definition key.
    #[serde(default)]
    pub definition_key: Option<String>,
    /// Start time.
    #[serde(default, with = "time")]
    pub start_time: Option<NaiveDateTime>,
    /// Case the instance runs for.
    #[serde(default)]
    pub case_id: Option<i64>,
    /// Client of the case.
    #[serde(rename = "clientID", default)]
    pub client_id: Option<i64>,
    /// User who started it.
    #[serde(default)]
    pub initiator: Option<String>,
}

/// Body of `POST /cases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCase {
    /// Client to review.
    #[serde(rename = "clientID")]
    pub client_id: i64,
    /// Why the case is opened.
    pub reason: String,
    /// First comment.
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn case(status: &str, assigned_to: Option<&str>) -> Case {
        Case {
            case_id: 5,
            client_id: 12,
            client_name: None,
            status: Some(status.to_string()),
            reason: None,
            assigned_to: assigned_to.map(ToString::to_string),
            workflow_type: None,
            instance_id: Some("inst-5".to_string()),
            created_date: None,
        }
    }

    #[test_case("KYC_ANALYST", Some("jdoe"), 0, true; "assigned analyst")]
    #[test_case("AFC_REVIEW", None, 1, true; "open task")]
    #[test_case("AFC_REVIEW", Some("other"), 0, false; "someone else's case")]
    #[test_case("APPROVED", Some("jdoe"), 1, false; "closed case")]
    fn transition_rules(status: &str, assigned: Option<&str>, tasks: usize, expected: bool) {
        assert_eq!(case(status, assigned).can_transition("jdoe", tasks), expected);
    }

    #[test_case("PROCESSING", Some("KYC_ANALYST"))]
    #[test_case("REVIEWER_REVIEW", Some("KYC_REVIEWER"))]
    #[test_case("ACO_REVIEW", Some("ACO_REVIEWER"))]
    #[test_case("APPROVED", None)]
    fn assignee_role_follows_step(status: &str, expected: Option<&str>) {
        assert_eq!(case(status, None).assignee_role(), expected);
    }

    #[test]
    fn stats_buckets() {
        assert!(case("PROCESSING", None).is_pending());
        assert!(case("KYC_ANALYST", None).is_pending());
        assert!(case("ACO_REVIEW", None).is_in_review());
        assert!(!case("APPROVED", None).is_in_review());
        assert!(!case("REJECTED", None).can_assign());
    }

    #[test]
    fn tasks_match_by_case_or_instance() {
        let case = case("KYC_ANALYST", None);
        let task: WorkflowTask =
            serde_json::from_str(r#"{"taskId":"t1","caseInstanceId":"inst-5"}"#).unwrap();
        let other: WorkflowTask =
            serde_json::from_str(r#"{"taskId":"t2","caseId":6}"#).unwrap();
        assert!(case.owns_task(&task));
        assert!(!case.owns_task(&other));
    }

    #[test]
    fn unknown_timeline_status_is_tolerated() {
        let item: TimelineItem =
            serde_json::from_str(r#"{"name":"Review","status":"suspended"}"#).unwrap();
        assert_eq!(item.status, TimelineStatus::Unknown);
    }

    #[test]
    fn action_labels_and_variables() {
        let action: CaseAction = serde_json::from_str(
            r#"{"id":"pi-1","name":"","definitionId":"evtInitiateCommunication"}"#,
        )
        .unwrap();
        assert_eq!(action.label(), "Request Additional Documentation");
        assert_eq!(action.required_variables(), &["requestedInfo", "dueDate"]);
    }
}

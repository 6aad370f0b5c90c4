use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{string_or_number, time};

/// A free-form request one user sends to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdHocTask {
    /// Task id.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// User who sent the task.
    #[serde(default)]
    pub owner: Option<String>,
    /// User the task waits on.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Client the request is about.
    #[serde(rename = "clientID", default)]
    pub client_id: Option<i64>,
    /// The request.
    #[serde(default)]
    pub request_text: Option<String>,
    /// The answer, once given.
    #[serde(default)]
    pub response_text: Option<String>,
    /// `OPEN` or `COMPLETED`.
    #[serde(default)]
    pub status: Option<String>,
    /// When the task was sent.
    #[serde(default, with = "time")]
    pub create_time: Option<NaiveDateTime>,
}

impl AdHocTask {
    /// Tasks waiting on `username`.
    #[must_use]
    pub fn is_inbox_of(&self, username: &str) -> bool {
        self.assignee.as_deref() == Some(username)
    }

    /// Tasks `username` sent to someone else.
    #[must_use]
    pub fn is_sent_by(&self, username: &str) -> bool {
        self.owner.as_deref() == Some(username) && !self.is_inbox_of(username)
    }

    /// True while the task awaits an answer.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status.as_deref() == Some("OPEN")
    }
}

/// Body of `POST /adhoc-tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdHocTask {
    /// User to ask.
    pub assignee: String,
    /// The request.
    pub request_text: String,
    /// Client the request is about.
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_and_sent_are_disjoint() {
        let task: AdHocTask = serde_json::from_str(
            r#"{"id":"t1","owner":"admin","assignee":"analyst","status":"OPEN"}"#,
        )
        .unwrap();

        assert!(task.is_inbox_of("analyst"));
        assert!(!task.is_sent_by("analyst"));
        assert!(task.is_sent_by("admin"));
        assert!(task.is_open());
    }

    #[test]
    fn self_assigned_tasks_are_not_sent() {
        let task: AdHocTask =
            serde_json::from_str(r#"{"id":3,"owner":"admin","assignee":"admin"}"#).unwrap();
        assert_eq!(task.id, "3");
        assert!(!task.is_sent_by("admin"));
    }
}

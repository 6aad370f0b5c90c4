//! Typed records exchanged with the backend.
//!
//! Field names follow the backend's JSON exactly. Unknown fields are ignored
//! and a missing required field fails the decode.

use serde::{Deserialize, Deserializer};

/// Users, audit entries and managed services.
pub mod admin;
/// Batch runs, field mappings and batch clients.
pub mod batch;
/// Cases, their documents, comments and workflow state.
pub mod case;
/// Material changes and their tracking configuration.
pub mod change;
/// Client records and related parties.
pub mod client;
/// Paged listings.
pub mod page;
/// Risk assessments.
pub mod risk;
/// Screening requests and their per-context results.
pub mod screening;
/// Ad-hoc tasks between users.
pub mod task;
pub mod time;

pub use admin::{ManagedService, NewUser, ServiceAction, ServiceState, User, UserAudit};
pub use batch::{BatchId, BatchRun, RiskMapping, ScreeningBatchClient, ScreeningMapping};
pub use case::{
    Case, CaseAction, CaseComment, CaseDocument, CaseEvent, LEGACY_WORKFLOW, NewCase,
    ProcessInstance, TimelineItem, TimelineStatus, Transition, WorkflowTask,
};
pub use change::{ChangeAction, ChangeCategory, MaterialChange, MaterialChangeConfig};
pub use client::{Address, Client, Identifier, NewRelatedParty, RelatedParty};
pub use page::{Page, Pagination};
pub use risk::{RiskAssessment, RiskAssessmentDetail};
pub use screening::{
    ContextResult, ContextStatus, ContextType, ScreeningInitiation, ScreeningLog,
    ScreeningStatus,
};
pub use task::{AdHocTask, NewAdHocTask};

/// Treats `null` like an absent collection.
///
/// The backend masks nested collections as `null` for callers without the
/// administrator role.
pub(crate) fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Integer(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::Text(text) => text,
            StringOrNumber::Integer(n) => n.to_string(),
        }
    }
}

/// Identifiers some services send as numbers and others as strings.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

pub(crate) fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

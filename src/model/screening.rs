use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{string_or_number, time};

/// The four screening lists every request is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextType {
    /// Politically exposed persons.
    #[serde(rename = "PEP")]
    Pep,
    /// Adverse media.
    #[serde(rename = "ADM")]
    AdverseMedia,
    /// Internal watch list.
    #[serde(rename = "INT")]
    Internal,
    /// Sanctions.
    #[serde(rename = "SAN")]
    Sanctions,
    /// A list this client does not know.
    #[serde(untagged)]
    Other(String),
}

impl ContextType {
    /// The contexts shown on the screening panel, in display order.
    pub const PANEL: [Self; 4] = [
        Self::Pep,
        Self::AdverseMedia,
        Self::Internal,
        Self::Sanctions,
    ];

    /// Short code used by the backend.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Pep => "PEP",
            Self::AdverseMedia => "ADM",
            Self::Internal => "INT",
            Self::Sanctions => "SAN",
            Self::Other(code) => code,
        }
    }

    /// Display name.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Pep => "Politically Exposed",
            Self::AdverseMedia => "Adverse Media",
            Self::Internal => "Internal List",
            Self::Sanctions => "Sanctions",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Progress of one screening context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextStatus {
    /// Still being screened.
    InProgress,
    /// At least one alert.
    Hit,
    /// No alerts.
    NoHit,
    /// Any status this client does not know.
    #[serde(other)]
    Unknown,
}

impl ContextStatus {
    /// Backend spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Hit => "HIT",
            Self::NoHit => "NO_HIT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Result of one context within a screening request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextResult {
    /// Screening list.
    pub context_type: ContextType,
    /// Progress on that list.
    pub status: ContextStatus,
    /// Provider message for hits.
    #[serde(default)]
    pub alert_message: Option<String>,
}

impl ContextResult {
    /// A context still being processed.
    #[must_use]
    pub const fn pending(context_type: ContextType) -> Self {
        Self {
            context_type,
            status: ContextStatus::InProgress,
            alert_message: None,
        }
    }
}

/// Reply to `POST /screening/initiate/{clientId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningInitiation {
    /// Id to poll the status with.
    #[serde(deserialize_with = "string_or_number")]
    pub request_id: String,
    /// Set when the provider answered synchronously.
    #[serde(default)]
    pub hit: Option<bool>,
}

/// Reply to `GET /screening/status/{requestId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningStatus {
    /// The polled request.
    #[serde(default, deserialize_with = "super::optional_string_or_number")]
    pub request_id: Option<String>,
    /// One entry per context.
    pub results: Vec<ContextResult>,
}

impl ScreeningStatus {
    /// True while any context is still running.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.status == ContextStatus::InProgress)
    }

    /// True when any context matched.
    #[must_use]
    pub fn any_hit(&self) -> bool {
        self.results.iter().any(|r| r.status == ContextStatus::Hit)
    }
}

/// A historical screening request for a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningLog {
    /// Log id.
    #[serde(rename = "logID", default)]
    pub log_id: Option<i64>,
    /// Screened client.
    #[serde(rename = "clientID", default)]
    pub client_id: Option<i64>,
    /// Final outcome, e.g. `HIT`.
    #[serde(default)]
    pub overall_status: Option<String>,
    /// Request id at the provider.
    #[serde(rename = "externalRequestID", default)]
    pub external_request_id: Option<String>,
    /// When the screening started.
    #[serde(default, with = "time")]
    pub created_at: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_status_with_unknown_context() {
        let status: ScreeningStatus = serde_json::from_str(
            r#"{"requestId":"r-1","results":[
                {"contextType":"PEP","status":"NO_HIT"},
                {"contextType":"SAN","status":"HIT","alertMessage":"OFAC match"},
                {"contextType":"XYZ","status":"IN_PROGRESS"}]}"#,
        )
        .unwrap();

        assert_eq!(status.results[2].context_type, ContextType::Other("XYZ".into()));
        assert!(status.in_progress());
        assert!(status.any_hit());
    }

    #[test]
    fn numeric_request_ids_are_accepted() {
        let initiation: ScreeningInitiation =
            serde_json::from_str(r#"{"requestId":42,"hit":false}"#).unwrap();
        assert_eq!(initiation.request_id, "42");
    }
}

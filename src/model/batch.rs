use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Client, time};

/// Identifier of a batch. The risk service answers with a string, the
/// screening service with a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl<'de> Deserialize<'de> for BatchId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        super::string_or_number(deserializer).map(Self)
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(value: &str) -> Self {
        Self(value.trim_matches('"').to_string())
    }
}

/// One run of a batch pipeline, as recorded by the risk or screening service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRun {
    /// Backend id of the run.
    #[serde(rename = "batchID")]
    pub batch_id: i64,
    /// Display name.
    #[serde(default)]
    pub batch_name: Option<String>,
    /// Pipeline status, e.g. `FILE_GENERATED`.
    #[serde(default)]
    pub run_status: Option<String>,
    /// Whether the provider was notified.
    #[serde(default)]
    pub notification_status: Option<String>,
    /// Number of feedback records received.
    #[serde(default)]
    pub feedback_count: Option<i32>,
    /// Creation time.
    #[serde(default, with = "time")]
    pub created_at: Option<NaiveDateTime>,
    /// Time of the last status change.
    #[serde(default, with = "time")]
    pub updated_at: Option<NaiveDateTime>,
}

/// Maps a client field onto a path of the screening XML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningMapping {
    /// Backend id. Absent for new mappings.
    #[serde(rename = "mappingID", default, skip_serializing_if = "Option::is_none")]
    pub mapping_id: Option<i64>,
    /// XML path the value is written to.
    pub target_path: String,
    /// Client field the value is read from.
    #[serde(default)]
    pub source_field: Option<String>,
    /// Value used when the source is empty.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Named transformation applied to the value.
    #[serde(default)]
    pub transformation: Option<String>,
}

/// Maps a client field onto a path of the risk JSONL record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMapping {
    /// Backend id. Absent for new mappings.
    #[serde(rename = "mappingID", default, skip_serializing_if = "Option::is_none")]
    pub mapping_id: Option<i64>,
    /// JSON path the value is written to.
    pub target_path: String,
    /// Client field the value is read from.
    #[serde(default)]
    pub source_field: Option<String>,
    /// Value used when the source is empty.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Risk factor the value feeds.
    #[serde(default)]
    pub category: Option<String>,
}

impl RiskMapping {
    /// True when the mapping sources a field or supplies a default.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        set(&self.source_field) || set(&self.default_value)
    }
}

/// A client as submitted to the screening batch, with the flattened address
/// and identity fields the screening service expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningBatchClient {
    /// The client record itself.
    #[serde(flatten)]
    pub client: Client,
    /// Address country, else citizenship, else tax country, else `US`.
    pub country: String,
    /// First line of the primary address.
    pub address_line1: Option<String>,
    /// City of the primary address.
    pub city: Option<String>,
    /// Postal code of the primary address.
    pub zip_code: Option<String>,
    /// Address supplement of the primary address, empty when unset.
    pub province: String,
    /// First citizenship.
    pub nationality: Option<String>,
    /// Type of the primary identity document.
    pub leg_doc_type: Option<String>,
    /// Number of the primary identity document.
    pub id_number: Option<String>,
}

impl From<Client> for ScreeningBatchClient {
    fn from(client: Client) -> Self {
        let address = client.primary_address().cloned().unwrap_or_default();
        let identifier = client.primary_identifier().cloned().unwrap_or_default();
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        let country = non_empty(&address.country)
            .or_else(|| non_empty(&client.citizenship1))
            .or_else(|| non_empty(&client.country_of_tax))
            .unwrap_or_else(|| "US".to_string());

        Self {
            country,
            address_line1: address.address_line1,
            city: address.city,
            zip_code: address.zip,
            province: address.address_supplement.unwrap_or_default(),
            nationality: client.citizenship1.clone(),
            leg_doc_type: identifier.identifier_type.clone(),
            id_number: identifier.number().map(ToString::to_string),
            client,
        }
    }
}

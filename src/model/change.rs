use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::time;

/// Which downstream process a material change should trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeCategory {
    /// Re-run the risk assessment.
    Risk,
    /// Re-run screening.
    Screening,
    /// Both of the above.
    Both,
    /// A category this client does not know about; kept verbatim.
    Other(String),
}

impl ChangeCategory {
    /// Backend spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Risk => "RISK",
            Self::Screening => "SCREENING",
            Self::Both => "BOTH",
            Self::Other(value) => value,
        }
    }

    /// True for `RISK` and `BOTH`.
    #[must_use]
    pub const fn triggers_risk(&self) -> bool {
        matches!(self, Self::Risk | Self::Both)
    }

    /// True for `SCREENING` and `BOTH`.
    #[must_use]
    pub const fn triggers_screening(&self) -> bool {
        matches!(self, Self::Screening | Self::Both)
    }
}

impl From<&str> for ChangeCategory {
    fn from(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "RISK" => Self::Risk,
            "SCREENING" => Self::Screening,
            "BOTH" => Self::Both,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl std::str::FromStr for ChangeCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChangeCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChangeCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from(value.as_str()))
    }
}

/// Buttons offered on a material change row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChangeAction {
    /// Trigger a risk re-evaluation.
    Risk,
    /// Trigger a screening.
    Screen,
    /// Mark the change as reviewed.
    Done,
}

impl ChangeAction {
    /// Endpoint suffix under `/clients/changes/{id}/`.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Risk => "trigger-risk",
            Self::Screen => "trigger-screening",
            Self::Done => "review",
        }
    }

    /// Button label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Risk => "Risk",
            Self::Screen => "Screen",
            Self::Done => "Done",
        }
    }
}

/// A tracked modification to a client attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialChange {
    /// Change id.
    #[serde(rename = "changeID")]
    pub change_id: i64,
    /// When the change was recorded.
    #[serde(default, with = "time")]
    pub change_date: Option<NaiveDateTime>,
    /// Client the change belongs to.
    #[serde(rename = "clientID")]
    pub client_id: i64,
    /// Display name of the client.
    #[serde(default)]
    pub client_name: Option<String>,
    /// Id of the changed record.
    #[serde(rename = "entityID", default)]
    pub entity_id: Option<String>,
    /// Table of the changed record.
    #[serde(default)]
    pub entity_name: Option<String>,
    /// Changed column.
    #[serde(default)]
    pub column_name: Option<String>,
    /// `INSERT`, `UPDATE` or `DELETE`.
    #[serde(default)]
    pub operation_type: Option<String>,
    /// Value before the change.
    #[serde(default)]
    pub old_value: Option<String>,
    /// Value after the change.
    #[serde(default)]
    pub new_value: Option<String>,
    /// `PENDING` until reviewed.
    pub status: String,
    /// Which re-evaluation the change calls for.
    pub category: ChangeCategory,
}

impl MaterialChange {
    /// True until the change has been reviewed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == "PENDING"
    }

    /// Actions available on the row.
    ///
    /// Reviewed changes offer nothing. Pending changes offer the triggers
    /// matching their category plus `Done`.
    #[must_use]
    pub fn available_actions(&self) -> Vec<ChangeAction> {
        if !self.is_pending() {
            return Vec::new();
        }
        let mut actions = Vec::with_capacity(3);
        if self.category.triggers_risk() {
            actions.push(ChangeAction::Risk);
        }
        if self.category.triggers_screening() {
            actions.push(ChangeAction::Screen);
        }
        actions.push(ChangeAction::Done);
        actions
    }
}

/// Marks a table column as material and assigns its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialChangeConfig {
    /// Backend id. Absent for new entries.
    #[serde(rename = "configID", default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<i64>,
    /// Tracked table.
    pub entity_name: String,
    /// Tracked column.
    pub column_name: String,
    /// Category assigned to changes of the column.
    pub category: ChangeCategory,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn change(status: &str, category: &str) -> MaterialChange {
        serde_json::from_value(serde_json::json!({
            "changeID": 1,
            "clientID": 2,
            "status": status,
            "category": category,
        }))
        .unwrap()
    }

    #[test_case("PENDING", "RISK", &[ChangeAction::Risk, ChangeAction::Done]; "risk only")]
    #[test_case("PENDING", "SCREENING", &[ChangeAction::Screen, ChangeAction::Done]; "screening only")]
    #[test_case("PENDING", "BOTH", &[ChangeAction::Risk, ChangeAction::Screen, ChangeAction::Done]; "both")]
    #[test_case("PENDING", "COSMETIC", &[ChangeAction::Done]; "unknown category")]
    #[test_case("REVIEWED", "BOTH", &[]; "reviewed changes are inert")]
    fn actions_follow_category_and_status(status: &str, category: &str, expected: &[ChangeAction]) {
        assert_eq!(change(status, category).available_actions(), expected);
    }

    #[test]
    fn unknown_category_round_trips() {
        let change = change("PENDING", "COSMETIC");
        assert_eq!(change.category, ChangeCategory::Other("COSMETIC".into()));
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["category"], "COSMETIC");
    }
}

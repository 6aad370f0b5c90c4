use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::time;

/// Result of one risk evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Assessment id.
    #[serde(rename = "assessmentID")]
    pub assessment_id: i64,
    /// Aggregated score.
    #[serde(default)]
    pub overall_risk_score: Option<f64>,
    /// Level derived from the score, e.g. `HIGH`.
    #[serde(default)]
    pub overall_risk_level: Option<String>,
    /// Scoring logic that produced the result.
    #[serde(default)]
    pub type_of_logic_applied: Option<String>,
    /// Evaluation time.
    #[serde(default, with = "time")]
    pub created_at: Option<NaiveDateTime>,
}

/// Contribution of a single element to an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentDetail {
    /// Detail id.
    #[serde(rename = "detailID", default)]
    pub detail_id: Option<i64>,
    /// Assessment the detail belongs to.
    #[serde(rename = "assessmentID", default)]
    pub assessment_id: Option<i64>,
    /// Risk factor.
    #[serde(default)]
    pub risk_type: Option<String>,
    /// Client attribute that was scored.
    #[serde(default)]
    pub element_name: Option<String>,
    /// Its value.
    #[serde(default)]
    pub element_value: Option<String>,
    /// Score contributed.
    #[serde(default)]
    pub risk_score: Option<f64>,
    /// Flag raised, if any.
    #[serde(default)]
    pub flag: Option<String>,
    /// Local rule that overrode the score.
    #[serde(default)]
    pub local_rule_applied: Option<String>,
}

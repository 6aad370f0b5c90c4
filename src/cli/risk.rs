//! Risk panel: evaluation, history and per-factor details.

use kyc_console::{
    Permission,
    model::{RiskAssessment, RiskAssessmentDetail},
    notify::Notifier,
};
use tracing::instrument;

use super::{
    Context,
    changes::format_timestamp,
    terminal::{self, Colorize, Table, or_dash},
};

/// Evaluate and inspect client risk
#[derive(Debug, clap::Parser)]
pub struct Risk {
    #[command(subcommand)]
    command: RiskCommand,
}

#[derive(Debug, clap::Subcommand)]
enum RiskCommand {
    /// Run a new risk evaluation for a client
    Evaluate {
        /// Client id
        client_id: String,
    },

    /// List a client's risk assessments, newest first
    History {
        /// Client id
        client_id: i64,
    },

    /// Show the factors that made up one assessment
    Details {
        /// Assessment id
        assessment_id: i64,
    },
}

impl Risk {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        match self.command {
            RiskCommand::Evaluate { client_id } => {
                ctx.require(Permission::ManageRisk).await?;
                match ctx.api.risk().evaluate(&client_id).await {
                    Ok(_) => ctx.notifier.success("Risk evaluation triggered"),
                    Err(e) => {
                        ctx.notifier.error(&format!("Risk evaluation failed: {e}"));
                        return Err(e.into());
                    }
                }
                if let Ok(id) = client_id.trim().parse::<i64>() {
                    let history = ctx.api.risk().history(id).await?;
                    ctx.render(&history, |history| assessment_table(history).print(""))?;
                }
                Ok(())
            }
            RiskCommand::History { client_id } => {
                ctx.require(Permission::ViewClients).await?;
                let history = ctx.api.risk().history(client_id).await?;
                ctx.render(&history, |history| {
                    assessment_table(history).print("Not assessed yet.");
                })
            }
            RiskCommand::Details { assessment_id } => {
                ctx.require(Permission::ViewClients).await?;
                let details = ctx.api.risk().details(assessment_id).await?;
                ctx.render(&details, |details| print_details(details))
            }
        }
    }
}

pub fn assessment_table(history: &[RiskAssessment]) -> Table {
    let mut table = Table::new(vec!["ID", "Level", "Score", "Logic", "Assessed"]);
    for assessment in history {
        table.row(vec![
            assessment.assessment_id.to_string(),
            assessment
                .overall_risk_level
                .as_deref()
                .map_or_else(|| "-".to_string(), level),
            or_dash(assessment.overall_risk_score.map(|s| format!("{s:.1}"))),
            or_dash(assessment.type_of_logic_applied.as_deref()),
            or_dash(assessment.created_at.as_ref().map(format_timestamp)),
        ]);
    }
    table
}

fn level(value: &str) -> String {
    match value.to_ascii_uppercase().as_str() {
        "LOW" => value.success(),
        "MEDIUM" => value.warning(),
        "HIGH" | "CRITICAL" => value.danger(),
        _ => terminal::status(value),
    }
}

fn print_details(details: &[RiskAssessmentDetail]) {
    let mut table = Table::new(vec!["Type", "Element", "Value", "Score", "Flag", "Rule"]);
    for detail in details {
        table.row(vec![
            or_dash(detail.risk_type.as_deref()),
            or_dash(detail.element_name.as_deref()),
            or_dash(detail.element_value.as_deref()),
            or_dash(detail.risk_score.map(|s| format!("{s:.1}"))),
            or_dash(detail.flag.as_deref()),
            or_dash(detail.local_rule_applied.as_deref()),
        ]);
    }
    table.print("No factors recorded for this assessment.");
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scores_are_rounded_to_one_decimal() {
        let history: Vec<RiskAssessment> = serde_json::from_value(json!([
            {"assessmentID": 5, "overallRiskScore": 42.26, "typeOfLogicApplied": "OVERALL"}
        ]))
        .unwrap();

        let lines = assessment_table(&history).render(true);

        assert!(lines.contains(&"Score: 42.3".to_string()));
        assert!(lines.contains(&"Level: -".to_string()));
    }
}

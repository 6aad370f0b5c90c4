use std::path::PathBuf;

use anyhow::Context as _;
use kyc_console::Permission;
use serde_json::{Map, Value};
use tracing::instrument;

use super::{Context, terminal::Colorize};

/// Case questionnaires
#[derive(Debug, clap::Parser)]
pub struct Questionnaire {
    #[command(subcommand)]
    command: QuestionnaireCommand,
}

#[derive(Debug, clap::Subcommand)]
enum QuestionnaireCommand {
    /// Print the questionnaire template
    Template,

    /// Print the answers recorded for a case
    Show {
        /// Case id
        case_id: i64,
    },

    /// Replace the answers of a case with the contents of a JSON file
    Save {
        /// Case id
        case_id: i64,

        /// JSON document holding the answers
        file: PathBuf,
    },

    /// Set individual answers, keeping the others
    Answer {
        /// Case id
        case_id: i64,

        /// Answers as QUESTION=VALUE
        #[arg(required = true, value_parser = super::cases::parse_variable)]
        answers: Vec<(String, String)>,
    },
}

impl Questionnaire {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        ctx.require(Permission::ManageCases).await?;
        let questionnaires = ctx.api.questionnaires();

        match self.command {
            QuestionnaireCommand::Template => Context::print_json(&questionnaires.template().await?),
            QuestionnaireCommand::Show { case_id } => {
                Context::print_json(&questionnaires.responses(case_id).await?)
            }
            QuestionnaireCommand::Save { case_id, file } => {
                let text = std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?;
                let answers: Value = serde_json::from_str(&text)
                    .with_context(|| format!("{} is not valid JSON", file.display()))?;
                questionnaires.save(case_id, &answers).await?;
                println!("{}", "Questionnaire saved".success());
                Ok(())
            }
            QuestionnaireCommand::Answer { case_id, answers } => {
                let current = questionnaires.responses(case_id).await?;
                let merged = merge_answers(current, answers);
                questionnaires.save(case_id, &merged).await?;
                println!("{}", "Questionnaire saved".success());
                Context::print_json(&merged)
            }
        }
    }
}

/// Overlays `answers` on the recorded object. Values that parse as JSON keep
/// their type, anything else is stored as a string.
fn merge_answers(current: Value, answers: Vec<(String, String)>) -> Value {
    let mut object = match current {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    for (question, answer) in answers {
        let value = serde_json::from_str(&answer).unwrap_or(Value::String(answer));
        object.insert(question, value);
    }
    Value::Object(object)
}

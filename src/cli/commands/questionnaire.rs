use anyhow::{anyhow, Result};

use super::{settle, Session};
use crate::fhir::{render_fields, AnswerSet, InputKind, QuestionItem};
use crate::launch::LaunchContext;
use crate::store::keys;
use crate::workflow::WorkflowError;

pub struct QuestionnaireCommand {
    pub launch_url: Option<String>,
    pub coverage_id: Option<String>,
    pub medication_request_id: Option<String>,
}

impl QuestionnaireCommand {
    pub fn new(
        launch_url: Option<String>,
        coverage_id: Option<String>,
        medication_request_id: Option<String>,
    ) -> Self {
        Self {
            launch_url,
            coverage_id,
            medication_request_id,
        }
    }

    fn launch_context(&self, session: &Session) -> Result<LaunchContext> {
        let store = session.store.as_ref();
        if let Some(url) = &self.launch_url {
            LaunchContext::from_query(url, store)?;
        }
        if let Some(coverage_id) = &self.coverage_id {
            store.set_string(keys::COVERAGE_ID, coverage_id);
        }
        if let Some(order_id) = &self.medication_request_id {
            store.set_string(keys::MEDICATION_REQUEST_ID, order_id);
        }
        Ok(LaunchContext::from_store(store))
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let launch = self.launch_context(session)?;
        println!(
            "📋 Fetching questionnaire package (coverage {}, order {})...",
            launch.coverage_id.as_deref().unwrap_or("?"),
            launch.medication_request_id.as_deref().unwrap_or("?")
        );

        let mut orchestrator = session.orchestrator();
        let result = orchestrator.fetch_questionnaire_package(&launch).await;
        session.print_notifications();
        let outcome = result?;
        settle(&outcome)?;

        if let Some(questionnaire) = orchestrator.questionnaire() {
            println!();
            print_questions(&questionnaire.items);
        }
        Ok(())
    }
}

pub struct AnswerCommand {
    pub answers: Vec<String>,
}

impl AnswerCommand {
    pub fn new(answers: Vec<String>) -> Self {
        Self { answers }
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let mut orchestrator = session.orchestrator();
        let questionnaire = orchestrator
            .questionnaire()
            .ok_or(WorkflowError::MissingArtifact("questionnaire package"))?;

        if self.answers.is_empty() {
            print_questions(&questionnaire.items);
            return Ok(());
        }

        let pairs = self
            .answers
            .iter()
            .map(|raw| {
                raw.split_once('=')
                    .map(|(link_id, value)| (link_id.trim(), value.trim()))
                    .ok_or_else(|| anyhow!("Answer '{raw}' must look like LINK_ID=VALUE"))
            })
            .collect::<Result<Vec<_>>>()?;
        let answers = AnswerSet::from_pairs(&questionnaire.items, pairs)?;

        println!("✍️  Submitting {} answers...", answers.len());
        let result = orchestrator.submit_questionnaire_response(&answers).await;
        session.print_notifications();
        settle(&result?)?;

        println!();
        println!("💡 Next: prior-auth-flow claim");
        Ok(())
    }
}

fn print_questions(items: &[QuestionItem]) {
    if items.is_empty() {
        println!("📋 The questionnaire has no questions");
        return;
    }
    println!("❓ Questions:");
    for field in render_fields(items) {
        let hint = match field.input {
            InputKind::YesNoSelect => "yes/no",
            InputKind::NumericInput => "number",
            InputKind::TextInput => "text",
        };
        println!("   [{}] {} ({hint})", field.link_id, field.label);
    }
    println!();
    println!("💡 Answer with: prior-auth-flow answer --answer <LINK_ID>=<VALUE> ...");
}

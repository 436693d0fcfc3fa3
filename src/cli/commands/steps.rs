use anyhow::{anyhow, bail, Result};
use std::time::Duration;

use super::{print_json, Session};
use crate::workflow::StepStatus;

pub struct StepsCommand;

impl StepsCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, session: &Session) -> Result<()> {
        let orchestrator = session.orchestrator();
        if !orchestrator.is_active() {
            println!("📋 No prior-authorization run in progress");
            println!("   💡 Start one with: prior-auth-flow start --patient-id <ID>");
            return Ok(());
        }

        let patient = session
            .store
            .get_string(crate::store::keys::SELECTED_PATIENT_NAME)
            .unwrap_or_default();
        println!("📊 Prior authorization for {patient} ({})", orchestrator.phase());
        println!();

        let active = orchestrator.tracker().active_index();
        for (i, step) in orchestrator.tracker().steps().iter().enumerate() {
            let icon = match step.status {
                StepStatus::Completed => "✅",
                StepStatus::InProgress => "🔄",
                StepStatus::NotStarted => "⏳",
            };
            let marker = if active == Some(i) { "👉" } else { "  " };
            println!("{marker} {}. {icon} {} ({})", i + 1, step.name, step.status);
        }
        Ok(())
    }
}

impl Default for StepsCommand {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ReplayCommand {
    /// 1-based step number
    pub step: usize,
}

impl ReplayCommand {
    pub fn new(step: usize) -> Self {
        Self { step }
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let index = self
            .step
            .checked_sub(1)
            .ok_or_else(|| anyhow!("Step numbers start at 1"))?;

        let mut navigator = session.navigator();
        let view = navigator.select(index).await?;

        println!("🔁 Step {}: {} ({})", view.index + 1, view.step.name, view.step.status);
        if !view.record.request_url.is_empty() {
            println!("   {} {}", view.record.request_method, view.record.request_url);
        }
        if let Some(hook) = &view.cds_hook {
            println!("   🪝 Hook: {hook}");
        }
        println!();
        println!("📤 Request:");
        print_json(&view.record.request_body);
        println!();
        println!("📥 Response:");
        print_json(&view.record.response_body);
        Ok(())
    }
}

pub struct WatchResponseCommand {
    pub interval: Option<Duration>,
    pub timeout: Duration,
}

impl WatchResponseCommand {
    pub fn new(interval: Option<Duration>, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let interval = self
            .interval
            .unwrap_or_else(|| session.config.workflow.poll_interval());
        println!(
            "👀 Waiting for questionnaire answers (every {}s, up to {}s)...",
            interval.as_secs(),
            self.timeout.as_secs()
        );

        let navigator = session.navigator();
        let Some(response) = navigator
            .watch_questionnaire_response(interval)
            .wait_for(self.timeout)
            .await
        else {
            bail!("No questionnaire answers showed up within {}s", self.timeout.as_secs());
        };

        println!("✅ Questionnaire answers received");
        print_json(&response);
        println!();
        println!("💡 Next: prior-auth-flow claim");
        Ok(())
    }
}

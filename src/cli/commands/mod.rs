use anyhow::{anyhow, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::claims::ClaimsClient;
use crate::config::PriorAuthFlowConfig;
use crate::export::BulkExportClient;
use crate::http::{FhirClient, FhirGateway};
use crate::navigator::{NavigatorSettings, StepNavigator};
use crate::notifications::{Notifier, Severity};
use crate::store::{FileStore, WorkflowStore};
use crate::workflow::{OrchestratorSettings, PriorAuthOrchestrator, StepOutcome};

pub mod claim;
pub mod claims;
pub mod export;
pub mod order;
pub mod payer;
pub mod questionnaire;
pub mod reset;
pub mod start;
pub mod steps;

/// Everything one invocation needs: the persisted run and a gateway to the payer.
///
/// Each invocation restores the run from the state file, the way a page load
/// restores it from browser storage.
pub struct Session {
    pub config: PriorAuthFlowConfig,
    pub store: Arc<dyn WorkflowStore>,
    pub gateway: Arc<dyn FhirGateway>,
    pub notifier: Notifier,
}

impl Session {
    pub fn open(config: &PriorAuthFlowConfig, state_file: Option<PathBuf>) -> Result<Self> {
        let path = state_file.unwrap_or_else(|| PathBuf::from(&config.storage.state_file_path));
        let store = FileStore::open(&path)?;
        let gateway = FhirClient::new(&config.fhir)?;
        Ok(Self::new(config.clone(), Arc::new(store), Arc::new(gateway)))
    }

    pub fn new(
        config: PriorAuthFlowConfig,
        store: Arc<dyn WorkflowStore>,
        gateway: Arc<dyn FhirGateway>,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
            notifier: Notifier::new(),
        }
    }

    pub fn orchestrator(&self) -> PriorAuthOrchestrator {
        PriorAuthOrchestrator::restore(
            self.store.clone(),
            self.gateway.clone(),
            OrchestratorSettings::from_config(&self.config),
            self.notifier.clone(),
        )
    }

    pub fn navigator(&self) -> StepNavigator {
        StepNavigator::new(
            self.store.clone(),
            self.gateway.clone(),
            NavigatorSettings::from_config(&self.config),
        )
    }

    pub fn export_client(&self) -> BulkExportClient {
        BulkExportClient::new(
            self.gateway.clone(),
            self.store.clone(),
            self.config.fhir.endpoints.clone(),
        )
    }

    pub fn claims_client(&self) -> ClaimsClient {
        ClaimsClient::new(self.gateway.clone(), &self.config.fhir)
    }

    /// Print and clear the alerts raised so far
    pub fn print_notifications(&self) {
        for notification in self.notifier.drain() {
            let icon = match (notification.severity, notification.celebrate) {
                (_, true) => "🎉",
                (Severity::Success, _) => "✅",
                (Severity::Info, _) => "ℹ️ ",
                (Severity::Warning, _) => "⚠️ ",
                (Severity::Error, _) => "❌",
            };
            println!("{icon} {}", notification.message);
        }
    }
}

/// Print a step outcome; a failed step becomes the command's error
pub fn settle(outcome: &StepOutcome) -> Result<()> {
    match outcome {
        StepOutcome::Completed { step, response } => {
            println!();
            println!("📦 {step} response:");
            print_json(response);
            Ok(())
        }
        StepOutcome::Failed { step, error } => {
            println!();
            println!("📦 Error payload stored for '{step}':");
            print_json(&error.payload());
            println!("   💡 Fix the cause and run the step again");
            Err(anyhow!("{step} failed: {error}"))
        }
        StepOutcome::Discarded { step } => {
            println!("⚠️  {step} finished after the run was restarted; its response was dropped");
            Ok(())
        }
    }
}

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            for line in text.lines() {
                println!("   {line}");
            }
        }
        Err(_) => println!("   {value}"),
    }
}

pub fn show_how_to_get_started() -> Result<()> {
    println!("💊 prior-auth-flow - Medication prior authorization");
    println!();
    println!("Run the steps in order:");
    println!("  🧑 prior-auth-flow start --patient-id <ID>   # Begin a run for a patient");
    println!("  📝 prior-auth-flow order ...                 # Create the medication order");
    println!("  🏥 prior-auth-flow check-payer               # Ask whether authorization is needed");
    println!("  📋 prior-auth-flow questionnaire             # Fetch the payer's questionnaire");
    println!("  ✍️  prior-auth-flow answer --answer 1=true    # Answer it");
    println!("  📨 prior-auth-flow claim                     # Submit the claim");
    println!();
    println!("Review and housekeeping:");
    println!("  📊 prior-auth-flow steps                     # Show step progress");
    println!("  🔁 prior-auth-flow replay <N>                # Show a step's request and response");
    println!("  🔄 prior-auth-flow restart                   # Switch patient");
    println!();
    println!("Follow up on submitted authorizations:");
    println!("  🗂️  prior-auth-flow claims                    # List prior authorizations");
    println!("  🔎 prior-auth-flow claim-view <ID>           # Show one claim");
    println!();
    println!("💡 Start with 'prior-auth-flow start --patient-id <ID>'");
    Ok(())
}

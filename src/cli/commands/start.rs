use anyhow::Result;

use super::Session;
use crate::fhir::PatientSummary;

pub struct StartCommand {
    pub patient_id: String,
    pub name: Option<String>,
}

impl StartCommand {
    pub fn new(patient_id: String) -> Self {
        Self {
            patient_id,
            name: None,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let mut orchestrator = session.orchestrator();

        let patient = match &self.name {
            Some(name) => PatientSummary {
                id: self.patient_id.clone(),
                display_name: name.clone(),
            },
            None => {
                println!("🔎 Looking up patient {}...", self.patient_id);
                orchestrator.lookup_patient(&self.patient_id).await
            }
        };

        if orchestrator.is_active() {
            println!("🔄 Replacing the run in progress");
        }
        orchestrator.start(&patient);
        session.print_notifications();

        println!();
        println!("🧑 Patient: {} ({})", patient.display_name, patient.id);
        for (i, step) in orchestrator.tracker().steps().iter().enumerate() {
            println!("   {}. {}", i + 1, step.name);
        }
        println!();
        println!("💡 Next: prior-auth-flow order --treating-sickness ... --medication ...");
        Ok(())
    }
}

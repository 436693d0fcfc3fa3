use anyhow::Result;

use super::{settle, Session};
use crate::fhir::resources::find_medication;
use crate::fhir::{MedicationOrderForm, MEDICATION_OPTIONS};

pub struct OrderCommand {
    pub form: MedicationOrderForm,
}

impl OrderCommand {
    pub fn new(form: MedicationOrderForm) -> Self {
        Self { form }
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        if find_medication(&self.form.medication).is_none() {
            let known: Vec<&str> = MEDICATION_OPTIONS.iter().map(|m| m.name).collect();
            println!("⚠️  '{}' is not in the formulary ({})", self.form.medication, known.join(", "));
        }

        println!("📝 Creating medication order...");
        let mut orchestrator = session.orchestrator();
        let result = orchestrator.create_medication_order(&self.form).await;
        session.print_notifications();
        settle(&result?)?;

        println!();
        println!("💡 Next: prior-auth-flow check-payer");
        Ok(())
    }
}

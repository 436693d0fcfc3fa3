use anyhow::Result;

use super::{settle, Session};
use crate::fhir::ClaimForm;
use crate::workflow::WorkflowError;

/// Values replacing the pre-filled claim fields
#[derive(Debug, Clone, Default)]
pub struct ClaimOverrides {
    pub unit_price: Option<String>,
    pub quantity: Option<u32>,
    pub provider: Option<String>,
    pub insurer: Option<String>,
    pub supporting_info: Option<String>,
}

impl ClaimOverrides {
    pub fn apply(&self, form: &mut ClaimForm) {
        if let Some(price) = &self.unit_price {
            form.unit_price = price.clone();
        }
        if let Some(quantity) = self.quantity {
            form.quantity = quantity;
        }
        if let Some(provider) = &self.provider {
            form.provider = provider.clone();
        }
        if let Some(insurer) = &self.insurer {
            form.insurer = insurer.clone();
        }
        if let Some(info) = &self.supporting_info {
            form.supporting_info = info.clone();
        }
    }
}

pub struct ClaimCommand {
    pub overrides: ClaimOverrides,
}

impl ClaimCommand {
    pub fn new(overrides: ClaimOverrides) -> Self {
        Self { overrides }
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let mut orchestrator = session.orchestrator();
        let mut form = orchestrator.prefilled_claim().ok_or(WorkflowError::NoActiveRun)?;
        self.overrides.apply(&mut form);

        println!("📨 Submitting claim...");
        println!("   🧑 {}  💊 {} x{}  💵 {}", form.patient, form.medication, form.quantity, form.unit_price);
        println!("   🏢 {} -> {}", form.provider, form.insurer);

        let result = orchestrator.submit_claim(&form).await;
        session.print_notifications();
        settle(&result?)?;

        println!();
        println!("💡 Review any step with: prior-auth-flow replay <N>");
        Ok(())
    }
}

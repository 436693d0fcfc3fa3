use anyhow::Result;

use super::Session;
use crate::claims::AuthStatus;

pub struct ClaimsCommand;

impl ClaimsCommand {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        println!("🗂️  Prior authorizations");
        let claims = session.claims_client().list().await?;
        if claims.is_empty() {
            println!("   No prior authorizations found.");
            return Ok(());
        }

        println!();
        for claim in &claims {
            let status = claim.auth_status();
            let icon = match status {
                AuthStatus::Completed => "✅",
                AuthStatus::Pending => "⏳",
                AuthStatus::Error => "❌",
                AuthStatus::Other(_) => "❔",
            };
            println!(
                "{icon} {}  {}  💊 {}  📅 {}  ({status})",
                claim.id, claim.patient_name, claim.medication_ref, claim.date
            );
        }
        println!();
        println!("💡 Show one with: prior-auth-flow claim-view <ID>");
        Ok(())
    }
}

impl Default for ClaimsCommand {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ClaimViewCommand {
    pub id: String,
}

impl ClaimViewCommand {
    pub fn new(id: String) -> Self {
        Self { id }
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let details = session.claims_client().view(&self.id).await?;

        println!("🔎 Claim {}", details.id);
        println!("   🧑 Patient:         {}", details.patient);
        println!("   🩺 Practitioner:    {}", details.provider);
        println!("   🏢 Insurer:         {}", details.insurer);
        println!("   🏷️  Category:        {}", details.category);
        println!("   📌 Use:             {}", details.use_);
        println!("   💊 Product/Service: {}", details.medication);
        println!("   🔢 Quantity:        {}", details.quantity);
        println!("   💵 Unit price:      {}", details.unit_price);
        Ok(())
    }
}

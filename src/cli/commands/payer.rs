use anyhow::Result;

use super::{settle, Session};

pub struct CheckPayerCommand;

impl CheckPayerCommand {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        println!("🏥 Checking payer requirements...");
        let mut orchestrator = session.orchestrator();
        let result = orchestrator.check_payer_requirements().await;
        session.print_notifications();
        let outcome = result?;

        if outcome.is_completed() {
            let cards = orchestrator.cds_cards();
            println!();
            if cards.is_empty() {
                println!("📋 The payer returned no cards");
            }
            for card in &cards {
                println!("🃏 [{}] {}", card.indicator, card.summary);
                if let Some(detail) = card.detail.as_deref().filter(|d| !d.is_empty()) {
                    println!("   {detail}");
                }
                for link in &card.links {
                    println!("   🔗 {}: {}", link.label, link.url);
                }
            }
        }
        settle(&outcome)?;

        println!();
        println!("💡 Next: prior-auth-flow questionnaire --coverage-id <ID>");
        Ok(())
    }
}

impl Default for CheckPayerCommand {
    fn default() -> Self {
        Self::new()
    }
}

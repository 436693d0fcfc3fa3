use anyhow::Result;

use super::Session;

pub struct RestartCommand;

impl RestartCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, session: &Session) -> Result<()> {
        let mut orchestrator = session.orchestrator();
        let patient = orchestrator.patient_id();
        orchestrator.restart();

        match patient {
            Some(id) => println!("🔄 Discarded the run for patient {id}"),
            None => println!("🔄 No run in progress; nothing to discard"),
        }
        println!("   💡 Start again with: prior-auth-flow start --patient-id <ID>");
        Ok(())
    }
}

impl Default for RestartCommand {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LogoutCommand;

impl LogoutCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, session: &Session) -> Result<()> {
        session.orchestrator().logout();
        println!("👋 Session cleared");
        Ok(())
    }
}

impl Default for LogoutCommand {
    fn default() -> Self {
        Self::new()
    }
}

use anyhow::{bail, Result};
use std::time::Duration;

use super::Session;

pub struct ExportCommand {
    pub member_id: String,
    pub resource_type: String,
    pub wait: bool,
    pub timeout: Duration,
}

impl ExportCommand {
    pub fn new(member_id: String, resource_type: String) -> Self {
        Self {
            member_id,
            resource_type,
            wait: true,
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_wait(mut self, wait: bool, timeout: Duration) -> Self {
        self.wait = wait;
        self.timeout = timeout;
        self
    }

    pub async fn execute(&self, session: &Session) -> Result<()> {
        let client = session.export_client();

        println!("📦 Starting bulk export for member {}...", self.member_id);
        let export_id = client.kick_off(&self.member_id).await?;
        println!("   🆔 Export ID: {export_id}");

        if !self.wait {
            println!("   💡 The export keeps running on the server; the id is saved in the state file");
            return Ok(());
        }

        let interval = session.config.workflow.poll_interval();
        println!("⏳ Waiting for the export to finish (every {}s)...", interval.as_secs());
        if client
            .watch_until_downloaded(&export_id, interval)
            .wait_for(self.timeout)
            .await
            .is_none()
        {
            bail!("Export {export_id} did not finish within {}s", self.timeout.as_secs());
        }

        let rows = client.fetch(&export_id, &self.resource_type).await?;
        println!("✅ Export downloaded: {} {} resources", rows.len(), self.resource_type);
        for row in &rows {
            let id = row.get("id").and_then(|v| v.as_str()).unwrap_or("-");
            let status = row.get("status").and_then(|v| v.as_str()).unwrap_or("-");
            println!("   📄 {id} ({status})");
        }
        Ok(())
    }
}

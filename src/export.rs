// Bulk export of a member's data: kick-off, status polling and NDJSON fetch

use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EndpointConfig;
use crate::http::{FhirError, FhirGateway};
use crate::polling::{PollStatus, ScopedPoller};
use crate::store::{keys, WorkflowStore};

pub const DOWNLOADED: &str = "Downloaded";

static EXPORT_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"ExportId:\s([\w-]+)").ok());

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Fhir(#[from] FhirError),

    #[error("Export ID not found in kick-off diagnostics")]
    MissingExportId,

    #[error("No export has been started")]
    NoExport,
}

/// Export id embedded in `issue[0].diagnostics` of the kick-off OperationOutcome
pub fn extract_export_id(body: &Value) -> Option<String> {
    let diagnostics = body.pointer("/issue/0/diagnostics")?.as_str()?;
    let pattern = EXPORT_ID_PATTERN.as_ref()?;
    pattern
        .captures(diagnostics)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse newline-delimited JSON, skipping lines that are not JSON
pub fn parse_ndjson(body: &Value) -> Vec<Value> {
    match body {
        Value::String(text) => text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect(),
        Value::Array(rows) => rows.clone(),
        other => vec![other.clone()],
    }
}

pub struct BulkExportClient {
    gateway: Arc<dyn FhirGateway>,
    store: Arc<dyn WorkflowStore>,
    endpoints: EndpointConfig,
}

impl BulkExportClient {
    pub fn new(
        gateway: Arc<dyn FhirGateway>,
        store: Arc<dyn WorkflowStore>,
        endpoints: EndpointConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            endpoints,
        }
    }

    /// Start an export for `member_id` and remember its id
    pub async fn kick_off(&self, member_id: &str) -> Result<String, ExportError> {
        let payload = json!([{ "id": member_id }]);
        let response = self.gateway.post(&self.endpoints.bulk_export, &payload).await?;

        let export_id = extract_export_id(&response).ok_or_else(|| {
            warn!(response = %response, "Export ID not found in diagnostics message");
            ExportError::MissingExportId
        })?;

        self.store.set_string(keys::EXPORT_ID, &export_id);
        info!(export_id = %export_id, "Bulk export started");
        Ok(export_id)
    }

    pub fn last_export_id(&self) -> Option<String> {
        self.store.get_string(keys::EXPORT_ID)
    }

    pub async fn status(&self, export_id: &str) -> Result<String, ExportError> {
        fetch_status(self.gateway.as_ref(), &self.endpoints.export_status, export_id).await
    }

    /// Poll the export status until it reads `Downloaded`
    pub fn watch_until_downloaded(&self, export_id: &str, interval: Duration) -> ScopedPoller<String> {
        let gateway = self.gateway.clone();
        let path = self.endpoints.export_status.clone();
        let export_id = export_id.to_string();

        ScopedPoller::spawn("bulk-export-status", interval, move || {
            let gateway = gateway.clone();
            let path = path.clone();
            let export_id = export_id.clone();
            async move {
                match fetch_status(gateway.as_ref(), &path, &export_id).await {
                    Ok(status) if status == DOWNLOADED => PollStatus::Ready(status),
                    Ok(status) => {
                        debug!(export_id = %export_id, status = %status, "Export not ready");
                        PollStatus::Pending
                    }
                    Err(e) => {
                        warn!(export_id = %export_id, error = %e, "Error checking export status");
                        PollStatus::Pending
                    }
                }
            }
        })
    }

    /// Exported resources of one type
    pub async fn fetch(&self, export_id: &str, resource_type: &str) -> Result<Vec<Value>, ExportError> {
        let query = vec![
            ("exportId".to_string(), export_id.to_string()),
            ("resourceType".to_string(), resource_type.to_string()),
        ];
        let body = self.gateway.get(&self.endpoints.export_fetch, &query).await?;
        let rows = parse_ndjson(&body);
        info!(export_id = %export_id, resource_type = %resource_type, rows = rows.len(), "Fetched exported data");
        Ok(rows)
    }
}

async fn fetch_status(
    gateway: &dyn FhirGateway,
    path: &str,
    export_id: &str,
) -> Result<String, ExportError> {
    let query = vec![("exportId".to_string(), export_id.to_string())];
    let body = gateway.get(path, &query).await?;
    Ok(body
        .get("lastStatus")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

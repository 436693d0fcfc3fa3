// Follow-up on submitted prior authorizations: the webhook server's claim list
// and single Claim resources

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::FhirConfig;
use crate::http::{FhirError, FhirGateway};

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error(transparent)]
    Fhir(#[from] FhirError),

    #[error("Unexpected claim list from the webhook server: {0}")]
    MalformedList(String),
}

/// One prior authorization as tracked by the webhook server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorAuthSummary {
    pub id: String,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub provider_name: String,
    #[serde(default)]
    pub medication_ref: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub outcome: String,
}

impl PriorAuthSummary {
    pub fn auth_status(&self) -> AuthStatus {
        AuthStatus::from_outcome(&self.outcome)
    }
}

/// Display status derived from a ClaimResponse outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Completed,
    Pending,
    Error,
    Other(String),
}

impl AuthStatus {
    pub fn from_outcome(outcome: &str) -> Self {
        match outcome.to_lowercase().as_str() {
            "complete" => AuthStatus::Completed,
            "partial" | "queued" => AuthStatus::Pending,
            "error" => AuthStatus::Error,
            _ => AuthStatus::Other(outcome.to_string()),
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStatus::Completed => f.write_str("Completed"),
            AuthStatus::Pending => f.write_str("Pending"),
            AuthStatus::Error => f.write_str("Error"),
            AuthStatus::Other(outcome) => f.write_str(outcome),
        }
    }
}

/// Read-only view of a submitted Claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimDetails {
    pub id: String,
    pub patient: String,
    pub provider: String,
    pub insurer: String,
    pub category: String,
    pub use_: String,
    pub medication: String,
    pub quantity: String,
    pub unit_price: String,
}

impl ClaimDetails {
    /// Missing fields read as "Unknown"; the category defaults to Pharmacy
    pub fn from_resource(id: &str, claim: &Value) -> Self {
        let item = claim.pointer("/item/0");
        let product = item.and_then(|i| i.get("productOrService"));

        let medication = [
            "/coding/0/display",
            "/concept/coding/0/display",
            "/reference",
            "/text",
        ]
        .iter()
        .find_map(|pointer| product.and_then(|p| text_at(p, pointer)));

        let unit_price = item.and_then(|i| i.get("unitPrice")).and_then(|price| {
            let value = text_at(price, "/value")?;
            let currency = text_at(price, "/currency").unwrap_or_else(|| "USD".to_string());
            Some(format!("{value} {currency}"))
        });

        Self {
            id: id.to_string(),
            patient: text_at(claim, "/patient/reference").unwrap_or_else(unknown),
            provider: text_at(claim, "/provider/reference").unwrap_or_else(unknown),
            insurer: text_at(claim, "/insurer/reference").unwrap_or_else(unknown),
            category: text_at(claim, "/type/coding/0/code")
                .or_else(|| text_at(claim, "/type/coding/0/display"))
                .unwrap_or_else(|| "Pharmacy".to_string()),
            use_: text_at(claim, "/use")
                .map(|u| u.to_uppercase())
                .unwrap_or_else(unknown),
            medication: medication.unwrap_or_else(unknown),
            quantity: item
                .and_then(|i| text_at(i, "/quantity/value"))
                .unwrap_or_else(unknown),
            unit_price: unit_price.unwrap_or_else(unknown),
        }
    }
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Strings and numbers at `pointer`, as display text
fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct ClaimsClient {
    gateway: Arc<dyn FhirGateway>,
    claims_url: String,
    claim_path: String,
}

impl ClaimsClient {
    pub fn new(gateway: Arc<dyn FhirGateway>, config: &FhirConfig) -> Self {
        Self {
            gateway,
            claims_url: format!("{}/claims", config.webhook_server_url.trim_end_matches('/')),
            claim_path: config.endpoints.claim.trim_end_matches('/').to_string(),
        }
    }

    /// Every prior authorization the webhook server has seen
    pub async fn list(&self) -> Result<Vec<PriorAuthSummary>, ClaimsError> {
        let body = self.gateway.get(&self.claims_url, &[]).await?;
        let claims: Vec<PriorAuthSummary> = serde_json::from_value(body).map_err(|e| {
            warn!(url = %self.claims_url, error = %e, "Claim list has an unexpected shape");
            ClaimsError::MalformedList(e.to_string())
        })?;
        info!(claims = claims.len(), "Fetched prior authorizations");
        Ok(claims)
    }

    pub async fn view(&self, claim_id: &str) -> Result<ClaimDetails, ClaimsError> {
        let path = format!("{}/{}", self.claim_path, claim_id);
        debug!(claim_id = %claim_id, "Fetching claim");
        let claim = self.gateway.get(&path, &[]).await?;
        Ok(ClaimDetails::from_resource(claim_id, &claim))
    }
}

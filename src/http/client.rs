use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use moka::future::Cache;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::config::FhirConfig;

pub const FHIR_JSON: &str = "application/fhir+json";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FhirError {
    #[error("Server responded with HTTP {status}")]
    Status { status: u16, body: Value },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FhirError {
    /// Body stored as the step response when a call fails
    pub fn payload(&self) -> Value {
        match self {
            FhirError::Status { status, body } => json!({ "status": status, "body": body }),
            FhirError::Transport(message) | FhirError::InvalidRequest(message) => {
                json!({ "error": message })
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FhirError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Seam between the workflow and the FHIR / CDS servers
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait FhirGateway: Send + Sync {
    /// POST a FHIR JSON body to `path`, returning the parsed response body
    async fn post(&self, path: &str, body: &Value) -> Result<Value, FhirError>;

    /// GET `path` with query parameters
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, FhirError>;

    /// GET `{patient_path}/{id}`, served from cache when fresh
    async fn patient(&self, patient_path: &str, id: &str) -> Result<Value, FhirError>;
}

/// Rate-limited reqwest client for the payer's FHIR endpoints
#[derive(Debug)]
pub struct FhirClient {
    http: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    patient_cache: Cache<String, Value>,
}

impl FhirClient {
    pub fn new(config: &FhirConfig) -> Result<Self, FhirError> {
        let per_second = NonZeroU32::new(config.rate_limit.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.rate_limit.burst_capacity).unwrap_or(per_second);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FhirError::Transport(e.to_string()))?;

        let patient_cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(Duration::from_secs(config.patient_cache_ttl_seconds))
            .build();

        info!(base_url = %config.base_url, rps = per_second.get(), "FHIR client created");

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter,
            patient_cache,
        })
    }

    /// Absolute URLs pass through; paths are joined to the base URL
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}{}", self.base_url, path)
    }

    pub async fn clear_cache(&self) {
        self.patient_cache.invalidate_all();
        debug!("Patient cache cleared");
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value, FhirError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;

        let response = request
            .send()
            .await
            .map_err(|e| FhirError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FhirError::Transport(e.to_string()))?;
        let body = parse_body(&text);

        if status.is_success() {
            debug!(status = status.as_u16(), "FHIR request succeeded");
            Ok(body)
        } else {
            warn!(status = status.as_u16(), "FHIR request failed");
            Err(FhirError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl FhirGateway for FhirClient {
    async fn post(&self, path: &str, body: &Value) -> Result<Value, FhirError> {
        let payload =
            serde_json::to_vec(body).map_err(|e| FhirError::InvalidRequest(e.to_string()))?;
        let url = self.url_for(path);
        debug!(url = %url, "POST");

        let request = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON)
            .body(payload);
        self.execute(request).await
    }

    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, FhirError> {
        let url = self.url_for(path);
        debug!(url = %url, params = query.len(), "GET");

        let request = self.http.get(&url).header(ACCEPT, FHIR_JSON).query(query);
        self.execute(request).await
    }

    async fn patient(&self, patient_path: &str, id: &str) -> Result<Value, FhirError> {
        let key = format!("{}/{}", patient_path, id);
        if let Some(cached) = self.patient_cache.get(&key).await {
            debug!(patient_id = %id, "Patient cache hit");
            return Ok(cached);
        }

        let patient = self.get(&key, &[]).await?;
        self.patient_cache.insert(key, patient.clone()).await;
        Ok(patient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriorAuthFlowConfig;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FhirClient {
        let mut config = PriorAuthFlowConfig::default().fhir;
        config.base_url = server.uri();
        config.rate_limit.requests_per_second = 100;
        FhirClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_post_sends_fhir_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fhir/r4/MedicationRequest"))
            .and(header("content-type", FHIR_JSON))
            .and(body_json(json!({"resourceType": "MedicationRequest"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "111112"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = client
            .post("/fhir/r4/MedicationRequest", &json!({"resourceType": "MedicationRequest"}))
            .await
            .unwrap();
        assert_eq!(body, json!({"id": "111112"}));
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post("/anything", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.payload(), json!({"status": 500, "body": "boom"}));
    }

    #[tokio::test]
    async fn test_get_passes_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/QuestionnaireResponse"))
            .and(query_param("subject", "Patient/101"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0})))
            .mount(&server)
            .await;

        let query = vec![("subject".to_string(), "Patient/101".to_string())];
        let body = client_for(&server)
            .get("/QuestionnaireResponse", &query)
            .await
            .unwrap();
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_patient_lookup_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Patient/101"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "101"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.patient("/Patient", "101").await.unwrap();
        let second = client.patient("/Patient", "101").await.unwrap();
        assert_eq!(second["id"], "101");
    }

    #[test]
    fn test_url_for_keeps_absolute_urls() {
        let mut config = PriorAuthFlowConfig::default().fhir;
        config.base_url = "https://payer.example/".to_string();
        let client = FhirClient::new(&config).unwrap();

        assert_eq!(client.url_for("/Claim/7"), "https://payer.example/Claim/7");
        assert_eq!(
            client.url_for("http://localhost:9099/claims"),
            "http://localhost:9099/claims"
        );
    }

    #[test]
    fn test_transport_payload() {
        let err = FhirError::Transport("connection refused".into());
        assert_eq!(err.payload(), json!({"error": "connection refused"}));
        assert_eq!(err.status(), None);
    }
}

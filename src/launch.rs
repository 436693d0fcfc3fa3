// Launch context handed to the questionnaire step by the ordering system

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::store::{keys, WorkflowStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Invalid launch URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchContext {
    pub coverage_id: Option<String>,
    pub medication_request_id: Option<String>,
    pub patient_id: Option<String>,
    pub questionnaire_id: Option<String>,
}

/// (query parameter, store key)
const PARAMS: [(&str, &str); 4] = [
    ("coverageId", keys::COVERAGE_ID),
    ("medicationRequestId", keys::MEDICATION_REQUEST_ID),
    ("patientId", keys::PATIENT_ID),
    ("questionnaireId", keys::LAUNCH_QUESTIONNAIRE_ID),
];

impl LaunchContext {
    /// Read launch parameters from a URL or bare query string.
    ///
    /// Parameters present in the query are saved to the store; absent ones
    /// fall back to what an earlier launch saved.
    pub fn from_query(input: &str, store: &dyn WorkflowStore) -> Result<Self, LaunchError> {
        let url = if input.contains("://") {
            Url::parse(input)
        } else {
            Url::parse(&format!("launch://context/?{}", input.trim_start_matches('?')))
        }
        .map_err(|e| LaunchError::InvalidUrl(e.to_string()))?;

        for (param, key) in PARAMS {
            let value = url
                .query_pairs()
                .find(|(name, value)| name == param && !value.is_empty())
                .map(|(_, value)| value.into_owned());
            if let Some(value) = value {
                debug!(param = %param, "Launch parameter taken from query");
                store.set_string(key, &value);
            }
        }

        Ok(Self::from_store(store))
    }

    pub fn from_store(store: &dyn WorkflowStore) -> Self {
        let [coverage_id, medication_request_id, patient_id, questionnaire_id] =
            PARAMS.map(|(_, key)| store.get_string(key).filter(|v| !v.is_empty()));
        Self {
            coverage_id,
            medication_request_id,
            patient_id,
            questionnaire_id,
        }
    }

    /// Names of the parameters the questionnaire package request still lacks
    pub fn missing_for_package(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.coverage_id.is_none() {
            missing.push("coverageId is required".to_string());
        }
        if self.medication_request_id.is_none() {
            missing.push("medicationRequestId is required".to_string());
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_query_values_are_persisted() {
        let store = MemoryStore::new();
        let ctx = LaunchContext::from_query(
            "https://dtr.example.org/launch?coverageId=cov-1&medicationRequestId=111112&patientId=101",
            &store,
        )
        .unwrap();

        assert_eq!(ctx.coverage_id.as_deref(), Some("cov-1"));
        assert_eq!(ctx.questionnaire_id, None);
        assert_eq!(store.get_string(keys::MEDICATION_REQUEST_ID).as_deref(), Some("111112"));
        assert!(ctx.missing_for_package().is_empty());
    }

    #[test]
    fn test_missing_values_fall_back_to_store() {
        let store = MemoryStore::new();
        store.set_string(keys::COVERAGE_ID, "cov-9");

        let ctx = LaunchContext::from_query("?medicationRequestId=42&coverageId=", &store).unwrap();
        assert_eq!(ctx.coverage_id.as_deref(), Some("cov-9"));
        assert_eq!(ctx.medication_request_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_missing_for_package() {
        let ctx = LaunchContext::default();
        assert_eq!(ctx.missing_for_package().len(), 2);
    }

    #[test]
    fn test_invalid_url() {
        let store = MemoryStore::new();
        assert!(LaunchContext::from_query("http://[::1", &store).is_err());
    }
}

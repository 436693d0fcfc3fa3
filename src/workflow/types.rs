use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::store::keys::{self, RecordKeys};
use crate::store::WorkflowStore;

/// Execution status of one workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl StepStatus {
    /// Whether the tracker accepts a direct move from `self` to `next`.
    ///
    /// `NotStarted -> Completed` is not a direct move; it must go through
    /// `InProgress`. Nothing moves back to `NotStarted` except a reset.
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, next),
            (NotStarted, InProgress)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (Completed, Completed)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepStatus::NotStarted => "not started",
            StepStatus::InProgress => "in progress",
            StepStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    pub status: StepStatus,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::NotStarted,
        }
    }
}

/// The stages of a prior-authorization run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    MedicationRequest,
    CheckPayerRequirements,
    QuestionnairePackage,
    QuestionnaireResponse,
    ClaimSubmit,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::MedicationRequest,
        StepKind::CheckPayerRequirements,
        StepKind::QuestionnairePackage,
        StepKind::QuestionnaireResponse,
        StepKind::ClaimSubmit,
    ];

    /// Step name as shown in the stepper
    pub fn label(self) -> &'static str {
        match self {
            StepKind::MedicationRequest => "Medication request",
            StepKind::CheckPayerRequirements => "Check Payer Requirements",
            StepKind::QuestionnairePackage => "Questionnaire package",
            StepKind::QuestionnaireResponse => "Questionnaire Response",
            StepKind::ClaimSubmit => "Claim Submit",
        }
    }

    pub fn index(self) -> usize {
        match self {
            StepKind::MedicationRequest => 0,
            StepKind::CheckPayerRequirements => 1,
            StepKind::QuestionnairePackage => 2,
            StepKind::QuestionnaireResponse => 3,
            StepKind::ClaimSubmit => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    pub fn record_keys(self) -> RecordKeys {
        match self {
            StepKind::MedicationRequest => keys::MEDICATION_RECORD,
            StepKind::CheckPayerRequirements => keys::CDS_RECORD,
            StepKind::QuestionnairePackage => keys::QUESTIONNAIRE_PACKAGE_RECORD,
            StepKind::QuestionnaireResponse => keys::QUESTIONNAIRE_RESPONSE_RECORD,
            StepKind::ClaimSubmit => keys::CLAIM_RECORD,
        }
    }

    /// Names of the default step template
    pub fn template() -> Vec<String> {
        Self::ALL.iter().map(|k| k.label().to_string()).collect()
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last request/response captured for a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub request_body: Value,
    pub response_body: Value,
    pub request_url: String,
    pub request_method: String,
}

impl Default for StepRecord {
    fn default() -> Self {
        Self {
            request_body: json!({}),
            response_body: json!({}),
            request_url: String::new(),
            request_method: String::new(),
        }
    }
}

impl StepRecord {
    /// Read the record for `kind`; missing or malformed parts fall back to empty defaults
    pub fn load(store: &dyn WorkflowStore, kind: StepKind) -> Self {
        let keys = kind.record_keys();
        Self {
            request_body: store.get(keys.request).unwrap_or_else(|| json!({})),
            response_body: store.get(keys.response).unwrap_or_else(|| json!({})),
            request_url: store.get_string(keys.url).unwrap_or_default(),
            request_method: store.get_string(keys.method).unwrap_or_default(),
        }
    }

    /// Store the request half of the record before dispatch
    pub fn save_request(
        store: &dyn WorkflowStore,
        kind: StepKind,
        body: &Value,
        url: &str,
        method: HttpMethod,
    ) {
        let keys = kind.record_keys();
        store.set(keys.request, body);
        store.set_string(keys.url, url);
        store.set_string(keys.method, method.as_str());
    }

    pub fn save_response(store: &dyn WorkflowStore, kind: StepKind, body: &Value) {
        store.set(kind.record_keys().response, body);
    }

    pub fn save(&self, store: &dyn WorkflowStore, kind: StepKind) {
        let keys = kind.record_keys();
        store.set(keys.request, &self.request_body);
        store.set(keys.response, &self.response_body);
        store.set_string(keys.url, &self.request_url);
        store.set_string(keys.method, &self.request_method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_transition_table() {
        use StepStatus::*;
        assert!(NotStarted.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(InProgress));
        assert!(Completed.can_transition_to(Completed));

        assert!(!NotStarted.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(NotStarted));
    }

    #[test]
    fn test_step_kind_labels_round_trip() {
        for kind in StepKind::ALL {
            assert_eq!(StepKind::from_label(kind.label()), Some(kind));
            assert_eq!(StepKind::from_index(kind.index()), Some(kind));
        }
        assert_eq!(StepKind::from_label("Unknown"), None);
    }

    #[test]
    fn test_missing_record_loads_empty_defaults() {
        let store = MemoryStore::new();
        let record = StepRecord::load(&store, StepKind::ClaimSubmit);
        assert_eq!(record, StepRecord::default());
    }

    #[test]
    fn test_record_save_and_load() {
        let store = MemoryStore::new();
        StepRecord::save_request(
            &store,
            StepKind::MedicationRequest,
            &json!({"resourceType": "MedicationRequest"}),
            "https://unitedcare.com/fhir/r4/MedicationRequest",
            HttpMethod::Post,
        );
        StepRecord::save_response(&store, StepKind::MedicationRequest, &json!({"id": "111112"}));

        let record = StepRecord::load(&store, StepKind::MedicationRequest);
        assert_eq!(record.request_method, "POST");
        assert_eq!(record.response_body, json!({"id": "111112"}));
        assert_eq!(
            record.request_url,
            "https://unitedcare.com/fhir/r4/MedicationRequest"
        );
    }
}

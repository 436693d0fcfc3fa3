// Step navigator: replay the stored request/response of any step reached so far

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PriorAuthFlowConfig;
use crate::http::{FhirError, FhirGateway};
use crate::polling::{PollStatus, ScopedPoller};
use crate::store::{self, keys, WorkflowStore};
use crate::workflow::{
    HttpMethod, PhaseEvent, PhaseMachine, StepKind, StepRecord, StepStatus, StepTracker,
    TrackerError, WorkflowPhase, WorkflowStep,
};

pub const MISSING_RESPONSE_MESSAGE: &str =
    "Cannot find a request payload. Make sure you submit the Answers to the questions";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigatorError {
    #[error("Step {index} does not exist ({len} steps)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Step '{0}' has not started yet")]
    NotStarted(String),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Everything shown for a selected step
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayView {
    pub index: usize,
    pub step: WorkflowStep,
    pub record: StepRecord,
    /// Hook name, only for the payer-check step
    pub cds_hook: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NavigatorSettings {
    pub questionnaire_response_path: String,
    pub demo_base_url: String,
}

impl NavigatorSettings {
    pub fn from_config(config: &PriorAuthFlowConfig) -> Self {
        Self {
            questionnaire_response_path: config.fhir.endpoints.questionnaire_response.clone(),
            demo_base_url: config.fhir.demo_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Result of searching the payer for answers submitted during this run
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseLookup {
    Found(Value),
    NotFound,
}

pub struct StepNavigator {
    store: Arc<dyn WorkflowStore>,
    gateway: Arc<dyn FhirGateway>,
    settings: NavigatorSettings,
    tracker: StepTracker,
}

impl StepNavigator {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        gateway: Arc<dyn FhirGateway>,
        settings: NavigatorSettings,
    ) -> Self {
        let tracker = StepTracker::restore(store.clone());
        Self {
            store,
            gateway,
            settings,
            tracker,
        }
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        self.tracker.steps()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.tracker.active_index()
    }

    /// Re-read the steps after another component changed them
    pub fn reload(&mut self) {
        self.store.reload();
        self.tracker = StepTracker::restore(self.store.clone());
    }

    /// Show the stored record of the step at `index`.
    ///
    /// Only the questionnaire response step talks to the network, to pick up
    /// answers submitted from the questionnaire app.
    pub async fn select(&mut self, index: usize) -> Result<ReplayView, NavigatorError> {
        let len = self.tracker.steps().len();
        let step = self
            .tracker
            .steps()
            .get(index)
            .cloned()
            .ok_or(NavigatorError::IndexOutOfRange { index, len })?;

        if step.status == StepStatus::NotStarted {
            debug!(step = %step.name, "Ignoring selection of a step that has not started");
            return Err(NavigatorError::NotStarted(step.name));
        }

        let kind = StepKind::from_label(&step.name).or_else(|| StepKind::from_index(index));

        if kind == Some(StepKind::QuestionnaireResponse) {
            match self.refresh_questionnaire_response().await {
                Ok(lookup) => debug!(found = matches!(lookup, ResponseLookup::Found(_)), "Answer lookup finished"),
                Err(e) => warn!(error = %e, "Answer lookup failed; replaying stored record"),
            }
        }

        self.tracker.set_active_index(Some(index))?;

        let record = kind
            .map(|k| StepRecord::load(self.store.as_ref(), k))
            .unwrap_or_default();
        let cds_hook = match kind {
            Some(StepKind::CheckPayerRequirements) => self.store.get_string(keys::CDS_HOOK),
            _ => None,
        };
        let step = self.tracker.steps()[index].clone();

        info!(step = %step.name, status = ?step.status, "Replaying step");
        Ok(ReplayView {
            index,
            step,
            record,
            cds_hook,
        })
    }

    /// Search for answers authored since the run started and record the result
    pub async fn refresh_questionnaire_response(&mut self) -> Result<ResponseLookup, FhirError> {
        let lookup =
            lookup_questionnaire_response(self.gateway.as_ref(), self.store.as_ref(), &self.settings)
                .await?;
        match &lookup {
            ResponseLookup::Found(resource) => {
                record_found_response(self.store.as_ref(), &self.settings, resource);
                mark_answers_received(self.store.as_ref(), &mut self.tracker);
            }
            ResponseLookup::NotFound => record_missing_response(self.store.as_ref()),
        }
        Ok(lookup)
    }

    /// Keep searching until the answers show up.
    ///
    /// The search stops when the returned poller is dropped. Call `reload`
    /// after it completes to see the updated step.
    pub fn watch_questionnaire_response(&self, interval: Duration) -> ScopedPoller<Value> {
        let store = self.store.clone();
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();

        ScopedPoller::spawn("questionnaire-response", interval, move || {
            let store = store.clone();
            let gateway = gateway.clone();
            let settings = settings.clone();
            async move {
                match lookup_questionnaire_response(gateway.as_ref(), store.as_ref(), &settings).await {
                    Ok(ResponseLookup::Found(resource)) => {
                        record_found_response(store.as_ref(), &settings, &resource);
                        let mut tracker = StepTracker::restore(store.clone());
                        mark_answers_received(store.as_ref(), &mut tracker);
                        PollStatus::Ready(resource)
                    }
                    Ok(ResponseLookup::NotFound) => PollStatus::Pending,
                    Err(e) => {
                        debug!(error = %e, "Answer lookup failed; retrying");
                        PollStatus::Pending
                    }
                }
            }
        })
    }
}

async fn lookup_questionnaire_response(
    gateway: &dyn FhirGateway,
    store: &dyn WorkflowStore,
    settings: &NavigatorSettings,
) -> Result<ResponseLookup, FhirError> {
    store.reload();
    let patient_id = store.get_string(keys::SELECTED_PATIENT_ID).unwrap_or_default();
    let timestamp = store.get_string(keys::TIMESTAMP).unwrap_or_default();
    let query = vec![
        ("subject".to_string(), format!("Patient/{}", patient_id)),
        ("authored".to_string(), format!("ge{}", timestamp)),
    ];

    let bundle = gateway
        .get(&settings.questionnaire_response_path, &query)
        .await?;

    Ok(bundle
        .pointer("/entry/0/resource")
        .filter(|r| r.is_object())
        .cloned()
        .map_or(ResponseLookup::NotFound, ResponseLookup::Found))
}

fn record_found_response(store: &dyn WorkflowStore, settings: &NavigatorSettings, resource: &Value) {
    let mut request = resource.clone();
    if let Some(fields) = request.as_object_mut() {
        fields.remove("id");
        fields.remove("authored");
    }
    let kind = StepKind::QuestionnaireResponse;
    StepRecord::save_response(store, kind, resource);
    StepRecord::save_request(
        store,
        kind,
        &request,
        &format!("{}{}", settings.demo_base_url, settings.questionnaire_response_path),
        HttpMethod::Post,
    );
}

/// Answers submitted elsewhere count as a submitted response: the step is
/// completed and a run waiting for answers moves on to the claim.
fn mark_answers_received(store: &dyn WorkflowStore, tracker: &mut StepTracker) {
    if let Err(e) = tracker.complete(StepKind::QuestionnaireResponse.label()) {
        warn!(error = %e, "Could not complete the answer step");
        return;
    }

    let phase: WorkflowPhase = store::load(store, keys::WORKFLOW_PHASE).unwrap_or_default();
    if phase != WorkflowPhase::AnswerPending {
        return;
    }
    match PhaseMachine::new(phase).handle_event(PhaseEvent::ResponseSubmitted) {
        Ok(next) => store::save(store, keys::WORKFLOW_PHASE, &next),
        Err(e) => warn!(error = %e, "Could not advance the workflow phase"),
    }
}

fn record_missing_response(store: &dyn WorkflowStore) {
    let placeholder = json!({ "message": MISSING_RESPONSE_MESSAGE });
    StepRecord {
        request_body: placeholder.clone(),
        response_body: placeholder,
        request_url: String::new(),
        request_method: String::new(),
    }
    .save(store, StepKind::QuestionnaireResponse);
}

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::phase::{PhaseError, PhaseEvent, PhaseMachine, WorkflowPhase};
use super::tracker::{StepTracker, TrackerError};
use super::types::{HttpMethod, StepKind, StepRecord, StepStatus};
use crate::config::{EndpointConfig, PriorAuthFlowConfig};
use crate::fhir::cds::{self, CdsCard};
use crate::fhir::questionnaire::{self, AnswerSet, QuestionItem, Questionnaire, QuestionnaireError};
use crate::fhir::resources::{self, ClaimForm, MedicationOrderForm, PatientSummary};
use crate::http::{FhirError, FhirGateway};
use crate::launch::LaunchContext;
use crate::notifications::Notifier;
use crate::store::{self, keys, WorkflowStore};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    InvalidPhase(#[from] PhaseError),

    #[error("Claim has already been submitted for this run")]
    AlreadySubmitted,

    #[error("No prior-authorization run in progress; start one with a patient first")]
    NoActiveRun,

    #[error("Missing {0}; complete the earlier step first")]
    MissingArtifact(&'static str),

    #[error("Step tracking error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Questionnaire error: {0}")]
    Questionnaire(#[from] QuestionnaireError),
}

/// What happened to a dispatched step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Completed { step: StepKind, response: Value },
    /// The server or network failed; the error payload was stored as the response
    Failed { step: StepKind, error: FhirError },
    /// The run was restarted while the call was in flight; nothing was recorded
    Discarded { step: StepKind },
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub endpoints: EndpointConfig,
    pub demo_base_url: String,
    pub practitioner_id: String,
    pub stage_delay: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &PriorAuthFlowConfig) -> Self {
        Self {
            endpoints: config.fhir.endpoints.clone(),
            demo_base_url: config.fhir.demo_base_url.trim_end_matches('/').to_string(),
            practitioner_id: config.workflow.practitioner_id.clone(),
            stage_delay: config.workflow.stage_delay(),
        }
    }
}

enum Dispatch {
    Success(Value),
    Failure(FhirError),
    Stale,
}

/// Drives one prior-authorization run through its five steps.
///
/// State lives in the injected store; an orchestrator restored from the same
/// store picks the run up where the last one left it.
pub struct PriorAuthOrchestrator {
    store: Arc<dyn WorkflowStore>,
    gateway: Arc<dyn FhirGateway>,
    settings: OrchestratorSettings,
    tracker: StepTracker,
    phase: PhaseMachine,
    notifier: Notifier,
}

impl std::fmt::Debug for PriorAuthOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorAuthOrchestrator")
            .field("tracker", &self.tracker)
            .field("phase", &self.phase.current())
            .finish()
    }
}

impl PriorAuthOrchestrator {
    /// Rebuild the run persisted in `store`
    pub fn restore(
        store: Arc<dyn WorkflowStore>,
        gateway: Arc<dyn FhirGateway>,
        settings: OrchestratorSettings,
        notifier: Notifier,
    ) -> Self {
        let tracker = StepTracker::restore(store.clone());
        let phase: WorkflowPhase = store::load(store.as_ref(), keys::WORKFLOW_PHASE).unwrap_or_default();
        debug!(phase = ?phase, "Restored workflow phase");

        Self {
            store,
            gateway,
            settings,
            tracker,
            phase: PhaseMachine::new(phase),
            notifier,
        }
    }

    pub fn tracker(&self) -> &StepTracker {
        &self.tracker
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase.current()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn is_active(&self) -> bool {
        self.store.get_string(keys::IS_PROCESS).as_deref() == Some("true")
    }

    pub fn patient_id(&self) -> Option<String> {
        self.store.get_string(keys::SELECTED_PATIENT_ID)
    }

    pub fn step_record(&self, kind: StepKind) -> StepRecord {
        StepRecord::load(self.store.as_ref(), kind)
    }

    pub fn cds_cards(&self) -> Vec<CdsCard> {
        store::load(self.store.as_ref(), keys::CDS_CARDS).unwrap_or_default()
    }

    pub fn medication_form(&self) -> Option<MedicationOrderForm> {
        store::load(self.store.as_ref(), keys::MEDICATION_FORM_DATA)
    }

    pub fn questionnaire(&self) -> Option<Questionnaire> {
        let id = self.store.get_string(keys::QUESTIONNAIRE_ID)?;
        let items: Vec<QuestionItem> = store::load(self.store.as_ref(), keys::QUESTIONNAIRE_ITEMS)?;
        Some(Questionnaire { id, items })
    }

    /// Fetch display data for a patient; lookup failures fall back to the bare id
    pub async fn lookup_patient(&self, patient_id: &str) -> PatientSummary {
        match self.gateway.patient(&self.settings.endpoints.patient, patient_id).await {
            Ok(resource) => PatientSummary::from_resource(patient_id, &resource),
            Err(e) => {
                warn!(patient_id = %patient_id, error = %e, "Patient lookup failed");
                PatientSummary::from_resource(patient_id, &json!({}))
            }
        }
    }

    /// Begin a fresh run for `patient`, discarding any previous one
    pub fn start(&mut self, patient: &PatientSummary) {
        self.store.clear_subset(&keys::process_keys());
        self.reset_phase();

        self.store.set_string(keys::SELECTED_PATIENT_ID, &patient.id);
        self.store.set_string(keys::SELECTED_PATIENT_NAME, &patient.display_name);
        self.store.set_string(keys::PATIENT_ID, &patient.id);
        self.store.set_string(
            keys::TIMESTAMP,
            &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        self.store.set_string(keys::IS_PROCESS, "true");
        self.tracker.initialize(&StepKind::template());
        self.persist_phase();

        info!(patient_id = %patient.id, "Prior-authorization run started");
        self.notifier
            .info(format!("Started prior authorization for {}", patient.display_name));
    }

    /// Switch patient: drop every run artifact but keep the session
    pub fn restart(&mut self) {
        self.store.clear_subset(&keys::process_keys());
        self.reset_phase();
        self.tracker = StepTracker::new(self.store.clone());
        info!("Prior-authorization run discarded");
    }

    /// End the session, removing everything from the store
    pub fn logout(&mut self) {
        self.store.clear_all();
        self.phase = PhaseMachine::default();
        self.tracker = StepTracker::new(self.store.clone());
        info!("Session cleared");
    }

    pub async fn create_medication_order(
        &mut self,
        form: &MedicationOrderForm,
    ) -> Result<StepOutcome, WorkflowError> {
        let kind = StepKind::MedicationRequest;
        let patient_id = self.require_run()?;
        self.phase.next(PhaseEvent::OrderCreated)?;
        self.validate(form.problems())?;

        store::save(self.store.as_ref(), keys::MEDICATION_FORM_DATA, form);
        self.begin(kind)?;

        let body = resources::build_medication_request(
            form,
            &patient_id,
            &self.settings.practitioner_id,
            Utc::now().date_naive(),
        );
        let path = self.settings.endpoints.medication_request.clone();

        match self.dispatch(kind, &path, &body).await {
            Dispatch::Success(response) => {
                if let Some(id) = response.get("id").and_then(Value::as_str) {
                    self.store.set_string(keys::MEDICATION_REQUEST_ID, id);
                }
                StepRecord::save_response(self.store.as_ref(), kind, &response);
                self.finish(kind, PhaseEvent::OrderCreated)?;
                self.notifier.success("Medication order created successfully!");
                Ok(StepOutcome::Completed { step: kind, response })
            }
            Dispatch::Failure(error) => {
                self.notifier.error("Error creating medication order!");
                Ok(StepOutcome::Failed { step: kind, error })
            }
            Dispatch::Stale => Ok(StepOutcome::Discarded { step: kind }),
        }
    }

    pub async fn check_payer_requirements(&mut self) -> Result<StepOutcome, WorkflowError> {
        let kind = StepKind::CheckPayerRequirements;
        let patient_id = self.require_run()?;
        self.phase.next(PhaseEvent::PayerChecked)?;

        let medication = self
            .store
            .get(keys::MEDICATION_RECORD.response)
            .ok_or(WorkflowError::MissingArtifact("medication order response"))?;

        self.begin(kind)?;
        self.store.set_string(keys::CDS_HOOK, cds::ORDER_SIGN_HOOK);

        let body =
            cds::build_order_sign_request(&patient_id, &self.settings.practitioner_id, &medication);
        let path = self.settings.endpoints.prescribe_medication.clone();

        match self.dispatch(kind, &path, &body).await {
            Dispatch::Success(response) => {
                let cards = cds::extract_cards(&response);
                info!(cards = cards.len(), "Payer requirements received");
                StepRecord::save_response(self.store.as_ref(), kind, &cds::wrap_response(&response));
                store::save(self.store.as_ref(), keys::CDS_CARDS, &cards);
                self.finish(kind, PhaseEvent::PayerChecked)?;
                self.notifier.success("Payer requirements retrieved successfully!");
                Ok(StepOutcome::Completed { step: kind, response })
            }
            Dispatch::Failure(error) => {
                self.notifier.error("Error retrieving payer requirements!");
                Ok(StepOutcome::Failed { step: kind, error })
            }
            Dispatch::Stale => Ok(StepOutcome::Discarded { step: kind }),
        }
    }

    /// Fetch the questionnaire package, then open the answer step after the stage delay
    pub async fn fetch_questionnaire_package(
        &mut self,
        launch: &LaunchContext,
    ) -> Result<StepOutcome, WorkflowError> {
        let kind = StepKind::QuestionnairePackage;
        self.require_run()?;
        self.phase.next(PhaseEvent::PackageFetched)?;
        self.validate(launch.missing_for_package())?;

        let (Some(coverage_id), Some(order_id)) =
            (launch.coverage_id.as_deref(), launch.medication_request_id.as_deref())
        else {
            return Err(WorkflowError::Validation(launch.missing_for_package()));
        };

        self.begin(kind)?;
        let body = questionnaire::build_package_request(coverage_id, order_id);
        let path = self.settings.endpoints.questionnaire_package.clone();

        let response = match self.dispatch(kind, &path, &body).await {
            Dispatch::Success(response) => response,
            Dispatch::Failure(error) => {
                self.notifier.error("Error retrieving questionnaire package!");
                return Ok(StepOutcome::Failed { step: kind, error });
            }
            Dispatch::Stale => return Ok(StepOutcome::Discarded { step: kind }),
        };

        StepRecord::save_response(self.store.as_ref(), kind, &response);
        let extracted = match questionnaire::extract_questionnaire(&response) {
            Ok(extracted) => extracted,
            Err(e) => {
                self.notifier.error(format!("Questionnaire package is unusable: {e}"));
                return Err(e.into());
            }
        };

        self.store.set_string(keys::QUESTIONNAIRE_ID, &extracted.id);
        store::save(self.store.as_ref(), keys::QUESTIONNAIRE_ITEMS, &extracted.items);
        self.finish(kind, PhaseEvent::PackageFetched)?;
        self.notifier.success(format!(
            "Questionnaire package retrieved ({} questions)",
            extracted.items.len()
        ));

        self.stage_answer_step().await?;
        Ok(StepOutcome::Completed { step: kind, response })
    }

    async fn stage_answer_step(&mut self) -> Result<(), TrackerError> {
        let token = self.store.get_string(keys::TIMESTAMP);
        tokio::time::sleep(self.settings.stage_delay).await;

        self.store.reload();
        if self.store.get_string(keys::TIMESTAMP) != token {
            warn!("Run changed while staging the answer step; leaving steps untouched");
            return Ok(());
        }

        let answer_step = StepKind::QuestionnaireResponse;
        self.tracker.set_status(answer_step.label(), StepStatus::InProgress)?;
        self.tracker.set_active_index(Some(answer_step.index()))?;
        Ok(())
    }

    pub async fn submit_questionnaire_response(
        &mut self,
        answers: &AnswerSet,
    ) -> Result<StepOutcome, WorkflowError> {
        let kind = StepKind::QuestionnaireResponse;
        let patient_id = self.require_run()?;
        self.phase.next(PhaseEvent::ResponseSubmitted)?;

        let questionnaire = self
            .questionnaire()
            .ok_or(WorkflowError::MissingArtifact("questionnaire package"))?;

        if !questionnaire::validate_form(&questionnaire.items, answers) {
            let unanswered: Vec<String> = questionnaire
                .items
                .iter()
                .filter(|item| answers.get(&item.link_id).map_or(true, |a| a.is_empty()))
                .map(|item| format!("{} is unanswered", item.link_id))
                .collect();
            self.notifier.warning("Please answer all the questions before submitting");
            return Err(WorkflowError::Validation(unanswered));
        }

        self.begin(kind)?;
        let body = questionnaire::build_questionnaire_response(
            &questionnaire.id,
            &patient_id,
            &self.settings.practitioner_id,
            &questionnaire.items,
            answers,
        );
        let path = self.settings.endpoints.questionnaire_response.clone();

        match self.dispatch(kind, &path, &body).await {
            Dispatch::Success(response) => {
                StepRecord::save_response(self.store.as_ref(), kind, &response);
                self.finish(kind, PhaseEvent::ResponseSubmitted)?;
                self.notifier.success("Questionnaire response submitted successfully!");
                Ok(StepOutcome::Completed { step: kind, response })
            }
            Dispatch::Failure(error) => {
                self.notifier.error("Error submitting questionnaire response!");
                Ok(StepOutcome::Failed { step: kind, error })
            }
            Dispatch::Stale => Ok(StepOutcome::Discarded { step: kind }),
        }
    }

    /// Claim form pre-filled from the run so far
    pub fn prefilled_claim(&self) -> Option<ClaimForm> {
        let patient_id = self.patient_id()?;
        Some(ClaimForm::prefilled(&patient_id, self.medication_form().as_ref()))
    }

    pub async fn submit_claim(&mut self, form: &ClaimForm) -> Result<StepOutcome, WorkflowError> {
        let kind = StepKind::ClaimSubmit;
        self.require_run()?;
        if self.phase.current() == WorkflowPhase::Submitted {
            return Err(WorkflowError::AlreadySubmitted);
        }
        self.phase.next(PhaseEvent::ClaimSubmitted)?;
        self.validate(form.problems())?;

        let body = resources::build_claim(form, Utc::now().date_naive())
            .map_err(|e| WorkflowError::Validation(vec![e]))?;

        for earlier in &StepKind::ALL[..kind.index()] {
            self.tracker.complete(earlier.label())?;
        }
        self.begin(kind)?;

        let path = self.settings.endpoints.claim_submit.clone();
        match self.dispatch(kind, &path, &body).await {
            Dispatch::Success(response) => {
                StepRecord::save_response(self.store.as_ref(), kind, &response);
                self.finish(kind, PhaseEvent::ClaimSubmitted)?;
                match resources::claim_outcome(&response) {
                    Some(resources::CLAIM_OUTCOME_COMPLETE) => {
                        info!("Prior authorization completed");
                        self.notifier.celebrate("Prior Authorization Status: Completed");
                    }
                    outcome => {
                        warn!(outcome = ?outcome, "Prior authorization not completed");
                        self.notifier.error(format!(
                            "Prior Authorization not completed (outcome: {})",
                            outcome.unwrap_or("missing")
                        ));
                    }
                }
                Ok(StepOutcome::Completed { step: kind, response })
            }
            Dispatch::Failure(error) => {
                self.notifier.error("Error submitting claim!");
                Ok(StepOutcome::Failed { step: kind, error })
            }
            Dispatch::Stale => Ok(StepOutcome::Discarded { step: kind }),
        }
    }

    fn require_run(&self) -> Result<String, WorkflowError> {
        match self.patient_id() {
            Some(id) if self.is_active() => Ok(id),
            _ => Err(WorkflowError::NoActiveRun),
        }
    }

    fn validate(&self, problems: Vec<String>) -> Result<(), WorkflowError> {
        if problems.is_empty() {
            return Ok(());
        }
        debug!(problems = ?problems, "Form validation failed");
        self.notifier.warning("Please fill in all required fields correctly");
        Err(WorkflowError::Validation(problems))
    }

    fn begin(&mut self, kind: StepKind) -> Result<(), TrackerError> {
        self.tracker.set_status(kind.label(), StepStatus::InProgress)?;
        self.tracker.set_active_index(Some(kind.index()))
    }

    fn finish(&mut self, kind: StepKind, event: PhaseEvent) -> Result<(), WorkflowError> {
        self.tracker.set_status(kind.label(), StepStatus::Completed)?;
        self.phase.handle_event(event)?;
        self.persist_phase();
        Ok(())
    }

    fn reset_phase(&mut self) {
        if let Err(e) = self.phase.handle_event(PhaseEvent::Restart) {
            warn!(error = %e, "Phase machine refused restart; starting from a fresh machine");
            self.phase = PhaseMachine::default();
        }
    }

    fn persist_phase(&self) {
        store::save(self.store.as_ref(), keys::WORKFLOW_PHASE, &self.phase.current());
    }

    /// Record the request, POST it, and settle the outcome.
    ///
    /// Responses that land after the run was restarted are dropped without
    /// touching the store.
    async fn dispatch(&mut self, kind: StepKind, path: &str, body: &Value) -> Dispatch {
        let token = self.store.get_string(keys::TIMESTAMP);
        let display_url = format!("{}{}", self.settings.demo_base_url, path);
        StepRecord::save_request(self.store.as_ref(), kind, body, &display_url, HttpMethod::Post);

        debug!(step = %kind, url = %display_url, "Dispatching step request");
        let result = self.gateway.post(path, body).await;

        self.store.reload();
        if self.store.get_string(keys::TIMESTAMP) != token {
            warn!(step = %kind, "Discarding response for a run that is no longer current");
            return Dispatch::Stale;
        }

        match result {
            Ok(response) => Dispatch::Success(response),
            Err(error) => {
                warn!(step = %kind, error = %error, "Step request failed");
                StepRecord::save_response(self.store.as_ref(), kind, &error.payload());
                Dispatch::Failure(error)
            }
        }
    }
}

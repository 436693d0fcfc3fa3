//! End-to-end prior-authorization runs against a wiremock payer
//!
//! Every test drives the real reqwest client and a file-backed store in a
//! temporary directory, so requests, persistence and replay are exercised
//! together.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prior_auth_flow::config::{EndpointConfig, PriorAuthFlowConfig};
use prior_auth_flow::fhir::{AnswerSet, AnswerValue, FrequencyUnit, MedicationOrderForm, PatientSummary};
use prior_auth_flow::launch::LaunchContext;
use prior_auth_flow::navigator::MISSING_RESPONSE_MESSAGE;
use prior_auth_flow::store::keys;
use prior_auth_flow::{
    AuthStatus, ClaimsClient, FhirClient, FileStore, NavigatorSettings, Notifier, OrchestratorSettings, PriorAuthOrchestrator,
    StepKind, StepNavigator, StepOutcome, StepStatus, WorkflowPhase, WorkflowStore,
};

struct Payer {
    server: MockServer,
    config: PriorAuthFlowConfig,
    _dir: TempDir,
    state_file: std::path::PathBuf,
}

impl Payer {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let state_file = dir.path().join("state").join("workflow-state.json");

        let mut config = PriorAuthFlowConfig::default();
        config.fhir.base_url = server.uri();
        config.fhir.webhook_server_url = server.uri();
        config.fhir.rate_limit.requests_per_second = 100;
        config.fhir.rate_limit.burst_capacity = 100;
        config.workflow.stage_delay_ms = 10;

        Self {
            server,
            config,
            _dir: dir,
            state_file,
        }
    }

    fn endpoints(&self) -> &EndpointConfig {
        &self.config.fhir.endpoints
    }

    fn store(&self) -> Arc<FileStore> {
        Arc::new(FileStore::open(&self.state_file).unwrap())
    }

    fn orchestrator(&self, store: Arc<FileStore>) -> PriorAuthOrchestrator {
        PriorAuthOrchestrator::restore(
            store,
            Arc::new(FhirClient::new(&self.config.fhir).unwrap()),
            OrchestratorSettings::from_config(&self.config),
            Notifier::new(),
        )
    }

    fn navigator(&self, store: Arc<FileStore>) -> StepNavigator {
        StepNavigator::new(
            store,
            Arc::new(FhirClient::new(&self.config.fhir).unwrap()),
            NavigatorSettings::from_config(&self.config),
        )
    }

    async fn respond(&self, endpoint: &str, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

fn jane() -> PatientSummary {
    PatientSummary {
        id: "101".into(),
        display_name: "Jane Doe".into(),
    }
}

fn order_form() -> MedicationOrderForm {
    MedicationOrderForm {
        treating_sickness: "Chronic migraine".into(),
        medication: "Aimovig 70 mg Injection".into(),
        quantity: 1,
        frequency: 1,
        frequency_unit: FrequencyUnit::Month,
        period: 3,
        start_date: "2025-03-10".into(),
    }
}

fn package() -> Value {
    json!({
        "resourceType": "Parameters",
        "parameter": [{
            "name": "return",
            "resource": {
                "resourceType": "Bundle",
                "entry": [{
                    "resource": {
                        "resourceType": "Questionnaire",
                        "id": "aimovig-pa",
                        "item": [
                            {"linkId": "1", "text": "Tried a preventive therapy before?", "type": "boolean"},
                            {"linkId": "2", "text": "Migraine days per month", "type": "integer"},
                            {"linkId": "3", "text": "Neurologist name", "type": "string"}
                        ]
                    }
                }]
            }
        }]
    })
}

#[tokio::test]
async fn test_full_run_records_every_step() {
    let payer = Payer::start().await;
    let endpoints = payer.endpoints().clone();

    payer
        .respond(&endpoints.medication_request, 201, json!({"resourceType": "MedicationRequest", "id": "111112"}))
        .await;
    Mock::given(method("POST"))
        .and(path(endpoints.prescribe_medication.as_str()))
        .and(body_partial_json(json!({"hook": "order-sign"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cards": [{"summary": "Prior authorization required", "indicator": "critical"}]
        })))
        .mount(&payer.server)
        .await;
    payer.respond(&endpoints.questionnaire_package, 200, package()).await;
    payer
        .respond(&endpoints.questionnaire_response, 201, json!({"resourceType": "QuestionnaireResponse", "id": "qr-9"}))
        .await;
    payer
        .respond(&endpoints.claim_submit, 200, json!({"resourceType": "ClaimResponse", "outcome": "complete"}))
        .await;

    let store = payer.store();
    let mut orchestrator = payer.orchestrator(store.clone());
    orchestrator.start(&jane());

    assert!(orchestrator.create_medication_order(&order_form()).await.unwrap().is_completed());
    assert!(orchestrator.check_payer_requirements().await.unwrap().is_completed());

    let launch = LaunchContext::from_query("?coverageId=cov-1", store.as_ref()).unwrap();
    assert_eq!(launch.medication_request_id.as_deref(), Some("111112"));
    assert!(orchestrator.fetch_questionnaire_package(&launch).await.unwrap().is_completed());
    assert_eq!(
        orchestrator.tracker().status_of(StepKind::QuestionnaireResponse.label()),
        Some(StepStatus::InProgress)
    );

    let mut answers = AnswerSet::new();
    answers.insert("1", AnswerValue::Boolean(true));
    answers.insert("2", AnswerValue::Integer(12));
    answers.insert("3", AnswerValue::String("Dr. Patel".into()));
    assert!(orchestrator.submit_questionnaire_response(&answers).await.unwrap().is_completed());

    let claim = orchestrator.prefilled_claim().unwrap();
    assert_eq!(claim.quantity, 3);
    assert!(orchestrator.submit_claim(&claim).await.unwrap().is_completed());
    assert_eq!(orchestrator.phase(), WorkflowPhase::Submitted);

    // A fresh handle on the same file sees the finished run
    let reopened = payer.store();
    let restored = payer.orchestrator(reopened.clone());
    assert!(restored
        .tracker()
        .steps()
        .iter()
        .all(|step| step.status == StepStatus::Completed));
    assert_eq!(restored.phase(), WorkflowPhase::Submitted);

    let claim_record = restored.step_record(StepKind::ClaimSubmit);
    assert_eq!(claim_record.request_method, "POST");
    assert_eq!(
        claim_record.request_url,
        format!("https://unitedcare.com{}", endpoints.claim_submit)
    );
    assert_eq!(claim_record.response_body["outcome"], "complete");
    assert_eq!(
        reopened.get(keys::CDS_RECORD.response).unwrap()["cards"]["cards"][0]["indicator"],
        "critical"
    );
}

#[tokio::test]
async fn test_server_error_is_stored_as_response() {
    let payer = Payer::start().await;
    let endpoints = payer.endpoints().clone();
    payer
        .respond(
            &endpoints.medication_request,
            500,
            json!({"resourceType": "OperationOutcome", "issue": [{"severity": "error"}]}),
        )
        .await;

    let store = payer.store();
    let mut orchestrator = payer.orchestrator(store.clone());
    orchestrator.start(&jane());

    let outcome = orchestrator.create_medication_order(&order_form()).await.unwrap();
    match outcome {
        StepOutcome::Failed { error, .. } => assert_eq!(error.status(), Some(500)),
        other => panic!("expected failure, got {other:?}"),
    }

    let record = orchestrator.step_record(StepKind::MedicationRequest);
    assert_eq!(record.response_body["status"], 500);
    assert_eq!(record.response_body["body"]["resourceType"], "OperationOutcome");
    assert_eq!(
        orchestrator.tracker().status_of(StepKind::MedicationRequest.label()),
        Some(StepStatus::InProgress)
    );
}

#[tokio::test]
async fn test_restart_from_another_handle_discards_late_response() {
    let payer = Payer::start().await;
    let endpoints = payer.endpoints().clone();
    Mock::given(method("POST"))
        .and(path(endpoints.medication_request.as_str()))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "late-order"}))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&payer.server)
        .await;

    let mut first = payer.orchestrator(payer.store());
    first.start(&jane());

    let second_store = payer.store();
    let mut second = payer.orchestrator(second_store.clone());

    let form = order_form();
    let (outcome, _) = tokio::join!(first.create_medication_order(&form), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        second.start(&PatientSummary {
            id: "202".into(),
            display_name: "John Roe".into(),
        });
    });

    assert!(matches!(outcome.unwrap(), StepOutcome::Discarded { .. }));

    second_store.reload();
    assert_eq!(second_store.get_string(keys::SELECTED_PATIENT_ID).as_deref(), Some("202"));
    assert_eq!(second_store.get(keys::MEDICATION_RECORD.response), None);
    assert_eq!(second_store.get_string(keys::MEDICATION_REQUEST_ID), None);
}

#[tokio::test]
async fn test_replay_picks_up_answers_from_questionnaire_app() {
    let payer = Payer::start().await;
    let endpoints = payer.endpoints().clone();
    payer
        .respond(&endpoints.medication_request, 201, json!({"id": "111112"}))
        .await;
    payer.respond(&endpoints.prescribe_medication, 200, json!({"cards": []})).await;
    payer.respond(&endpoints.questionnaire_package, 200, package()).await;

    let store = payer.store();
    let mut orchestrator = payer.orchestrator(store.clone());
    orchestrator.start(&jane());
    orchestrator.create_medication_order(&order_form()).await.unwrap();
    orchestrator.check_payer_requirements().await.unwrap();
    let launch = LaunchContext {
        coverage_id: Some("cov-1".into()),
        medication_request_id: Some("111112".into()),
        ..Default::default()
    };
    orchestrator.fetch_questionnaire_package(&launch).await.unwrap();

    // Nothing submitted yet
    let empty = Mock::given(method("GET"))
        .and(path(endpoints.questionnaire_response.as_str()))
        .and(query_param("subject", "Patient/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resourceType": "Bundle"})))
        .up_to_n_times(1)
        .mount_as_scoped(&payer.server)
        .await;

    let mut navigator = payer.navigator(payer.store());
    let view = navigator.select(StepKind::QuestionnaireResponse.index()).await.unwrap();
    assert_eq!(view.record.response_body["message"], MISSING_RESPONSE_MESSAGE);
    assert_eq!(view.step.status, StepStatus::InProgress);
    drop(empty);

    Mock::given(method("GET"))
        .and(path(endpoints.questionnaire_response.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {
                "resourceType": "QuestionnaireResponse",
                "id": "qr-app",
                "authored": "2030-01-01T00:00:00Z",
                "status": "completed"
            }}]
        })))
        .mount(&payer.server)
        .await;

    let view = navigator.select(StepKind::QuestionnaireResponse.index()).await.unwrap();
    assert_eq!(view.step.status, StepStatus::Completed);
    assert_eq!(view.record.response_body["id"], "qr-app");
    assert!(view.record.request_body.get("id").is_none());

    // Earlier steps replay from storage
    let view = navigator.select(StepKind::MedicationRequest.index()).await.unwrap();
    assert_eq!(view.record.response_body["id"], "111112");
    assert_eq!(navigator.active_index(), Some(0));
}

#[tokio::test]
async fn test_claim_follows_answers_from_questionnaire_app() {
    let payer = Payer::start().await;
    let endpoints = payer.endpoints().clone();
    payer
        .respond(&endpoints.medication_request, 201, json!({"id": "111112"}))
        .await;
    payer.respond(&endpoints.prescribe_medication, 200, json!({"cards": []})).await;
    payer.respond(&endpoints.questionnaire_package, 200, package()).await;
    payer
        .respond(
            &endpoints.claim_submit,
            200,
            json!({"resourceType": "Parameters", "parameter": [{"resource": {"outcome": "complete"}}]}),
        )
        .await;
    Mock::given(method("GET"))
        .and(path(endpoints.questionnaire_response.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entry": [{"resource": {"resourceType": "QuestionnaireResponse", "id": "qr-app"}}]
        })))
        .mount(&payer.server)
        .await;

    let mut orchestrator = payer.orchestrator(payer.store());
    orchestrator.start(&jane());
    orchestrator.create_medication_order(&order_form()).await.unwrap();
    orchestrator.check_payer_requirements().await.unwrap();
    let launch = LaunchContext {
        coverage_id: Some("cov-1".into()),
        medication_request_id: Some("111112".into()),
        ..Default::default()
    };
    orchestrator.fetch_questionnaire_package(&launch).await.unwrap();
    assert_eq!(orchestrator.phase(), WorkflowPhase::AnswerPending);

    let mut navigator = payer.navigator(payer.store());
    navigator.select(StepKind::QuestionnaireResponse.index()).await.unwrap();

    // The next invocation restores the run from the file
    let mut resumed = payer.orchestrator(payer.store());
    assert_eq!(resumed.phase(), WorkflowPhase::ClaimPending);
    let claim = resumed.prefilled_claim().unwrap();
    assert!(resumed.submit_claim(&claim).await.unwrap().is_completed());
    assert_eq!(resumed.phase(), WorkflowPhase::Submitted);
}

#[tokio::test]
async fn test_pended_authorization_can_be_followed_up() {
    let payer = Payer::start().await;
    let endpoints = payer.endpoints().clone();
    Mock::given(method("GET"))
        .and(path("/claims"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "pa-1", "patientName": "Jane Doe", "medicationRef": "Aimovig 70 mg Injection",
             "date": "2025-03-02", "status": "active", "outcome": "queued"}
        ])))
        .mount(&payer.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pa-1", endpoints.claim)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Claim",
            "id": "pa-1",
            "patient": {"reference": "Patient/101"},
            "use": "preauthorization",
            "item": [{
                "productOrService": {"coding": [{"display": "Aimovig 70 mg Injection"}]},
                "quantity": {"value": 3},
                "unitPrice": {"value": 600, "currency": "USD"}
            }]
        })))
        .mount(&payer.server)
        .await;

    let client = ClaimsClient::new(
        Arc::new(FhirClient::new(&payer.config.fhir).unwrap()),
        &payer.config.fhir,
    );

    let claims = client.list().await.unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].auth_status(), AuthStatus::Pending);

    let details = client.view(&claims[0].id).await.unwrap();
    assert_eq!(details.patient, "Patient/101");
    assert_eq!(details.use_, "PREAUTHORIZATION");
    assert_eq!(details.unit_price, "600 USD");
}

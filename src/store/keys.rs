// Storage key catalogue for workflow artifacts

/// Keys holding the last captured request/response pair of one workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordKeys {
    pub request: &'static str,
    pub response: &'static str,
    pub url: &'static str,
    pub method: &'static str,
}

impl RecordKeys {
    pub fn all(&self) -> [&'static str; 4] {
        [self.request, self.response, self.url, self.method]
    }
}

pub const MEDICATION_RECORD: RecordKeys = RecordKeys {
    request: "medicationRequest",
    response: "medicationResponse",
    url: "medicationRequestUrl",
    method: "medicationRequestMethod",
};

pub const CDS_RECORD: RecordKeys = RecordKeys {
    request: "cdsRequest",
    response: "cdsResponse",
    url: "cdsRequestUrl",
    method: "cdsRequestMethod",
};

pub const QUESTIONNAIRE_PACKAGE_RECORD: RecordKeys = RecordKeys {
    request: "questionnairePackageRequest",
    response: "questionnairePackageResponse",
    url: "questionnairePackageUrl",
    method: "questionnairePackageRequestMethod",
};

pub const QUESTIONNAIRE_RESPONSE_RECORD: RecordKeys = RecordKeys {
    request: "questionnaireResponseRequest",
    response: "questionnaireResponse",
    url: "questionnaireResponseUrl",
    method: "questionnaireResponseMethod",
};

pub const CLAIM_RECORD: RecordKeys = RecordKeys {
    request: "claimRequest",
    response: "claimResponse",
    url: "claimRequestUrl",
    method: "claimRequestMethod",
};

/// CDS hook name used for the payer check
pub const CDS_HOOK: &str = "cdsHook";

pub const SELECTED_PATIENT_ID: &str = "selectedPatientId";
pub const SELECTED_PATIENT_NAME: &str = "selectedPatientName";
/// Lower bound used when searching for answers authored during this run
pub const TIMESTAMP: &str = "timestamp";
pub const IS_PROCESS: &str = "isProcess";
pub const STEPS: &str = "steps";
pub const ACTIVE_STEP: &str = "activeStep";
pub const WORKFLOW_PHASE: &str = "workflowPhase";
pub const QUESTIONNAIRE_ID: &str = "questionnaireId";
pub const QUESTIONNAIRE_ITEMS: &str = "questionnaireItems";
pub const MEDICATION_FORM_DATA: &str = "medicationFormData";
pub const CDS_CARDS: &str = "cdsCards";
pub const LOGGED_USER: &str = "loggedUser";

// Launch parameters, seeded from the query string
pub const COVERAGE_ID: &str = "coverageId";
pub const MEDICATION_REQUEST_ID: &str = "medicationRequestId";
pub const PATIENT_ID: &str = "patientId";
pub const LAUNCH_QUESTIONNAIRE_ID: &str = "launchQuestionnaireId";

pub const EXPORT_ID: &str = "exportId";

/// Keys belonging to a single prior-authorization run.
///
/// Cleared on restart ("switch patient"); session-wide keys such as
/// [`LOGGED_USER`] are left alone.
pub fn process_keys() -> Vec<&'static str> {
    let mut keys = Vec::new();
    for record in [
        MEDICATION_RECORD,
        CDS_RECORD,
        QUESTIONNAIRE_PACKAGE_RECORD,
        QUESTIONNAIRE_RESPONSE_RECORD,
        CLAIM_RECORD,
    ] {
        keys.extend(record.all());
    }
    keys.extend([
        CDS_HOOK,
        SELECTED_PATIENT_ID,
        SELECTED_PATIENT_NAME,
        TIMESTAMP,
        IS_PROCESS,
        STEPS,
        ACTIVE_STEP,
        WORKFLOW_PHASE,
        QUESTIONNAIRE_ID,
        QUESTIONNAIRE_ITEMS,
        MEDICATION_FORM_DATA,
        CDS_CARDS,
        MEDICATION_REQUEST_ID,
        PATIENT_ID,
    ]);
    keys
}

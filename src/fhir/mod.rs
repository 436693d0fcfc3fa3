// FHIR and CDS Hooks payloads exchanged with the payer

pub mod cds;
pub mod questionnaire;
pub mod resources;

pub use cds::{build_order_sign_request, extract_cards, CdsCard};
pub use questionnaire::{
    build_package_request, build_questionnaire_response, extract_questionnaire, render_fields,
    validate_form, AnswerSet, AnswerValue, FormField, InputKind, ItemKind, QuestionItem,
    Questionnaire, QuestionnaireError,
};
pub use resources::{
    build_claim, build_medication_request, claim_outcome, ClaimForm, FrequencyUnit, MedicationOrderForm,
    PatientSummary, CLAIM_OUTCOME_COMPLETE, MEDICATION_OPTIONS,
};

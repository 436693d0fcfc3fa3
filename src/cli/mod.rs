use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::fhir::FrequencyUnit;

pub mod commands;

#[derive(Parser)]
#[command(name = "prior-auth-flow")]
#[command(about = "Drive a medication prior-authorization run against a payer's FHIR services")]
#[command(long_about = "prior-auth-flow walks one prior-authorization run from medication order \
                       through payer check, questionnaire and claim submission. Every request and \
                       response is kept in a local state file so the run can be resumed or replayed. \
                       Get started with 'prior-auth-flow start --patient-id <ID>'.")]
pub struct Cli {
    /// Workflow state file (overrides storage.state_file_path)
    #[arg(long, global = true, help = "Path of the workflow state file")]
    pub state_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Begin a new prior-authorization run for a patient
    Start {
        #[arg(long, help = "FHIR Patient id")]
        patient_id: String,
        /// Display name; looked up from the Patient resource when omitted
        #[arg(long, help = "Patient display name (skips the Patient lookup)")]
        name: Option<String>,
    },
    /// Create the MedicationRequest for the run
    Order {
        #[arg(long, help = "Condition the medication treats")]
        treating_sickness: String,
        #[arg(long, help = "Medication name, e.g. 'Aimovig 70 mg Injection'")]
        medication: String,
        #[arg(long, default_value = "1", help = "Quantity to dispense")]
        quantity: u32,
        #[arg(long, help = "Doses per frequency unit")]
        frequency: u32,
        #[arg(long, default_value = "mo", help = "Frequency unit: mo, wk or d")]
        frequency_unit: FrequencyUnit,
        #[arg(long, help = "Treatment period, in frequency units")]
        period: u32,
        #[arg(long, help = "Start date (YYYY-MM-DD)")]
        start_date: String,
    },
    /// Ask the payer's CDS service whether prior authorization is required
    CheckPayer,
    /// Fetch the payer's questionnaire package
    Questionnaire {
        #[arg(long, help = "Launch URL or query string carrying coverageId / medicationRequestId")]
        launch_url: Option<String>,
        #[arg(long, help = "Coverage id (overrides the launch context)")]
        coverage_id: Option<String>,
        #[arg(long, help = "MedicationRequest id (overrides the launch context)")]
        medication_request_id: Option<String>,
    },
    /// Answer the questionnaire; lists the questions when no answers are given
    Answer {
        #[arg(long = "answer", value_name = "LINK_ID=VALUE", help = "Answer for one question (repeatable)")]
        answers: Vec<String>,
    },
    /// Submit the prior-authorization claim
    Claim {
        #[arg(long, help = "Unit price with currency, e.g. '600 USD'")]
        unit_price: Option<String>,
        #[arg(long, help = "Claimed quantity (defaults to frequency x period)")]
        quantity: Option<u32>,
        #[arg(long, help = "Provider reference, e.g. PractitionerRole/456")]
        provider: Option<String>,
        #[arg(long, help = "Insurer reference, e.g. Organization/insurance-org")]
        insurer: Option<String>,
        #[arg(long, help = "Supporting QuestionnaireResponse reference")]
        supporting_info: Option<String>,
    },
    /// Show every step and its status
    Steps,
    /// Show the stored request and response of one step
    Replay {
        #[arg(help = "Step number, starting at 1")]
        step: usize,
    },
    /// Wait until answers submitted from the questionnaire app show up
    WatchResponse {
        #[arg(long, help = "Seconds between lookups (defaults to workflow.poll_interval_secs)")]
        interval_secs: Option<u64>,
        #[arg(long, default_value = "300", help = "Give up after this many seconds")]
        timeout_secs: u64,
    },
    /// Discard the current run and keep the session (switch patient)
    Restart,
    /// Clear everything stored for this session
    Logout,
    /// List submitted prior authorizations and their status
    Claims,
    /// Show one submitted claim
    ClaimView {
        #[arg(help = "Claim id, as listed by 'claims'")]
        id: String,
    },
    /// Export a member's data in bulk
    Export {
        #[arg(long, help = "Member id to export")]
        member_id: String,
        #[arg(long, default_value = "Claim", help = "Resource type to fetch once downloaded")]
        resource_type: String,
        #[arg(long, help = "Start the export without waiting for it to finish")]
        no_wait: bool,
        #[arg(long, default_value = "600", help = "Give up waiting after this many seconds")]
        timeout_secs: u64,
    },
}

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::Instrument;

use prior_auth_flow::cli::commands::{
    claim::{ClaimCommand, ClaimOverrides},
    claims::{ClaimViewCommand, ClaimsCommand},
    export::ExportCommand,
    order::OrderCommand,
    payer::CheckPayerCommand,
    questionnaire::{AnswerCommand, QuestionnaireCommand},
    reset::{LogoutCommand, RestartCommand},
    show_how_to_get_started,
    start::StartCommand,
    steps::{ReplayCommand, StepsCommand, WatchResponseCommand},
    Session,
};
use prior_auth_flow::cli::{Cli, Commands};
use prior_auth_flow::fhir::MedicationOrderForm;
use prior_auth_flow::store::keys;
use prior_auth_flow::{config, create_workflow_span, generate_correlation_id, init_config, init_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return show_how_to_get_started();
    };

    let config = config()?;
    if let Err(e) = init_telemetry(&config.observability) {
        eprintln!("⚠️  Logging disabled: {e}");
    }
    init_config()?;

    let session = Session::open(config, cli.state_file)?;
    let span = create_workflow_span(
        command_name(&command),
        session.store.get_string(keys::SELECTED_PATIENT_ID).as_deref(),
        Some(&generate_correlation_id()),
    );

    tokio::runtime::Runtime::new()?.block_on(run(command, session).instrument(span))
}

async fn run(command: Commands, session: Session) -> Result<()> {
    match command {
        Commands::Start { patient_id, name } => {
            StartCommand::new(patient_id)
                .with_name(name)
                .execute(&session)
                .await
        }
        Commands::Order {
            treating_sickness,
            medication,
            quantity,
            frequency,
            frequency_unit,
            period,
            start_date,
        } => {
            let form = MedicationOrderForm {
                treating_sickness,
                medication,
                quantity,
                frequency,
                frequency_unit,
                period,
                start_date,
            };
            OrderCommand::new(form).execute(&session).await
        }
        Commands::CheckPayer => CheckPayerCommand::new().execute(&session).await,
        Commands::Questionnaire {
            launch_url,
            coverage_id,
            medication_request_id,
        } => {
            QuestionnaireCommand::new(launch_url, coverage_id, medication_request_id)
                .execute(&session)
                .await
        }
        Commands::Answer { answers } => AnswerCommand::new(answers).execute(&session).await,
        Commands::Claim {
            unit_price,
            quantity,
            provider,
            insurer,
            supporting_info,
        } => {
            let overrides = ClaimOverrides {
                unit_price,
                quantity,
                provider,
                insurer,
                supporting_info,
            };
            ClaimCommand::new(overrides).execute(&session).await
        }
        Commands::Steps => StepsCommand::new().execute(&session),
        Commands::Replay { step } => ReplayCommand::new(step).execute(&session).await,
        Commands::WatchResponse {
            interval_secs,
            timeout_secs,
        } => {
            WatchResponseCommand::new(
                interval_secs.map(Duration::from_secs),
                Duration::from_secs(timeout_secs),
            )
            .execute(&session)
            .await
        }
        Commands::Restart => RestartCommand::new().execute(&session),
        Commands::Logout => LogoutCommand::new().execute(&session),
        Commands::Claims => ClaimsCommand::new().execute(&session).await,
        Commands::ClaimView { id } => ClaimViewCommand::new(id).execute(&session).await,
        Commands::Export {
            member_id,
            resource_type,
            no_wait,
            timeout_secs,
        } => {
            ExportCommand::new(member_id, resource_type)
                .with_wait(!no_wait, Duration::from_secs(timeout_secs))
                .execute(&session)
                .await
        }
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Start { .. } => "start",
        Commands::Order { .. } => "order",
        Commands::CheckPayer => "check_payer",
        Commands::Questionnaire { .. } => "questionnaire",
        Commands::Answer { .. } => "answer",
        Commands::Claim { .. } => "claim",
        Commands::Steps => "steps",
        Commands::Replay { .. } => "replay",
        Commands::WatchResponse { .. } => "watch_response",
        Commands::Restart => "restart",
        Commands::Logout => "logout",
        Commands::Claims => "claims",
        Commands::ClaimView { .. } => "claim_view",
        Commands::Export { .. } => "export",
    }
}

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for prior-auth-flow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PriorAuthFlowConfig {
    /// FHIR / CDS server settings
    pub fhir: FhirConfig,
    /// Workflow defaults
    pub workflow: WorkflowConfig,
    /// Where the workflow store lives
    pub storage: StorageConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FhirConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,
    /// Base URL shown in replayed request URLs
    pub demo_base_url: String,
    /// Webhook server that tracks submitted prior-authorization claims
    pub webhook_server_url: String,
    pub endpoints: EndpointConfig,
    pub timeout_seconds: u64,
    pub rate_limit: RateLimitConfig,
    /// Patient lookup cache lifetime
    pub patient_cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub medication_request: String,
    pub prescribe_medication: String,
    pub questionnaire_package: String,
    pub questionnaire_response: String,
    pub claim_submit: String,
    /// Claim resources, read back by id
    pub claim: String,
    pub patient: String,
    pub bulk_export: String,
    pub export_status: String,
    pub export_fetch: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// PractitionerRole id used as requester / author
    pub practitioner_id: String,
    /// Pause between fetching the package and opening the answer step
    pub stage_delay_ms: u64,
    /// Interval for response and export polling
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub state_file_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// JSON lines instead of human-readable output
    pub json_logs: bool,
}

const SERVICE_PREFIX: &str = "/choreo-apis/cms-0057-f";

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            medication_request: format!(
                "{SERVICE_PREFIX}/medication-request-ser-tw/v1/fhir/r4/MedicationRequest"
            ),
            prescribe_medication: format!(
                "{SERVICE_PREFIX}/cds-service-qn/v1/cds-services/prescirbe-medication"
            ),
            questionnaire_package: format!(
                "{SERVICE_PREFIX}/questionnaire-package-wp/v1/fhir/r4/Questionnaire/questionnaire-package"
            ),
            questionnaire_response: format!(
                "{SERVICE_PREFIX}/questionnaire-response-fh/v1/fhir/r4/QuestionnaireResponse"
            ),
            claim_submit: format!("{SERVICE_PREFIX}/claim-submission-servi-hk/v1/fhir/r4/Claim/submit"),
            claim: "/choreo-apis/cms-paas/fhir-service-fm/v1/Claim".to_string(),
            patient: format!("{SERVICE_PREFIX}/patient-service/v1.0/fhir/r4/Patient"),
            bulk_export: format!("{SERVICE_PREFIX}/bulk-export-client/v1.0/export"),
            export_status: format!("{SERVICE_PREFIX}/bulk-export-client/v1.0/status"),
            export_fetch: format!("{SERVICE_PREFIX}/bulk-export-client/file-service/v1.0/fetch"),
        }
    }
}

impl Default for PriorAuthFlowConfig {
    fn default() -> Self {
        Self {
            fhir: FhirConfig {
                base_url: "https://unitedcare.com".to_string(),
                demo_base_url: "https://unitedcare.com".to_string(),
                webhook_server_url: "http://localhost:9099".to_string(),
                endpoints: EndpointConfig::default(),
                timeout_seconds: 30,
                rate_limit: RateLimitConfig {
                    requests_per_second: 5,
                    burst_capacity: 10,
                },
                patient_cache_ttl_seconds: 300,
            },
            workflow: WorkflowConfig {
                practitioner_id: "456".to_string(),
                stage_delay_ms: 1000,
                poll_interval_secs: 5,
            },
            storage: StorageConfig {
                state_file_path: ".prior-auth-flow/workflow-state.json".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
            },
        }
    }
}

impl WorkflowConfig {
    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl PriorAuthFlowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (prior-auth-flow.toml, .prior-auth-flow-rc)
    /// 3. Environment variables (PRIOR_AUTH_FLOW_ prefix, `__` between sections)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("prior-auth-flow.toml").exists() {
            builder = builder.add_source(File::with_name("prior-auth-flow"));
        }

        if Path::new(".prior-auth-flow-rc").exists() {
            builder = builder.add_source(
                File::with_name(".prior-auth-flow-rc").format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("PRIOR_AUTH_FLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<PriorAuthFlowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = PriorAuthFlowConfig::load_env_file();
        PriorAuthFlowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static PriorAuthFlowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let config = config()?;
    tracing::info!(
        base_url = %config.fhir.base_url,
        state_file = %config.storage.state_file_path,
        "Configuration loaded successfully"
    );
    Ok(())
}

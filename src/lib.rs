// prior-auth-flow library - medication prior-authorization workflow
// This exposes the core components for testing and integration

pub mod claims;
pub mod cli;
pub mod config;
pub mod export;
pub mod fhir;
pub mod http;
pub mod launch;
pub mod navigator;
pub mod notifications;
pub mod polling;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use claims::{AuthStatus, ClaimDetails, ClaimsClient, ClaimsError, PriorAuthSummary};
pub use config::{config, init_config, PriorAuthFlowConfig};
pub use export::{BulkExportClient, ExportError};
pub use http::{FhirClient, FhirError, FhirGateway};
pub use launch::{LaunchContext, LaunchError};
pub use navigator::{NavigatorError, NavigatorSettings, ReplayView, ResponseLookup, StepNavigator};
pub use notifications::{Notification, Notifier, Severity};
pub use polling::{PollStatus, ScopedPoller};
pub use store::{FileStore, MemoryStore, StoreError, WorkflowStore};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    OrchestratorSettings, PhaseEvent, PhaseMachine, PriorAuthOrchestrator, StepKind, StepOutcome,
    StepRecord, StepStatus, StepTracker, WorkflowError, WorkflowPhase, WorkflowStep,
};

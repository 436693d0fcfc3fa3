// Prior-authorization workflow: step tracking, phase machine and orchestration

pub mod orchestrator;
pub mod phase;
pub mod tracker;
pub mod types;

pub use orchestrator::{OrchestratorSettings, PriorAuthOrchestrator, StepOutcome, WorkflowError};
pub use phase::{PhaseEvent, PhaseMachine, WorkflowPhase};
pub use tracker::{StepTracker, TrackerError};
pub use types::{HttpMethod, StepKind, StepRecord, StepStatus, WorkflowStep};

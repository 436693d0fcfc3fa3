use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{error, info};

/// Where a prior-authorization run stands, one phase per pending action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkflowPhase {
    #[default]
    MedicationOrderPending,
    PayerCheckPending,
    QuestionnairePending,
    AnswerPending,
    ClaimPending,
    Submitted,
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowPhase::MedicationOrderPending => "waiting for medication order",
            WorkflowPhase::PayerCheckPending => "waiting for payer check",
            WorkflowPhase::QuestionnairePending => "waiting for questionnaire package",
            WorkflowPhase::AnswerPending => "waiting for questionnaire answers",
            WorkflowPhase::ClaimPending => "ready to submit claim",
            WorkflowPhase::Submitted => "claim submitted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseEvent {
    OrderCreated,
    PayerChecked,
    PackageFetched,
    ResponseSubmitted,
    ClaimSubmitted,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid transition: {event:?} not allowed while {phase}")]
pub struct PhaseError {
    pub phase: WorkflowPhase,
    pub event: PhaseEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransitionRecord {
    pub from: WorkflowPhase,
    pub to: WorkflowPhase,
    pub event: PhaseEvent,
    pub timestamp: DateTime<Utc>,
}

/// Phase state machine with an audit trail of transitions
#[derive(Debug, Clone, Default)]
pub struct PhaseMachine {
    current: WorkflowPhase,
    history: Vec<PhaseTransitionRecord>,
}

impl PhaseMachine {
    pub fn new(current: WorkflowPhase) -> Self {
        Self {
            current,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> WorkflowPhase {
        self.current
    }

    pub fn history(&self) -> &[PhaseTransitionRecord] {
        &self.history
    }

    /// Phase reached by `event` from the current phase, without applying it
    pub fn next(&self, event: PhaseEvent) -> Result<WorkflowPhase, PhaseError> {
        use PhaseEvent::*;
        use WorkflowPhase::*;

        let next = match (self.current, event) {
            (_, Restart) => MedicationOrderPending,

            (MedicationOrderPending, OrderCreated) => PayerCheckPending,
            (PayerCheckPending, PayerChecked) => QuestionnairePending,
            (QuestionnairePending, PackageFetched) => AnswerPending,
            (AnswerPending, ResponseSubmitted) => ClaimPending,
            (ClaimPending, ClaimSubmitted) => Submitted,

            (phase, event) => {
                error!(phase = ?phase, event = ?event, "Invalid workflow phase transition");
                return Err(PhaseError { phase, event });
            }
        };
        Ok(next)
    }

    pub fn handle_event(&mut self, event: PhaseEvent) -> Result<WorkflowPhase, PhaseError> {
        let to = self.next(event)?;
        self.record_transition(to, event);
        Ok(to)
    }

    fn record_transition(&mut self, to: WorkflowPhase, event: PhaseEvent) {
        let record = PhaseTransitionRecord {
            from: self.current,
            to,
            event,
            timestamp: Utc::now(),
        };

        info!(
            from_phase = ?record.from,
            to_phase = ?record.to,
            event = ?record.event,
            "Workflow phase transition"
        );

        self.history.push(record);
        self.current = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_happy_path() {
        let mut machine = PhaseMachine::default();
        for event in [
            PhaseEvent::OrderCreated,
            PhaseEvent::PayerChecked,
            PhaseEvent::PackageFetched,
            PhaseEvent::ResponseSubmitted,
            PhaseEvent::ClaimSubmitted,
        ] {
            machine.handle_event(event).unwrap();
        }
        assert_eq!(machine.current(), WorkflowPhase::Submitted);
        assert_eq!(machine.history().len(), 5);
    }

    #[test]
    fn test_skipping_ahead_is_rejected() {
        let mut machine = PhaseMachine::default();
        let err = machine.handle_event(PhaseEvent::ClaimSubmitted).unwrap_err();
        assert_eq!(err.phase, WorkflowPhase::MedicationOrderPending);
        assert_eq!(machine.current(), WorkflowPhase::MedicationOrderPending);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_second_claim_is_rejected() {
        let mut machine = PhaseMachine::new(WorkflowPhase::ClaimPending);
        assert_ok!(machine.handle_event(PhaseEvent::ClaimSubmitted));
        assert_err!(machine.handle_event(PhaseEvent::ClaimSubmitted));
    }

    #[test]
    fn test_restart_from_anywhere() {
        let mut machine = PhaseMachine::new(WorkflowPhase::Submitted);
        assert_eq!(
            machine.handle_event(PhaseEvent::Restart).unwrap(),
            WorkflowPhase::MedicationOrderPending
        );
    }
}

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{StepKind, StepStatus, WorkflowStep};
use crate::store::{self, keys, WorkflowStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Invalid status transition for step '{step}': {from} -> {to}")]
    InvalidTransition {
        step: String,
        from: StepStatus,
        to: StepStatus,
    },

    #[error("Step index {index} out of range ({len} steps)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Ordered list of workflow steps with their statuses.
///
/// Every mutation is mirrored into the store under `steps` / `activeStep`.
pub struct StepTracker {
    store: Arc<dyn WorkflowStore>,
    steps: Vec<WorkflowStep>,
    active_step: Option<usize>,
}

impl std::fmt::Debug for StepTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepTracker")
            .field("steps", &self.steps)
            .field("active_step", &self.active_step)
            .finish()
    }
}

impl StepTracker {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            store,
            steps: Vec::new(),
            active_step: None,
        }
    }

    /// Rebuild the tracker from the store, falling back to the default template.
    ///
    /// The fallback lives in memory only; nothing is written until a step
    /// changes, so restoring never recreates keys of a cleared run.
    pub fn restore(store: Arc<dyn WorkflowStore>) -> Self {
        let steps: Option<Vec<WorkflowStep>> = store::load(store.as_ref(), keys::STEPS);
        let active: Option<i64> = store::load(store.as_ref(), keys::ACTIVE_STEP);

        let mut tracker = Self::new(store);
        match steps {
            Some(steps) if !steps.is_empty() => {
                debug!(steps = steps.len(), "Restored workflow steps from store");
                tracker.steps = steps;
                tracker.active_step = active
                    .and_then(|i| usize::try_from(i).ok())
                    .filter(|i| *i < tracker.steps.len());
            }
            _ => {
                debug!("No stored steps; using the step template");
                tracker.steps = StepKind::template().iter().map(WorkflowStep::new).collect();
            }
        }
        tracker
    }

    /// Create every named step at `NotStarted`
    pub fn initialize(&mut self, names: &[String]) -> Vec<WorkflowStep> {
        self.steps = names.iter().map(WorkflowStep::new).collect();
        self.active_step = None;
        self.mirror();
        info!(steps = self.steps.len(), "Workflow steps initialized");
        self.steps.clone()
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn status_of(&self, name: &str) -> Option<StepStatus> {
        self.steps.iter().find(|s| s.name == name).map(|s| s.status)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_step
    }

    /// Set the status of the named step.
    ///
    /// Unknown names are a silent no-op. Moves not in the transition table
    /// are rejected and leave the list unchanged.
    pub fn set_status(&mut self, name: &str, status: StepStatus) -> Result<(), TrackerError> {
        let Some(step) = self.steps.iter_mut().find(|s| s.name == name) else {
            debug!(step = %name, "Ignoring status update for unknown step");
            return Ok(());
        };

        if !step.status.can_transition_to(status) {
            warn!(
                step = %name,
                from = ?step.status,
                to = ?status,
                "Rejected out-of-order step transition"
            );
            return Err(TrackerError::InvalidTransition {
                step: name.to_string(),
                from: step.status,
                to: status,
            });
        }

        let previous = step.status;
        step.status = status;
        self.mirror();
        info!(step = %name, from = ?previous, to = ?status, "Step status updated");
        Ok(())
    }

    /// Bring the named step to `Completed`, passing through `InProgress` if needed
    pub fn complete(&mut self, name: &str) -> Result<(), TrackerError> {
        if self.status_of(name) == Some(StepStatus::NotStarted) {
            self.set_status(name, StepStatus::InProgress)?;
        }
        self.set_status(name, StepStatus::Completed)
    }

    /// Bulk overwrite, used when restoring a saved list
    pub fn replace_all(&mut self, steps: Vec<WorkflowStep>) {
        self.steps = steps;
        if self.active_step.is_some_and(|i| i >= self.steps.len()) {
            self.active_step = None;
        }
        self.mirror();
    }

    /// Record which step the navigator displays; independent of status
    pub fn set_active_index(&mut self, index: Option<usize>) -> Result<(), TrackerError> {
        if let Some(i) = index {
            if i >= self.steps.len() {
                return Err(TrackerError::IndexOutOfRange {
                    index: i,
                    len: self.steps.len(),
                });
            }
        }
        self.active_step = index;
        self.mirror();
        Ok(())
    }

    /// Every step back to `NotStarted`
    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.status = StepStatus::NotStarted;
        }
        self.active_step = None;
        self.mirror();
    }

    fn mirror(&self) {
        store::save(self.store.as_ref(), keys::STEPS, &self.steps);
        let active = self.active_step.map(|i| i as i64).unwrap_or(-1);
        store::save(self.store.as_ref(), keys::ACTIVE_STEP, &active);
    }
}

use crate::model::{ActionStep, Protocol};

/// Ordered steps of the current protocol plus their completion flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionChecklist {
    steps: Vec<ActionStep>,
}

impl ActionChecklist {
    #[must_use]
    pub fn from_protocol(protocol: &Protocol) -> Self {
        Self {
            steps: protocol.steps.iter().map(ActionStep::from).collect(),
        }
    }

    /// Swaps in a new protocol's steps. All completion flags start cleared.
    pub fn replace(&mut self, protocol: &Protocol) {
        *self = Self::from_protocol(protocol);
    }

    /// Flips one step. Returns the new flag, or `None` for an unknown id.
    pub fn toggle(&mut self, step_id: &str) -> Option<bool> {
        let step = self.steps.iter_mut().find(|s| s.id == step_id)?;
        step.completed = !step.completed;
        Some(step.completed)
    }

    #[must_use]
    pub fn steps(&self) -> &[ActionStep] {
        &self.steps
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.completed).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ActionStep> {
        self.steps.clone()
    }
}

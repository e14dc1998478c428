//! Step status tracking across decode batches.

use super::types::{Step, StepStatus};

/// Authoritative ordered sequence of every step seen in a session.
///
/// Batches are appended, never replacing earlier ones. Completion is
/// one-way: a completed step is never handed out as pending again.
#[derive(Debug, Clone, Default)]
pub struct StepTracker {
    steps: Vec<Step>,
}

impl StepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoded batch, assigning sequential ids.
    ///
    /// Incoming steps are reset to pending regardless of the status they
    /// were decoded with. Returns the ids assigned to the batch.
    pub fn append_batch(
        &mut self,
        steps: impl IntoIterator<Item = Step>,
    ) -> std::ops::Range<usize> {
        let start = self.steps.len();
        for mut step in steps {
            step.id = self.steps.len();
            step.status = StepStatus::Pending;
            self.steps.push(step);
        }
        start..self.steps.len()
    }

    /// All pending steps, in insertion order.
    pub fn pending_steps(&self) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.is_pending()).collect()
    }

    /// Flip every pending step to completed. Returns how many were flipped.
    pub fn mark_all_pending_completed(&mut self) -> usize {
        let mut flipped = 0;
        for step in self.steps.iter_mut().filter(|s| s.is_pending()) {
            step.status = StepStatus::Completed;
            flipped += 1;
        }
        flipped
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_completed()).count()
    }

    pub fn has_pending(&self) -> bool {
        self.steps.iter().any(Step::is_pending)
    }
}

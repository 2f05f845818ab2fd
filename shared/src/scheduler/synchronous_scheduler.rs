use crate::{lifetime::lifetime::Action, scheduler::Scheduler};

/// Runs every action inline on the submitting thread
#[derive(Debug, Default, Clone, Copy)]
pub struct SynchronousScheduler;

impl Scheduler for SynchronousScheduler {
    fn name(&self) -> &str {
        "SynchronousScheduler"
    }

    fn queue(&self, action: Action) {
        action();
    }

    fn is_active(&self) -> bool {
        true
    }
}

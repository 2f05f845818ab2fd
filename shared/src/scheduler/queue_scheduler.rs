use std::{
    collections::VecDeque,
    thread::{self, ThreadId},
};

use parking_lot::Mutex;

use crate::{lifetime::lifetime::Action, scheduler::Scheduler};

/// Collects actions until [`QueueScheduler::pump`] is called.
///
/// The thread that creates the scheduler is its execution context. Useful for embedding a
/// protocol into a host loop and for stepping through message arrival deterministically.
pub struct QueueScheduler {
    name: String,
    owner: ThreadId,
    queue: Mutex<VecDeque<Action>>,
}

impl QueueScheduler {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: thread::current().id(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs queued actions, including ones queued while pumping, until the queue is empty.
    /// Returns how many ran.
    pub fn pump(&self) -> usize {
        let mut executed = 0;
        loop {
            let next = self.queue.lock().pop_front();
            match next {
                Some(action) => {
                    action();
                    executed += 1;
                }
                None => return executed,
            }
        }
    }

    /// Runs a single queued action, if any
    pub fn pump_one(&self) -> bool {
        let next = self.queue.lock().pop_front();
        match next {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }
}

impl Scheduler for QueueScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn queue(&self, action: Action) {
        self.queue.lock().push_back(action);
    }

    fn is_active(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn flush(&self) {
        if self.is_active() {
            self.pump();
        }
    }
}

use std::{
    io,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Weak},
    thread::{self, JoinHandle, ThreadId},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{error, trace};
use parking_lot::Mutex;

use crate::{
    lifetime::lifetime::{Action, Lifetime},
    scheduler::Scheduler,
};

enum Job {
    Run(Action),
    Flush(Sender<()>),
}

/// Executes actions in order on one dedicated worker thread. The worker stops when the
/// lifetime passed to [`ThreadScheduler::new`] terminates.
pub struct ThreadScheduler {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn new(lifetime: &Lifetime, name: &str) -> io::Result<Arc<Self>> {
        let (sender, receiver) = unbounded::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(receiver))?;

        let scheduler = Arc::new(Self {
            name: name.to_string(),
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        });

        let weak: Weak<Self> = Arc::downgrade(&scheduler);
        lifetime.on_termination(move || {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.shutdown();
            }
        });

        Ok(scheduler)
    }

    /// Stops accepting work, lets the worker drain what is queued and joins it
    pub fn shutdown(&self) {
        self.sender.lock().take();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if thread::current().id() == self.thread_id {
                return;
            }
            if handle.join().is_err() {
                error!("Scheduler thread `{}` panicked", self.name);
            }
        }
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    for job in receiver {
        match job {
            Job::Run(action) => {
                if catch_unwind(AssertUnwindSafe(action)).is_err() {
                    error!(
                        "Action panicked on scheduler thread `{}`",
                        thread::current().name().unwrap_or("<unnamed>")
                    );
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn queue(&self, action: Action) {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(Job::Run(action)).is_err() {
                    trace!("Scheduler `{}` is stopped, dropping action", self.name);
                }
            }
            None => trace!("Scheduler `{}` is stopped, dropping action", self.name),
        }
    }

    fn is_active(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn flush(&self) {
        if self.is_active() {
            return;
        }
        let (done_sender, done_receiver) = unbounded();
        let sent = self
            .sender
            .lock()
            .as_ref()
            .map(|sender| sender.send(Job::Flush(done_sender)).is_ok())
            .unwrap_or(false);
        if sent {
            let _ = done_receiver.recv();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::lifetime::lifetime::LifetimeDefinition;

    #[test]
    fn runs_in_order_on_worker_thread() {
        let definition = LifetimeDefinition::new();
        let scheduler = ThreadScheduler::new(&definition, "worker").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for value in 0..50 {
            let log = log.clone();
            let check = scheduler.clone();
            scheduler.queue(Box::new(move || {
                assert!(check.is_active());
                log.lock().push(value);
            }));
        }
        scheduler.flush();

        assert_eq!(*log.lock(), (0..50).collect::<Vec<_>>());
        assert!(!scheduler.is_active());
        definition.terminate();
    }

    #[test]
    fn termination_drains_and_stops() {
        let definition = LifetimeDefinition::new();
        let scheduler = ThreadScheduler::new(&definition, "worker").unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let before = counter.clone();
        scheduler.queue(Box::new(move || {
            before.fetch_add(1, Ordering::SeqCst);
        }));
        definition.terminate();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let after = counter.clone();
        scheduler.queue(Box::new(move || {
            after.fetch_add(1, Ordering::SeqCst);
        }));
        scheduler.flush();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

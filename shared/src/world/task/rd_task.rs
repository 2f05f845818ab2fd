use std::{sync::Arc, time::Duration};

use parking_lot::{Condvar, Mutex};

use crate::{
    lifetime::lifetime::Lifetime, reactive::signal::Signal, world::task::task_result::RdTaskResult,
};

struct TaskInner<T> {
    result: Mutex<Option<RdTaskResult<T>>>,
    completed: Condvar,
    completion: Signal<RdTaskResult<T>>,
}

/// Completion handle for a remote call. The first result set wins; later ones are ignored.
pub struct RdTask<T> {
    inner: Arc<TaskInner<T>>,
}

impl<T> Clone for RdTask<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for RdTask<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> RdTask<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TaskInner {
                result: Mutex::new(None),
                completed: Condvar::new(),
                completion: Signal::new(),
            }),
        }
    }

    /// An already completed task
    pub fn from_result(result: RdTaskResult<T>) -> Self {
        let task = Self::new();
        task.set_if_empty(result);
        task
    }

    pub fn success(value: T) -> Self {
        Self::from_result(RdTaskResult::Success(value))
    }

    pub fn result(&self) -> Option<RdTaskResult<T>> {
        self.inner.result.lock().clone()
    }

    pub fn is_completed(&self) -> bool {
        self.inner.result.lock().is_some()
    }

    /// Completes the task unless it already has a result. Returns whether `result` was taken.
    pub fn set_if_empty(&self, result: RdTaskResult<T>) -> bool {
        {
            let mut slot = self.inner.result.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(result.clone());
            self.inner.completed.notify_all();
        }
        self.inner.completion.fire(&result);
        true
    }

    pub fn cancel(&self) -> bool {
        self.set_if_empty(RdTaskResult::Cancelled)
    }

    /// Blocks until the task completes or `timeout` elapses
    pub fn wait(&self, timeout: Duration) -> Option<RdTaskResult<T>> {
        let mut slot = self.inner.result.lock();
        if slot.is_none() {
            let _ = self
                .inner
                .completed
                .wait_while_for(&mut slot, |slot| slot.is_none(), timeout);
        }
        slot.clone()
    }

    /// Calls `handler` once with the result, right away when the task is already completed
    pub fn advise<F>(&self, lifetime: &Lifetime, handler: F)
    where
        F: Fn(&RdTaskResult<T>) + Send + Sync + 'static,
    {
        let existing = {
            let slot = self.inner.result.lock();
            if slot.is_none() {
                // registered under the lock, so a concurrent completion reaches the listener
                self.inner.completion.advise(lifetime, handler);
                return;
            }
            slot.clone()
        };
        if let Some(result) = existing {
            lifetime.execute_if_alive(|| handler(&result));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::lifetime::lifetime::LifetimeDefinition;

    #[test]
    fn first_result_wins() {
        let task = RdTask::new();
        assert!(task.set_if_empty(RdTaskResult::Success(1)));
        assert!(!task.cancel());
        assert_eq!(task.result(), Some(RdTaskResult::Success(1)));
    }

    #[test]
    fn wait_returns_result_set_from_another_thread() {
        let task = RdTask::new();
        let remote = task.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.set_if_empty(RdTaskResult::Success("done".to_string()));
        });
        assert_eq!(
            task.wait(Duration::from_secs(5)),
            Some(RdTaskResult::Success("done".to_string()))
        );
        worker.join().unwrap();
    }

    #[test]
    fn wait_times_out_without_result() {
        let task = RdTask::<i32>::new();
        assert_eq!(task.wait(Duration::from_millis(10)), None);
    }

    #[test]
    fn advise_sees_past_and_future_results() {
        let definition = LifetimeDefinition::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let completed = RdTask::success(5);
        let log = seen.clone();
        completed.advise(&definition, move |result| log.lock().push(result.clone()));

        let pending = RdTask::new();
        let log = seen.clone();
        pending.advise(&definition, move |result| log.lock().push(result.clone()));
        pending.cancel();

        assert_eq!(
            *seen.lock(),
            vec![RdTaskResult::Success(5), RdTaskResult::Cancelled]
        );
    }
}

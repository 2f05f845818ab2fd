use crate::lifetime::lifetime::Action;

pub mod queue_scheduler;
pub mod synchronous_scheduler;
pub mod thread_scheduler;

/// Executes actions on behalf of a protocol or a subscription.
///
/// Each protocol owns exactly one scheduler; entities bound under it are expected to be mutated
/// only while [`Scheduler::is_active`] holds.
pub trait Scheduler: Send + Sync {
    fn name(&self) -> &str;

    /// Submits an action. Whether it runs now or later depends on the implementation.
    fn queue(&self, action: Action);

    /// Whether the current thread is this scheduler's execution context
    fn is_active(&self) -> bool;

    /// Schedulers that do not preserve submission order may skip the broker's reordering buffer
    fn out_of_order_execution(&self) -> bool {
        false
    }

    /// Blocks until everything queued so far has run
    fn flush(&self) {}
}

use std::{
    thread,
    time::{Duration, Instant},
};

/// Routes `log` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Polls `condition` every few milliseconds until it holds or `timeout` elapses
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Assert that a condition becomes true within a timeout, for tests on thread schedulers
#[macro_export]
macro_rules! assert_eventually {
    ($timeout:expr, $condition:expr) => {
        assert!(
            $crate::wait_until($timeout, || $condition),
            "Condition `{}` did not hold within {:?}",
            stringify!($condition),
            $timeout
        );
    };
}

/// Assert that a task has completed with the given result kind
#[macro_export]
macro_rules! assert_task_kind {
    ($task:expr, $kind:expr) => {
        match $task.result() {
            Some(result) => assert_eq!(
                result.kind_name(),
                $kind,
                "Task completed with {:?}",
                result
            ),
            None => panic!("Task has not completed, expected {}", $kind),
        }
    };
}

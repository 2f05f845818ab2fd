use std::{
    fmt,
    ops::Deref,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock, Weak,
    },
};

use log::error;
use parking_lot::Mutex;

pub type Action = Box<dyn FnOnce() + Send>;

static NEXT_LIFETIME_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifetimeStatus {
    Alive,
    Terminating,
    Terminated,
}

struct LifetimeState {
    status: LifetimeStatus,
    actions: Vec<(u64, Action)>,
    next_action_key: u64,
}

struct LifetimeInner {
    id: u64,
    eternal: bool,
    state: Mutex<LifetimeState>,
}

impl LifetimeInner {
    fn new(eternal: bool, status: LifetimeStatus) -> Self {
        Self {
            id: NEXT_LIFETIME_ID.fetch_add(1, Ordering::Relaxed),
            eternal,
            state: Mutex::new(LifetimeState {
                status,
                actions: Vec::new(),
                next_action_key: 0,
            }),
        }
    }
}

/// A cancellation scope.
///
/// Actions registered with [`Lifetime::on_termination`] run exactly once, in reverse order of
/// registration, when the owning [`LifetimeDefinition`] terminates. Lifetimes nest: a child
/// created with [`Lifetime::create_nested`] terminates no later than its parent.
#[derive(Clone)]
pub struct Lifetime {
    inner: Arc<LifetimeInner>,
}

impl Lifetime {
    /// A lifetime that never terminates. Actions registered on it are dropped.
    pub fn eternal() -> Lifetime {
        static ETERNAL: OnceLock<Lifetime> = OnceLock::new();
        ETERNAL
            .get_or_init(|| Lifetime {
                inner: Arc::new(LifetimeInner::new(true, LifetimeStatus::Alive)),
            })
            .clone()
    }

    /// A lifetime that is already over. Actions registered on it run immediately.
    pub fn terminated() -> Lifetime {
        static TERMINATED: OnceLock<Lifetime> = OnceLock::new();
        TERMINATED
            .get_or_init(|| Lifetime {
                inner: Arc::new(LifetimeInner::new(false, LifetimeStatus::Terminated)),
            })
            .clone()
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn status(&self) -> LifetimeStatus {
        self.inner.state.lock().status
    }

    pub fn is_alive(&self) -> bool {
        self.status() == LifetimeStatus::Alive
    }

    pub fn is_eternal(&self) -> bool {
        self.inner.eternal
    }

    /// Registers `action` if the lifetime is still alive. Returns `false` (and drops the
    /// action) otherwise.
    pub fn on_termination_if_alive<F: FnOnce() + Send + 'static>(&self, action: F) -> bool {
        self.try_add(Box::new(action)).is_ok()
    }

    /// Registers `action`, or runs it right away when the lifetime is no longer alive.
    pub fn on_termination<F: FnOnce() + Send + 'static>(&self, action: F) {
        if let Err(action) = self.try_add(Box::new(action)) {
            run_action(action);
        }
    }

    /// Registers `teardown` and then runs `setup`. Returns `None` without running either when
    /// the lifetime is not alive. The teardown is registered before `setup` runs, so it fires on
    /// termination even if `setup` panicked.
    pub fn bracket<T, S, D>(&self, setup: S, teardown: D) -> Option<T>
    where
        S: FnOnce() -> T,
        D: FnOnce() + Send + 'static,
    {
        if self.try_add(Box::new(teardown)).is_err() {
            return None;
        }
        Some(setup())
    }

    pub fn execute_if_alive<T, F: FnOnce() -> T>(&self, action: F) -> Option<T> {
        if self.is_alive() {
            Some(action())
        } else {
            None
        }
    }

    /// Creates a child lifetime. When the child terminates first it unregisters itself from
    /// this lifetime.
    pub fn create_nested(&self) -> LifetimeDefinition {
        let child = LifetimeDefinition::new();
        if !self.adopt(&child.lifetime) {
            child.terminate();
        }
        child
    }

    /// A lifetime that ends as soon as either `self` or `other` ends
    pub fn intersect(&self, other: &Lifetime) -> LifetimeDefinition {
        let definition = self.create_nested();
        if !other.adopt(&definition.lifetime) {
            definition.terminate();
        }
        definition
    }

    /// Makes `child` end with `self`; the registration is dropped again if `child` ends first.
    /// Returns `false` when `self` is already over.
    fn adopt(&self, child: &Lifetime) -> bool {
        let target = child.clone();
        let terminate_child: Action = Box::new(move || {
            target.terminate_inner();
        });

        let key = match self.try_add(terminate_child) {
            Ok(key) => key,
            Err(_) => return false,
        };
        if !self.inner.eternal {
            let parent: Weak<LifetimeInner> = Arc::downgrade(&self.inner);
            child.on_termination(move || {
                if let Some(parent) = parent.upgrade() {
                    let mut state = parent.state.lock();
                    state.actions.retain(|(action_key, _)| *action_key != key);
                }
            });
        }
        true
    }

    fn try_add(&self, action: Action) -> Result<u64, Action> {
        let mut state = self.inner.state.lock();
        if state.status != LifetimeStatus::Alive {
            return Err(action);
        }
        if self.inner.eternal {
            return Ok(0);
        }
        let key = state.next_action_key;
        state.next_action_key += 1;
        state.actions.push((key, action));
        Ok(key)
    }

    fn terminate_inner(&self) -> bool {
        if self.inner.eternal {
            return false;
        }
        let actions = {
            let mut state = self.inner.state.lock();
            if state.status != LifetimeStatus::Alive {
                return false;
            }
            state.status = LifetimeStatus::Terminating;
            std::mem::take(&mut state.actions)
        };

        for (_, action) in actions.into_iter().rev() {
            run_action(action);
        }

        // actions registered while terminating ran immediately, so nothing is left behind
        self.inner.state.lock().status = LifetimeStatus::Terminated;
        true
    }

    /// Number of termination actions currently registered
    pub fn action_count(&self) -> usize {
        self.inner.state.lock().actions.len()
    }
}

impl PartialEq for Lifetime {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Lifetime {}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}

fn run_action(action: Action) {
    if catch_unwind(AssertUnwindSafe(action)).is_err() {
        error!("Termination action panicked; continuing with the remaining actions");
    }
}

/// The owning side of a [`Lifetime`]: the only handle that can terminate it
pub struct LifetimeDefinition {
    lifetime: Lifetime,
}

impl LifetimeDefinition {
    pub fn new() -> Self {
        Self {
            lifetime: Lifetime {
                inner: Arc::new(LifetimeInner::new(false, LifetimeStatus::Alive)),
            },
        }
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// Runs every registered action in reverse order. Calling this again, including from
    /// inside one of the actions, is a no-op that returns `false`.
    pub fn terminate(&self) -> bool {
        self.lifetime.terminate_inner()
    }
}

impl Default for LifetimeDefinition {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for LifetimeDefinition {
    type Target = Lifetime;

    fn deref(&self) -> &Self::Target {
        &self.lifetime
    }
}

impl fmt::Debug for LifetimeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LifetimeDefinition").field(&self.lifetime).finish()
    }
}

use std::{cell::Cell, marker::PhantomData};

thread_local! {
    static BINDING_ALLOWED: Cell<usize> = const { Cell::new(0) };
}

/// While a `BindingScope` is alive on a thread, entities may be pre-bound and bound from that
/// thread even though it is not their protocol's scheduler thread.
///
/// Scopes nest. The token is neither `Send` nor `Sync`: it has to be dropped on the thread that
/// entered it.
pub struct BindingScope {
    _not_send: PhantomData<*const ()>,
}

impl BindingScope {
    pub fn enter() -> Self {
        BINDING_ALLOWED.with(|allowed| allowed.set(allowed.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }

    pub fn is_active() -> bool {
        BINDING_ALLOWED.with(|allowed| allowed.get() > 0)
    }

    /// Runs `action` inside a scope
    pub fn run<T>(action: impl FnOnce() -> T) -> T {
        let _scope = Self::enter();
        action()
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        BINDING_ALLOWED.with(|allowed| allowed.set(allowed.get().saturating_sub(1)));
    }
}

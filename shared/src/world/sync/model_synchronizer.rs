use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{error, trace};

use crate::{
    lifetime::lifetime::Lifetime,
    world::{
        entity::{
            bind_state::BindState, bindable::Bindable, lifecycle, rd_value::RdValue,
        },
        sync::{
            entity_view::{EntityKind, EntityView},
            error::SyncError,
        },
    },
};

/// Suppresses the echo of a change while it is being copied to the other side of a pair
#[derive(Clone, Default)]
pub struct SyncGuard {
    busy: Arc<AtomicBool>,
}

struct GuardRelease<'a>(&'a AtomicBool);

impl Drop for GuardRelease<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `action` unless this guard is already inside another `run`
    pub fn run<F: FnOnce()>(&self, action: F) {
        if self.busy.swap(true, Ordering::AcqRel) {
            return;
        }
        let _release = GuardRelease(&self.busy);
        action();
    }
}

/// Mirrors two structurally identical entity graphs in both directions.
///
/// Leaf entities pipe their changes through [`Synchronizable`](super::entity_view::Synchronizable);
/// composites are walked child by child, matched by name. Extensions missing on one side are
/// created there from a deep clone of the other side's extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelSynchronizer;

impl ModelSynchronizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synchronize(
        &self,
        lifetime: &Lifetime,
        left: &dyn Bindable,
        right: &dyn Bindable,
    ) -> Result<(), SyncError> {
        let left_view = left.entity_view();
        let left_kind = left_view.kind();
        let right_kind = right.entity_view().kind();
        trace!(
            "Synchronizing `{}` with `{}` ({})",
            left.location(),
            right.location(),
            left_kind
        );
        if left_kind != right_kind {
            return Err(mismatch(left, right));
        }

        match left_view {
            EntityView::Signal(leaf)
            | EntityView::Property(leaf)
            | EntityView::List(leaf)
            | EntityView::Set(leaf)
            | EntityView::Map(leaf) => leaf.synchronize_with(lifetime, right, self)?,
            // calls and endpoints hold no state of their own; only their children are walked
            EntityView::Model | EntityView::Ext | EntityView::Call | EntityView::Endpoint => {}
        }

        self.synchronize_children(lifetime, left, right)
    }

    fn synchronize_children(
        &self,
        lifetime: &Lifetime,
        left: &dyn Bindable,
        right: &dyn Bindable,
    ) -> Result<(), SyncError> {
        complete_extensions(left, right)?;
        complete_extensions(right, left)?;

        let right_children = right.core().children();
        for (name, left_child) in left.core().children() {
            let right_child = right_children
                .iter()
                .find(|(other, _)| *other == name)
                .map(|(_, child)| child)
                .ok_or_else(|| SyncError::ChildrenMismatch {
                    location: left.location().to_string(),
                    name: name.clone(),
                })?;
            self.synchronize(lifetime, left_child.as_ref(), right_child.as_ref())?;
        }
        Ok(())
    }

    /// A copy of `value` for the other side of a pair. Entity values are deep cloned and
    /// synchronized with the original under `lifetime`.
    pub fn mirror_value<T: RdValue>(&self, lifetime: &Lifetime, value: &T) -> T {
        let copy = value.deep_clone();
        if let (Some(original), Some(mirrored)) = (value.as_bindable(), copy.as_bindable()) {
            if let Err(err) = self.synchronize(lifetime, original, mirrored) {
                error!("Failed to mirror `{}`: {}", original.location(), err);
            }
        }
        copy
    }
}

pub(crate) fn mismatch(left: &dyn Bindable, right: &dyn Bindable) -> SyncError {
    SyncError::NotMutuallySynchronizable {
        left: left.location().to_string(),
        left_kind: left.entity_view().kind(),
        right: right.location().to_string(),
        right_kind: right.entity_view().kind(),
    }
}

// Creates on `target` every extension `source` has and `target` lacks
fn complete_extensions(source: &dyn Bindable, target: &dyn Bindable) -> Result<(), SyncError> {
    let target_names = target.core().child_names();
    for (name, child) in source.core().children() {
        if target_names.contains(&name) {
            continue;
        }
        if child.entity_view().kind() != EntityKind::Ext {
            return Err(SyncError::ChildrenMismatch {
                location: target.location().to_string(),
                name,
            });
        }

        let extension = child.deep_clone();
        let attach = |reason: String| SyncError::Attach {
            name: name.clone(),
            reason,
        };
        target
            .core()
            .add_child(&name, extension.clone_handle())
            .map_err(|err| attach(err.to_string()))?;

        let target_lifetime = target.core().bind_lifetime();
        if let (BindState::Bound, Some(bind_lifetime), Some(protocol)) =
            (target.bind_state(), target_lifetime, target.core().protocol())
        {
            let child_id = protocol
                .identities()
                .mix(target.rd_id(), &format!(".{}", name));
            lifecycle::attach_child(target, &bind_lifetime, extension.as_ref(), &name, child_id)
                .map_err(|err| attach(err.to_string()))?;
        }
    }
    Ok(())
}

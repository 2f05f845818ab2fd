use std::{fmt, sync::Arc};

use ripple_serde::{ByteReader, ByteWriter};

use crate::{
    bindable_boilerplate,
    error::RdError,
    serialization::{error::SerializationError, serialization_ctx::SerializationCtx},
    world::{
        entity::{
            bind_state::BindState,
            bindable::{downcast, Bindable},
            bindable_core::BindableCore,
            error::BindError,
            lifecycle,
            rd_value::RdValue,
        },
        sync::entity_view::EntityView,
    },
};

struct ModelInner {
    core: BindableCore,
}

/// Composite entity: an ordered set of named fields, each itself an entity.
///
/// Field order is part of the model's shape. Two models synchronize field by field in
/// declaration order, and child ids are derived from field names.
#[derive(Clone)]
pub struct RdModel {
    inner: Arc<ModelInner>,
}

impl Default for RdModel {
    fn default() -> Self {
        Self::new()
    }
}

impl RdModel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ModelInner {
                core: BindableCore::new(),
            }),
        }
    }

    /// Adds a field. Fields are declared before the model is identified.
    pub fn with_field(self, name: &str, field: &dyn Bindable) -> Result<Self, BindError> {
        self.add_field(name, field)?;
        Ok(self)
    }

    pub fn add_field(&self, name: &str, field: &dyn Bindable) -> Result<(), BindError> {
        self.inner.core.add_child(name, field.clone_handle())
    }

    pub fn field<T: Bindable + Clone>(&self, name: &str) -> Result<T, BindError> {
        self.inner.core.child_as::<T>(name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.inner.core.child_names()
    }

    /// Returns the extension stored under `name`, creating it with `create` on first use.
    /// A model that is already bound binds the new extension right away.
    pub fn get_or_create_extension<T, F>(&self, name: &str, create: F) -> Result<T, RdError>
    where
        T: Bindable + Clone,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.inner.core.child(name) {
            return downcast::<T>(existing.as_ref()).ok_or_else(|| {
                BindError::ChildTypeMismatch {
                    name: name.to_string(),
                    expected: std::any::type_name::<T>(),
                }
                .into()
            });
        }

        let extension = create();
        self.inner.core.add_child(name, extension.clone_handle())?;

        let id = self.rd_id();
        match (self.bind_state(), self.inner.core.bind_lifetime()) {
            (BindState::Bound, Some(lifetime)) => {
                let protocol = self.inner.core.bound_protocol()?;
                let child_id = protocol.identities().mix(id, &format!(".{}", name));
                lifecycle::attach_child(self, &lifetime, &extension, name, child_id)?;
            }
            _ => {
                if let Some(protocol) = self.inner.core.protocol() {
                    let child_id = protocol.identities().mix(id, &format!(".{}", name));
                    extension.identify(protocol.identities(), child_id)?;
                }
            }
        }
        Ok(extension)
    }
}

impl Bindable for RdModel {
    bindable_boilerplate!(inner.core);

    fn entity_view(&self) -> EntityView<'_> {
        EntityView::Model
    }

    fn deep_clone(&self) -> Box<dyn Bindable> {
        Box::new(self.deep_copy())
    }

    /// Fields in declaration order; names are not written, both sides declare the same shape
    fn write_state(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
    ) -> Result<(), SerializationError> {
        for (_, field) in self.inner.core.children() {
            field.write_state(ctx, writer)?;
        }
        Ok(())
    }

    fn read_state(
        &self,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<(), SerializationError> {
        for (_, field) in self.inner.core.children() {
            field.read_state(ctx, reader)?;
        }
        Ok(())
    }
}

impl RdModel {
    fn deep_copy(&self) -> RdModel {
        let copy = RdModel::new();
        for (name, field) in self.inner.core.children() {
            // names are unique in the source, so this cannot collide
            let _ = copy.inner.core.add_child(&name, field.deep_clone());
        }
        copy
    }
}

impl PartialEq for RdModel {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RdModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdModel")
            .field("id", &self.rd_id())
            .field("location", &self.location())
            .field("fields", &self.field_names())
            .finish()
    }
}

impl RdValue for RdModel {
    fn as_bindable(&self) -> Option<&dyn Bindable> {
        Some(self)
    }

    fn deep_clone(&self) -> Self {
        self.deep_copy()
    }
}

use std::{marker::PhantomData, sync::Arc};

use ripple_serde::{ByteReader, ByteWriter, Serde};

use crate::{
    identity::rd_id::RdId,
    serialization::{
        error::SerializationError, intern_root::InternRoot, polymorphic::PolyBox,
        serialization_ctx::SerializationCtx,
    },
    world::entity::rd_value::RdValue,
};

/// How an entity puts its values on the wire
pub trait ValueSerializer<T>: Send + Sync {
    fn read(&self, ctx: &SerializationCtx, reader: &mut ByteReader) -> Result<T, SerializationError>;

    fn write(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
        value: &T,
    ) -> Result<(), SerializationError>;
}

/// Uses the value's own [`Serde`] implementation
pub struct StaticSerializer<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> StaticSerializer<T> {
    pub fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<T> Default for StaticSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serde> ValueSerializer<T> for StaticSerializer<T> {
    fn read(&self, _ctx: &SerializationCtx, reader: &mut ByteReader) -> Result<T, SerializationError> {
        Ok(T::de(reader)?)
    }

    fn write(
        &self,
        _ctx: &SerializationCtx,
        writer: &mut ByteWriter,
        value: &T,
    ) -> Result<(), SerializationError> {
        value.ser(writer);
        Ok(())
    }
}

pub fn static_serializer<T: Serde + 'static>() -> Arc<dyn ValueSerializer<T>> {
    Arc::new(StaticSerializer::<T>::new())
}

/// Puts entity values (an [`RdModel`](crate::RdModel) held by a property, say) on the wire.
///
/// Layout: `RdId id · state`. A value that has no id yet takes a fresh one from the context's
/// identities before it is written. The receiver builds a blank copy with `create`, fills it
/// and gives it the same id, so its children end up with the same ids on both sides and keep
/// replicating once the containing entity binds the copy.
pub struct EntitySerializer<T> {
    create: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T: RdValue> EntitySerializer<T> {
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            create: Arc::new(create),
        }
    }
}

impl<T: RdValue> ValueSerializer<T> for EntitySerializer<T> {
    fn read(&self, ctx: &SerializationCtx, reader: &mut ByteReader) -> Result<T, SerializationError> {
        let id = RdId::de(reader)?;
        let value = (self.create)();
        let entity = value.as_bindable().ok_or_else(not_an_entity::<T>)?;
        entity.read_state(ctx, reader)?;
        if !id.is_null() {
            let identities = ctx.identities().ok_or_else(no_identities::<T>)?;
            entity.identify(identities, id)?;
        }
        Ok(value)
    }

    fn write(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
        value: &T,
    ) -> Result<(), SerializationError> {
        let entity = value.as_bindable().ok_or_else(not_an_entity::<T>)?;
        if entity.rd_id().is_null() {
            let identities = ctx.identities().ok_or_else(no_identities::<T>)?;
            entity.identify(identities, identities.next(RdId::NULL))?;
        }
        entity.rd_id().ser(writer);
        entity.write_state(ctx, writer)
    }
}

pub fn entity_serializer<T, F>(create: F) -> Arc<dyn ValueSerializer<T>>
where
    T: RdValue,
    F: Fn() -> T + Send + Sync + 'static,
{
    Arc::new(EntitySerializer::new(create))
}

fn not_an_entity<T>() -> SerializationError {
    SerializationError::NotAnEntity {
        type_name: std::any::type_name::<T>().to_string(),
    }
}

fn no_identities<T>() -> SerializationError {
    SerializationError::NoIdentities {
        type_name: std::any::type_name::<T>().to_string(),
    }
}

/// Dispatches through the context's [`Serializers`](crate::serialization::serializers::Serializers) registry
#[derive(Debug, Default, Clone, Copy)]
pub struct PolymorphicSerializer;

impl ValueSerializer<Option<PolyBox>> for PolymorphicSerializer {
    fn read(
        &self,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<Option<PolyBox>, SerializationError> {
        ctx.read_polymorphic(reader)
    }

    fn write(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
        value: &Option<PolyBox>,
    ) -> Result<(), SerializationError> {
        ctx.write_polymorphic(writer, value.as_ref())
    }
}

impl ValueSerializer<PolyBox> for PolymorphicSerializer {
    fn read(&self, ctx: &SerializationCtx, reader: &mut ByteReader) -> Result<PolyBox, SerializationError> {
        ctx.read_polymorphic(reader)?
            .ok_or(SerializationError::UnknownTypeId { type_id: RdId::NULL })
    }

    fn write(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
        value: &PolyBox,
    ) -> Result<(), SerializationError> {
        ctx.write_polymorphic(writer, Some(value))
    }
}

/// Wraps another serializer so repeated values travel as a small integer.
///
/// Layout: `true · i32 id · value` the first time a value is sent, `false · i32 id` afterwards.
pub struct InternedSerializer<T> {
    domain: String,
    inner: Arc<dyn ValueSerializer<T>>,
}

impl<T: Clone + Send + Sync + 'static> InternedSerializer<T> {
    pub fn new(domain: &str, inner: Arc<dyn ValueSerializer<T>>) -> Self {
        Self {
            domain: domain.to_string(),
            inner,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Forgets `value` on the sending side; the next write transmits it in full again
    pub fn forget(&self, ctx: &SerializationCtx, value: &T) -> Result<bool, SerializationError> {
        let root = self.root(ctx)?;
        let encoded = self.encode(ctx, value)?;
        Ok(root.forget(&encoded))
    }

    fn root(&self, ctx: &SerializationCtx) -> Result<Arc<InternRoot>, SerializationError> {
        ctx.intern_root(&self.domain)
            .ok_or_else(|| SerializationError::UnknownInternDomain {
                domain: self.domain.clone(),
            })
    }

    fn encode(&self, ctx: &SerializationCtx, value: &T) -> Result<Vec<u8>, SerializationError> {
        let mut scratch = ByteWriter::new();
        self.inner.write(ctx, &mut scratch, value)?;
        Ok(scratch.to_bytes())
    }
}

impl<T: Clone + Send + Sync + 'static> ValueSerializer<T> for InternedSerializer<T> {
    fn read(&self, ctx: &SerializationCtx, reader: &mut ByteReader) -> Result<T, SerializationError> {
        let root = self.root(ctx)?;
        let fresh = reader.read_bool()?;
        let id = reader.read_i32()?;
        if fresh {
            let value = self.inner.read(ctx, reader)?;
            root.store_incoming(id, Arc::new(value.clone()));
            return Ok(value);
        }

        let stored = root
            .resolve(id)
            .ok_or_else(|| SerializationError::UnknownInternId {
                domain: self.domain.clone(),
                id,
            })?;
        stored
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| SerializationError::InternTypeMismatch {
                domain: self.domain.clone(),
                id,
            })
    }

    fn write(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
        value: &T,
    ) -> Result<(), SerializationError> {
        let root = self.root(ctx)?;
        let encoded = self.encode(ctx, value)?;
        let (id, fresh) = root.intern(&encoded);
        writer.write_bool(fresh);
        writer.write_i32(id);
        if fresh {
            writer.write_bytes(&encoded);
        }
        Ok(())
    }
}

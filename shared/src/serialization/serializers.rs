use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use log::trace;
use parking_lot::RwLock;
use ripple_serde::{ByteReader, ByteWriter, Serde};

use crate::{
    identity::rd_id::RdId,
    serialization::{
        error::SerializationError,
        polymorphic::{PolyBox, Polymorphic},
        serialization_ctx::SerializationCtx,
    },
};

pub type ReadFn = Arc<
    dyn Fn(&SerializationCtx, &mut ByteReader) -> Result<PolyBox, SerializationError> + Send + Sync,
>;
pub type WriteFn = Arc<
    dyn Fn(&SerializationCtx, &mut ByteWriter, &dyn Any) -> Result<(), SerializationError>
        + Send
        + Sync,
>;

/// Reader and writer registered for one type
pub struct Marshaller {
    type_id: RdId,
    type_name: String,
    read: ReadFn,
    write: WriteFn,
}

impl Marshaller {
    pub fn type_id(&self) -> RdId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// Registry of polymorphic marshallers, keyed by wire type id and by Rust type
#[derive(Default)]
pub struct Serializers {
    by_id: RwLock<HashMap<RdId, Arc<Marshaller>>>,
    by_type: RwLock<HashMap<TypeId, Arc<Marshaller>>>,
}

impl Serializers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire type id for a type name
    pub fn type_id_of(type_name: &str) -> RdId {
        RdId::NULL.mix(type_name)
    }

    /// Registers `T`. Registering the same type twice is a no-op.
    pub fn register<T: Polymorphic>(&self) -> Result<(), SerializationError> {
        let read: ReadFn = Arc::new(
            |_ctx: &SerializationCtx,
             reader: &mut ByteReader<'_>|
             -> Result<PolyBox, SerializationError> { Ok(PolyBox::new(T::de(reader)?)) },
        );
        let write: WriteFn = Arc::new(
            |_ctx: &SerializationCtx,
             writer: &mut ByteWriter,
             value: &dyn Any|
             -> Result<(), SerializationError> {
                let value = value.downcast_ref::<T>().ok_or_else(|| {
                    SerializationError::TypeMismatch {
                        expected: T::type_name().to_string(),
                    }
                })?;
                value.ser(writer);
                Ok(())
            },
        );
        self.register_marshaller(TypeId::of::<T>(), T::type_name(), read, write)
    }

    /// Registers a hand-written reader/writer pair under `type_name`
    pub fn register_marshaller(
        &self,
        rust_type: TypeId,
        type_name: &str,
        read: ReadFn,
        write: WriteFn,
    ) -> Result<(), SerializationError> {
        let type_id = Self::type_id_of(type_name);
        let mut by_id = self.by_id.write();
        if let Some(existing) = by_id.get(&type_id) {
            if existing.type_name == type_name {
                return Ok(());
            }
            return Err(SerializationError::DuplicateTypeId {
                type_id,
                existing: existing.type_name.clone(),
                attempted: type_name.to_string(),
            });
        }

        let marshaller = Arc::new(Marshaller {
            type_id,
            type_name: type_name.to_string(),
            read,
            write,
        });
        by_id.insert(type_id, marshaller.clone());
        self.by_type.write().insert(rust_type, marshaller);
        trace!("Registered marshaller for `{}` as {}", type_name, type_id);
        Ok(())
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.by_type.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.read().is_empty()
    }

    /// Writes the type id followed by the payload. `None` is written as the `Null` type id.
    pub fn write_polymorphic(
        &self,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
        value: Option<&PolyBox>,
    ) -> Result<(), SerializationError> {
        let value = match value {
            Some(value) => value,
            None => {
                RdId::NULL.ser(writer);
                return Ok(());
            }
        };
        let rust_type = value.value().as_any().type_id();
        let marshaller = self
            .by_type
            .read()
            .get(&rust_type)
            .cloned()
            .ok_or_else(|| SerializationError::UnknownType {
                type_name: value.type_name().to_string(),
            })?;
        marshaller.type_id.ser(writer);
        (marshaller.write)(ctx, writer, value.value().as_any())
    }

    pub fn read_polymorphic(
        &self,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<Option<PolyBox>, SerializationError> {
        let type_id = RdId::de(reader)?;
        if type_id.is_null() {
            return Ok(None);
        }
        let marshaller = self
            .by_id
            .read()
            .get(&type_id)
            .cloned()
            .ok_or(SerializationError::UnknownTypeId { type_id })?;
        (marshaller.read)(ctx, reader).map(Some)
    }
}

use std::{any::Any, error::Error, fmt};

use ripple_serde::{ByteReader, ByteWriter, SerdeErr};

use crate::serialization::{
    error::SerializationError, serialization_ctx::SerializationCtx,
    value_serializer::ValueSerializer,
};

/// A failure raised by a remote handler, carried as data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdFault {
    pub type_name: String,
    pub message: String,
    pub formatted: String,
}

impl RdFault {
    pub fn new(type_name: &str, message: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            message: message.to_string(),
            formatted: format!("{}: {}", type_name, message),
        }
    }

    /// Captures `err` together with its chain of sources
    pub fn from_error<E: Error>(err: &E) -> Self {
        let mut formatted = format!("{}: {}", std::any::type_name::<E>(), err);
        let mut source = err.source();
        while let Some(cause) = source {
            formatted.push_str(&format!("\ncaused by: {}", cause));
            source = cause.source();
        }
        Self {
            type_name: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
            formatted,
        }
    }

    /// Turns the payload of a caught panic into a fault
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            message.to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::new("panic", &message)
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_string(&self.type_name);
        writer.write_string(&self.message);
        writer.write_string(&self.formatted);
    }

    fn read(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            type_name: reader.read_string()?,
            message: reader.read_string()?,
            formatted: reader.read_string()?,
        })
    }
}

impl fmt::Display for RdFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// Outcome of a remote call.
///
/// Payload: `i32 kind (Success=0, Cancelled=1, Fault=2)`, then the value for `Success` or three
/// strings (type name, message, formatted text) for `Fault`.
#[derive(Debug, Clone, PartialEq)]
pub enum RdTaskResult<T> {
    Success(T),
    Cancelled,
    Fault(RdFault),
}

impl<T> RdTaskResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RdTaskResult::Success(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RdTaskResult::Success(_) => "Success",
            RdTaskResult::Cancelled => "Cancelled",
            RdTaskResult::Fault(_) => "Fault",
        }
    }

    pub fn write(
        &self,
        serializer: &dyn ValueSerializer<T>,
        ctx: &SerializationCtx,
        writer: &mut ByteWriter,
    ) -> Result<(), SerializationError> {
        match self {
            RdTaskResult::Success(value) => {
                writer.write_i32(0);
                serializer.write(ctx, writer, value)?;
            }
            RdTaskResult::Cancelled => writer.write_i32(1),
            RdTaskResult::Fault(fault) => {
                writer.write_i32(2);
                fault.write(writer);
            }
        }
        Ok(())
    }

    pub fn read(
        serializer: &dyn ValueSerializer<T>,
        ctx: &SerializationCtx,
        reader: &mut ByteReader,
    ) -> Result<Self, SerializationError> {
        match reader.read_i32()? {
            0 => Ok(RdTaskResult::Success(serializer.read(ctx, reader)?)),
            1 => Ok(RdTaskResult::Cancelled),
            2 => Ok(RdTaskResult::Fault(RdFault::read(reader)?)),
            ordinal => Err(SerdeErr::InvalidOrdinal {
                enum_name: "RdTaskResult",
                ordinal,
            }
            .into()),
        }
    }
}

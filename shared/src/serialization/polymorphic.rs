use std::{any::Any, fmt};

use ripple_serde::Serde;

/// A value type that can travel in a polymorphic slot.
///
/// `type_name` must be identical on both ends of a connection: it is hashed into the type id
/// written ahead of the payload.
pub trait Polymorphic: Serde + fmt::Debug + Send + Sync + 'static {
    fn type_name() -> &'static str;
}

/// Object-safe view of a [`Polymorphic`] value
pub trait PolyValue: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn poly_type_name(&self) -> &'static str;
    fn clone_boxed(&self) -> Box<dyn PolyValue>;
    fn eq_dyn(&self, other: &dyn PolyValue) -> bool;
}

impl<T: Polymorphic> PolyValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn poly_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn clone_boxed(&self) -> Box<dyn PolyValue> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn PolyValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| other == self)
    }
}

/// Owned polymorphic value
pub struct PolyBox(Box<dyn PolyValue>);

impl PolyBox {
    pub fn new<T: Polymorphic>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn from_boxed(value: Box<dyn PolyValue>) -> Self {
        Self(value)
    }

    pub fn downcast_ref<T: Polymorphic>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.poly_type_name()
    }

    pub fn value(&self) -> &dyn PolyValue {
        self.0.as_ref()
    }
}

impl Clone for PolyBox {
    fn clone(&self) -> Self {
        Self(self.0.clone_boxed())
    }
}

impl PartialEq for PolyBox {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_dyn(other.0.as_ref())
    }
}

impl fmt::Debug for PolyBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

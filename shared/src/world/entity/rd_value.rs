use std::fmt;

use crate::{identity::rd_id::RdId, serialization::polymorphic::PolyBox, world::entity::bindable::Bindable};

/// A value that can live inside a replicated property or collection.
///
/// Plain data answers `None` from [`RdValue::as_bindable`]. Entity values (for example an
/// [`RdModel`](super::model::RdModel) stored in a list) expose themselves so the container can
/// identify and bind them along with itself.
pub trait RdValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn as_bindable(&self) -> Option<&dyn Bindable> {
        None
    }

    /// A copy that does not share entity state with `self`
    fn deep_clone(&self) -> Self {
        self.clone()
    }
}

macro_rules! plain_rd_values {
    ($($ty:ty),* $(,)?) => {
        $(impl RdValue for $ty {})*
    };
}

plain_rd_values!(
    (),
    bool,
    u8,
    u16,
    u32,
    u64,
    i8,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    RdId,
    PolyBox,
);

impl<T: RdValue> RdValue for Option<T> {
    fn as_bindable(&self) -> Option<&dyn Bindable> {
        self.as_ref().and_then(RdValue::as_bindable)
    }

    fn deep_clone(&self) -> Self {
        self.as_ref().map(RdValue::deep_clone)
    }
}

impl<T: RdValue> RdValue for Vec<T> {
    fn deep_clone(&self) -> Self {
        self.iter().map(RdValue::deep_clone).collect()
    }
}

impl<A: RdValue, B: RdValue> RdValue for (A, B) {
    fn deep_clone(&self) -> Self {
        (self.0.deep_clone(), self.1.deep_clone())
    }
}

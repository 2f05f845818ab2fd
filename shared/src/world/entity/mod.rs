pub mod bind_state;
pub mod bindable;
pub mod bindable_core;
pub mod binding_scope;
pub mod error;
pub mod lifecycle;
pub mod location;
pub mod model;
pub mod rd_value;

pub mod component;
pub mod entity;
pub mod ext;
pub mod sync;
pub mod task;

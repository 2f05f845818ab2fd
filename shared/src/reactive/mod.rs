//! Local observable containers. These carry no networking; the replicated entities in
//! `world::component` are layered on top of them.

pub mod list;
pub mod map;
pub mod property;
pub mod set;
pub mod signal;

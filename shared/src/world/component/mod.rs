//! Replicated reactive entities. Each one owns a single wire id and serializes its own changes.

pub mod change_guard;
pub mod error;
pub mod rd_list;
pub mod rd_map;
pub mod rd_property;
pub mod rd_set;
pub mod rd_signal;
pub mod reactive_base;

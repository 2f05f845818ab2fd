//! Framed TCP transport for the [`Wire`](crate::wire::Wire) abstraction.

pub mod error;
mod frame;
pub mod socket_config;
pub mod socket_wire;

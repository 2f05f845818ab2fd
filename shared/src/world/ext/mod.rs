//! Extensions: entities that carry a nested protocol and connect it through a handshake.

pub mod ext_state;
pub mod ext_wire;
pub mod rd_ext;

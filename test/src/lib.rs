//! Test harness for ripple: an in-memory wire pair, a client/server protocol fixture and
//! assertion helpers.

pub mod helpers;
pub mod local_wire;
pub mod test_protocol;

pub use helpers::{init_logging, wait_until};
pub use local_wire::LocalWire;
pub use test_protocol::{TestProtocols, TestSide};

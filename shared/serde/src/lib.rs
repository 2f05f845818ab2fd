//! # Ripple Serde
//! Little-endian byte buffers and the `Serde` trait used to put values on the wire.
//!
//! Every multi-byte scalar is written little-endian. Strings are written as an `i32` count of
//! UTF-16 code units followed by the units themselves, collections as an `i32` element count
//! followed by the elements, and optional values as a presence flag followed by the value.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod error;
mod impls;
mod reader;
mod serde;
mod writer;

pub use error::SerdeErr;
pub use reader::ByteReader;
pub use serde::{ConstByteLength, Serde};
pub use writer::ByteWriter;

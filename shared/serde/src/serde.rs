use crate::{error::SerdeErr, reader::ByteReader, writer::ByteWriter};

/// A value that knows how to write itself into a [`ByteWriter`] and read itself back
pub trait Serde: Sized + Clone + PartialEq {
    /// Appends the value to the writer
    fn ser(&self, writer: &mut ByteWriter);

    /// Parses a value, advancing the reader
    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr>;

    /// Number of bytes `ser` will produce
    fn byte_length(&self) -> usize;
}

/// Implemented by values whose encoding always has the same size
pub trait ConstByteLength {
    fn const_byte_length() -> usize;
}

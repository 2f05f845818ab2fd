use crate::{error::SerdeErr, reader::ByteReader, serde::Serde, writer::ByteWriter};

impl Serde for String {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_string(self);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        reader.read_string()
    }

    fn byte_length(&self) -> usize {
        4 + self.encode_utf16().count() * 2
    }
}

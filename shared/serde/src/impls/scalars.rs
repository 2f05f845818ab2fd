use crate::{error::SerdeErr, reader::ByteReader, serde::{ConstByteLength, Serde}, writer::ByteWriter};

macro_rules! impl_serde_for_scalar {
    ($type:ty, $size:expr, $write:ident, $read:ident) => {
        impl Serde for $type {
            fn ser(&self, writer: &mut ByteWriter) {
                writer.$write(*self);
            }

            fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
                reader.$read()
            }

            fn byte_length(&self) -> usize {
                $size
            }
        }

        impl ConstByteLength for $type {
            fn const_byte_length() -> usize {
                $size
            }
        }
    };
}

impl_serde_for_scalar!(bool, 1, write_bool, read_bool);
impl_serde_for_scalar!(u8, 1, write_u8, read_u8);
impl_serde_for_scalar!(i8, 1, write_i8, read_i8);
impl_serde_for_scalar!(u16, 2, write_u16, read_u16);
impl_serde_for_scalar!(i16, 2, write_i16, read_i16);
impl_serde_for_scalar!(u32, 4, write_u32, read_u32);
impl_serde_for_scalar!(i32, 4, write_i32, read_i32);
impl_serde_for_scalar!(u64, 8, write_u64, read_u64);
impl_serde_for_scalar!(i64, 8, write_i64, read_i64);
impl_serde_for_scalar!(f32, 4, write_f32, read_f32);
impl_serde_for_scalar!(f64, 8, write_f64, read_f64);

// Unit

impl Serde for () {
    fn ser(&self, _writer: &mut ByteWriter) {}

    fn de(_reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(())
    }

    fn byte_length(&self) -> usize {
        0
    }
}

impl ConstByteLength for () {
    fn const_byte_length() -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use crate::{ByteReader, ByteWriter, Serde};

    fn round_trip<T: Serde + std::fmt::Debug>(value: T) {
        let mut writer = ByteWriter::new();
        value.ser(&mut writer);
        assert_eq!(writer.len(), value.byte_length());

        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(T::de(&mut reader), Ok(value));
        assert!(reader.is_empty());
    }

    #[test]
    fn boundary_values() {
        round_trip(0i32);
        round_trip(i32::MAX);
        round_trip(i32::MIN);
        round_trip(u64::MAX);
        round_trip(i64::MIN);
        round_trip(true);
        round_trip(false);
        round_trip(-0.0f64);
        round_trip(f32::MAX);
        round_trip(());
    }
}

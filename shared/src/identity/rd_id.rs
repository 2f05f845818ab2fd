use std::fmt;

use ripple_serde::{ByteReader, ByteWriter, ConstByteLength, Serde, SerdeErr};

/// Identifier of one node in a replicated object graph.
///
/// `RdId::NULL` means "unassigned". Ids strictly between `0` and [`RdId::MAX_STATIC_ID`] are
/// reserved for entities bound by a well-known integer instead of by path.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RdId(i64);

impl RdId {
    pub const NULL: RdId = RdId(0);
    pub const MAX_STATIC_ID: i64 = 1_000_000;

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn is_static(&self) -> bool {
        self.0 > 0 && self.0 < Self::MAX_STATIC_ID
    }

    /// Folds `tail` into this id. The hash walks UTF-16 code units so that both ends of a
    /// connection compute the same id regardless of platform.
    ///
    /// Mixing is a plain continuation of the fold, so `id.mix(a).mix(b) == id.mix(a + b)`.
    pub fn mix(self, tail: &str) -> RdId {
        let hash = tail.encode_utf16().fold(self.0, |acc, unit| {
            acc.wrapping_mul(31).wrapping_add(i64::from(unit))
        });
        RdId(hash)
    }

    pub fn mix_i32(self, tail: i32) -> RdId {
        self.mix_i64(i64::from(tail))
    }

    pub fn mix_i64(self, tail: i64) -> RdId {
        RdId(self.0.wrapping_mul(31).wrapping_add(tail.wrapping_add(1)))
    }
}

impl fmt::Debug for RdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RdId({})", self.0)
    }
}

impl fmt::Display for RdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RdId {
    fn from(value: i64) -> Self {
        RdId(value)
    }
}

impl Serde for RdId {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_i64(self.0);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(RdId(reader.read_i64()?))
    }

    fn byte_length(&self) -> usize {
        8
    }
}

impl ConstByteLength for RdId {
    fn const_byte_length() -> usize {
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hash_vectors() {
        let first = RdId::NULL.mix("abcdefg");
        assert_eq!(first.value(), 88988021860);

        let second = first.mix("hijklmn");
        assert_eq!(second.value(), -5123855772550266649);
    }

    #[test]
    fn static_range_excludes_bounds() {
        assert!(!RdId::NULL.is_static());
        assert!(RdId::new(1).is_static());
        assert!(RdId::new(RdId::MAX_STATIC_ID - 1).is_static());
        assert!(!RdId::new(RdId::MAX_STATIC_ID).is_static());
        assert!(!RdId::new(-3).is_static());
    }

    #[test]
    fn integer_mixing_is_offset_by_one() {
        assert_eq!(RdId::NULL.mix_i32(0).value(), 1);
        assert_eq!(RdId::new(2).mix_i64(4).value(), 67);
    }
}

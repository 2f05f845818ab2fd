use thiserror::Error;

/// Errors that can occur while reading values back out of a byte buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// The buffer ended before the value was complete
    #[error("Unexpected end of buffer: needed {needed} bytes at position {position} but only {remaining} remain")]
    UnexpectedEnd {
        needed: usize,
        position: usize,
        remaining: usize,
    },

    /// A length or count prefix was negative
    #[error("Invalid length prefix {length}. Length prefixes must be non-negative")]
    InvalidLength { length: i32 },

    /// A string payload did not decode as UTF-16
    #[error("String payload is not valid UTF-16")]
    InvalidUtf16,

    /// An enum ordinal was outside of the declared variants
    #[error("Invalid ordinal {ordinal} for enum {enum_name}")]
    InvalidOrdinal { enum_name: &'static str, ordinal: i32 },
}

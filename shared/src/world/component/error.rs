use thiserror::Error;

/// Errors raised while applying a remote change to a replicated collection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// A list change arrived out of sequence
    #[error("Version conflict for `{location}`. Expected version {expected}, received {received}. A list may only be modified from one side at a time")]
    VersionConflict {
        location: String,
        expected: i64,
        received: i64,
    },

    /// A list change refers to an index the local copy does not have
    #[error("Index {index} is out of range for `{location}` of length {len}")]
    IndexOutOfRange {
        location: String,
        index: i32,
        len: usize,
    },
}

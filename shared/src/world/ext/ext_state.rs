use ripple_serde::SerdeErr;

/// Handshake message exchanged by the two sides of an extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtState {
    Ready = 0,
    ReceivedCounterpart = 1,
    Disconnected = 2,
}

impl ExtState {
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    pub fn from_ordinal(ordinal: i32) -> Result<Self, SerdeErr> {
        match ordinal {
            0 => Ok(ExtState::Ready),
            1 => Ok(ExtState::ReceivedCounterpart),
            2 => Ok(ExtState::Disconnected),
            other => Err(SerdeErr::InvalidOrdinal {
                enum_name: "ExtState",
                ordinal: other,
            }),
        }
    }
}

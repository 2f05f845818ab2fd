//! `[i32 LE length][i64 LE id][payload]`, where length counts the id and the payload.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{identity::rd_id::RdId, transport::error::TransportError};

pub const HEADER_ID_LENGTH: usize = 8;

pub fn frame_length(payload: &[u8]) -> usize {
    HEADER_ID_LENGTH + payload.len()
}

pub fn write_frame<W: Write>(
    stream: &mut W,
    id: RdId,
    payload: &[u8],
    max: usize,
) -> Result<(), TransportError> {
    let length = frame_length(payload);
    if length > max || length > i32::MAX as usize {
        return Err(TransportError::FrameTooLarge { length, max });
    }
    let mut frame = Vec::with_capacity(4 + length);
    frame
        .write_i32::<LittleEndian>(length as i32)
        .and_then(|_| frame.write_i64::<LittleEndian>(id.value()))
        .map_err(|err| TransportError::io("write", &err))?;
    frame.extend_from_slice(payload);
    stream
        .write_all(&frame)
        .and_then(|_| stream.flush())
        .map_err(|err| TransportError::io("write", &err))
}

/// Reads one frame. `None` means the peer closed the stream between frames.
pub fn read_frame<R: Read>(
    stream: &mut R,
    max: usize,
) -> Result<Option<(RdId, Vec<u8>)>, TransportError> {
    let length = match stream.read_i32::<LittleEndian>() {
        Ok(length) => length,
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(TransportError::io("read", &err)),
    };
    if length < HEADER_ID_LENGTH as i32 || length as usize > max {
        return Err(TransportError::InvalidFrameLength {
            length: length as i64,
            max,
        });
    }
    let id = stream
        .read_i64::<LittleEndian>()
        .map_err(|err| TransportError::io("read", &err))?;
    let mut payload = vec![0; length as usize - HEADER_ID_LENGTH];
    stream
        .read_exact(&mut payload)
        .map_err(|err| TransportError::io("read", &err))?;
    Ok(Some((RdId::new(id), payload)))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn header_layout() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, RdId::new(7), &[1, 2, 3], 100).unwrap();
        assert_eq!(
            buffer,
            vec![11, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3]
        );

        let mut cursor = Cursor::new(buffer);
        assert_eq!(
            read_frame(&mut cursor, 100).unwrap(),
            Some((RdId::new(7), vec![1, 2, 3]))
        );
        assert_eq!(read_frame(&mut cursor, 100).unwrap(), None);
    }

    #[test]
    fn oversized_frames_are_refused_on_both_ends() {
        let mut buffer = Vec::new();
        assert_eq!(
            write_frame(&mut buffer, RdId::new(1), &[0; 16], 20),
            Err(TransportError::FrameTooLarge { length: 24, max: 20 })
        );
        assert!(buffer.is_empty());

        let mut announced = Vec::new();
        announced.write_i32::<LittleEndian>(1_000).unwrap();
        assert_eq!(
            read_frame(&mut Cursor::new(announced), 100),
            Err(TransportError::InvalidFrameLength {
                length: 1_000,
                max: 100
            })
        );
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, RdId::new(1), &[1, 2, 3, 4], 100).unwrap();
        buffer.truncate(buffer.len() - 2);
        assert!(matches!(
            read_frame(&mut Cursor::new(buffer), 100),
            Err(TransportError::Io { .. })
        ));
    }
}

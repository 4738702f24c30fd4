use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::event::{Event, kind};

/// Error returned when a received payload cannot be decoded.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not a well-formed length-prefixed sequence.
    #[error("malformed event payload")]
    Malformed,

    /// The payload is well formed but its discriminant is not a known
    /// event kind.
    ///
    /// Outside the startup handshake this is recoverable: the event is
    /// dropped so that newer producers do not crash older subscribers.
    #[error("unknown event kind: {0}")]
    UnknownKind(u16),
}

impl Event {
    /// Encodes this event into its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);

        buf.push(self.element_count());
        buf.extend_from_slice(&self.kind().to_be_bytes());

        match self {
            Self::Sync | Self::Stop => (),
            Self::Start { output_target } => put_str(&mut buf, output_target),
            Self::Call {
                class_name,
                method_name,
                wall_ns,
                cpu_ns,
            } => {
                put_str(&mut buf, class_name);
                put_str(&mut buf, method_name);
                buf.extend_from_slice(&wall_ns.to_be_bytes());
                buf.extend_from_slice(&cpu_ns.to_be_bytes());
            }
            Self::Return { wall_ns, cpu_ns } => {
                buf.extend_from_slice(&wall_ns.to_be_bytes());
                buf.extend_from_slice(&cpu_ns.to_be_bytes());
            }
        }

        buf
    }

    /// Decodes an event from its wire form.
    ///
    /// The whole payload must be consumed; trailing bytes are rejected as
    /// [`DecodeError::Malformed`]. An unrecognized discriminant is
    /// reported before any field is read.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(bytes);

        let count = cursor.read_u8().map_err(|_| DecodeError::Malformed)?;
        let kind = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| DecodeError::Malformed)?;

        let (event, expected) = match kind {
            kind::SYNC => (Self::Sync, 1),
            kind::STOP => (Self::Stop, 1),
            kind::START => {
                let output_target = read_str(&mut cursor)?;
                (Self::Start { output_target }, 2)
            }
            kind::CALL => {
                let class_name = read_str(&mut cursor)?;
                let method_name = read_str(&mut cursor)?;
                let wall_ns = read_f64(&mut cursor)?;
                let cpu_ns = read_f64(&mut cursor)?;

                (
                    Self::Call {
                        class_name,
                        method_name,
                        wall_ns,
                        cpu_ns,
                    },
                    5,
                )
            }
            kind::RETURN => {
                let wall_ns = read_f64(&mut cursor)?;
                let cpu_ns = read_f64(&mut cursor)?;
                (Self::Return { wall_ns, cpu_ns }, 3)
            }
            other => return Err(DecodeError::UnknownKind(other)),
        };

        if count != expected || cursor.position() != bytes.len() as u64 {
            return Err(DecodeError::Malformed);
        }

        Ok(event)
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn read_str(cursor: &mut Cursor<&[u8]>) -> Result<String, DecodeError> {
    let len = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| DecodeError::Malformed)? as usize;

    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    if len as u64 > remaining {
        return Err(DecodeError::Malformed);
    }

    let mut bytes = vec![0u8; len];
    cursor
        .read_exact(&mut bytes)
        .map_err(|_| DecodeError::Malformed)?;

    String::from_utf8(bytes).map_err(|_| DecodeError::Malformed)
}

fn read_f64(cursor: &mut Cursor<&[u8]>) -> Result<f64, DecodeError> {
    cursor
        .read_f64::<BigEndian>()
        .map_err(|_| DecodeError::Malformed)
}

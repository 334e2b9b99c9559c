//! WebSocket framing (RFC 6455 section 5), server side.
//!
//! Client frames must be masked, server frames are never masked.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// WebSocket frame opcode (4 bits).
///
/// Control opcodes are numerically at or above [`Opcode::Close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Continuation frame (fragmented message).
    Continuation,
    /// Text data frame.
    Text,
    /// Binary data frame.
    Binary,
    /// Connection close control frame.
    Close,
    /// Ping control frame.
    Ping,
    /// Pong control frame.
    Pong,
    /// Any value RFC 6455 reserves (0x3-0x7, 0xB-0xF).
    Reserved(u8),
}

impl Opcode {
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            0x0 => Self::Continuation,
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Reserved(other),
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
            Self::Reserved(v) => v,
        }
    }

    /// Returns true for Close, Ping, Pong and reserved control values.
    pub const fn is_control(self) -> bool {
        self.as_u8() >= Self::Close.as_u8()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WsError {
    #[error("client frame must be masked")]
    UnmaskedClientFrame,
    #[error("reserved bits set without a negotiated extension")]
    ReservedBitsSet,
    #[error("control frame is fragmented or longer than 125 bytes")]
    InvalidControlFrame,
    #[error("frame payload of {0} bytes exceeds limit")]
    PayloadTooLarge(u64),
}

/// One decoded inbound WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsFrame {
    /// Final fragment flag (FIN bit).
    pub fin: bool,
    pub opcode: Opcode,
    /// Unmasked payload.
    pub payload: Bytes,
}

impl WsFrame {
    pub fn new(fin: bool, opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }

    /// The frame continues an earlier data frame of the same message.
    pub fn is_continuation(&self) -> bool {
        self.opcode == Opcode::Continuation
    }

    /// More frames of the same message follow.
    pub fn is_continued(&self) -> bool {
        !self.fin
    }
}

/// Decodes one masked client frame from the front of `src`.
///
/// Returns `Ok(None)` until the whole frame is buffered.
pub fn decode_client_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<WsFrame>, WsError> {
    if src.len() < 2 {
        return Ok(None);
    }

    let first = src[0];
    let second = src[1];

    if first & 0x70 != 0 {
        return Err(WsError::ReservedBitsSet);
    }
    if second & 0x80 == 0 {
        return Err(WsError::UnmaskedClientFrame);
    }

    let fin = first & 0x80 != 0;
    let opcode = Opcode::from_u8(first);

    let (len, mut offset) = match second & 0x7F {
        126 => {
            if src.len() < 4 {
                return Ok(None);
            }
            (u64::from(u16::from_be_bytes([src[2], src[3]])), 4)
        }
        127 => {
            if src.len() < 10 {
                return Ok(None);
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&src[2..10]);
            (u64::from_be_bytes(raw), 10)
        }
        n => (u64::from(n), 2),
    };

    if opcode.is_control() && (!fin || len > 125) {
        return Err(WsError::InvalidControlFrame);
    }
    if len > max_payload as u64 {
        return Err(WsError::PayloadTooLarge(len));
    }
    let len = len as usize;

    if src.len() < offset + 4 + len {
        return Ok(None);
    }

    let mut mask = [0u8; 4];
    mask.copy_from_slice(&src[offset..offset + 4]);
    offset += 4;

    src.advance(offset);
    let mut payload = src.split_to(len);
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }

    Ok(Some(WsFrame {
        fin,
        opcode,
        payload: payload.freeze(),
    }))
}

/// Encodes an unmasked server frame.
pub fn encode_server_frame(fin: bool, opcode: Opcode, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 10);
    let first = (u8::from(fin) << 7) | opcode.as_u8();
    buf.put_u8(first);

    match payload.len() {
        n if n < 126 => buf.put_u8(n as u8),
        n if n <= u16::MAX as usize => {
            buf.put_u8(126);
            buf.put_u16(n as u16);
        }
        n => {
            buf.put_u8(127);
            buf.put_u64(n as u64);
        }
    }

    buf.put_slice(payload);
    buf.freeze()
}

/// Encodes a masked client frame. Used to drive servers from tests and tools.
pub fn encode_client_frame(fin: bool, opcode: Opcode, payload: &[u8], mask: [u8; 4]) -> Bytes {
    let unmasked = encode_server_frame(fin, opcode, payload);
    let header_len = unmasked.len() - payload.len();

    let mut buf = BytesMut::with_capacity(unmasked.len() + 4);
    buf.put_slice(&unmasked[..header_len]);
    buf[1] |= 0x80;
    buf.put_slice(&mask);
    buf.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    buf.freeze()
}

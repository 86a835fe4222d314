//! WebSocket frame parsing and serialization
//!
//! Frames are the wire unit underneath the chunking done by the client: every
//! outbound chunk becomes one frame, and inbound frames are handed out in
//! bounded pieces by the socket.

use crate::{
    error::{CloseCode, Error, FrameError, Result},
    protocol::{constants::MAX_CONTROL_PAYLOAD_SIZE, frame::*, Opcode},
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Represents a WebSocket frame according to RFC 6455
#[derive(Debug, Clone)]
pub struct Frame {
    /// Indicates if this is the final frame in a message
    pub fin: bool,
    /// Frame opcode
    pub opcode: Opcode,
    /// Masking key, present on client-to-server frames
    pub mask: Option<[u8; 4]>,
    /// Payload data, always stored unmasked
    pub payload: Bytes,
}

impl Frame {
    /// Create a new final frame with the given opcode and payload
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Create a continuation frame
    pub fn continuation(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Continuation, payload)
    }

    /// Create a text frame
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Text, payload)
    }

    /// Create a close frame with optional code and reason
    pub fn close(code: Option<u16>, reason: Option<&str>) -> Self {
        let mut payload = BytesMut::new();

        if let Some(code) = code {
            payload.put_u16(code);
            if let Some(reason) = reason {
                payload.put_slice(reason.as_bytes());
            }
        }

        Self::new(Opcode::Close, payload.freeze())
    }

    /// Create a ping frame
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Ping, payload)
    }

    /// Create a pong frame
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// Set the FIN bit
    pub fn fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Attach a fresh random masking key (client frames) or drop it
    pub fn mask(mut self, enabled: bool) -> Self {
        self.mask = if enabled {
            Some(rand::random::<[u8; 4]>())
        } else {
            None
        };
        self
    }

    /// Serialize the frame to bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(14 + self.payload.len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Write the frame to a buffer, masking the payload if a key is set
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(((self.fin as u8) << 7) | self.opcode.value());

        let payload_len = self.payload.len();
        let mask_bit = if self.mask.is_some() { MASK_BIT } else { 0 };

        if payload_len < 126 {
            buf.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= u16::MAX as usize {
            buf.put_u8(mask_bit | PAYLOAD_LEN_16);
            buf.put_u16(payload_len as u16);
        } else {
            buf.put_u8(mask_bit | PAYLOAD_LEN_64);
            buf.put_u64(payload_len as u64);
        }

        match self.mask {
            Some(mask) => {
                buf.put_slice(&mask);
                buf.extend(
                    self.payload
                        .iter()
                        .enumerate()
                        .map(|(i, byte)| byte ^ mask[i % MASKING_KEY_LEN]),
                );
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Parse one frame from the front of `buf`.
    ///
    /// On success the frame's bytes are consumed. When the buffer holds only
    /// part of a frame, `FrameError::InsufficientData` is returned and `buf`
    /// is left untouched.
    pub fn parse(buf: &mut BytesMut, max_frame_size: usize) -> Result<Self> {
        if buf.len() < 2 {
            return Err(FrameError::InsufficientData {
                needed: 2,
                have: buf.len(),
            }
            .into());
        }

        let first_byte = buf[0];
        let second_byte = buf[1];

        if first_byte & (RSV1_BIT | RSV2_BIT | RSV3_BIT) != 0 {
            return Err(FrameError::ReservedBitsSet.into());
        }

        let fin = (first_byte & FIN_BIT) != 0;
        let opcode = Opcode::from(first_byte & OPCODE_MASK)
            .ok_or(FrameError::InvalidOpcode(first_byte & OPCODE_MASK))?;
        let masked = (second_byte & MASK_BIT) != 0;

        let mut header_len = 2;
        let payload_len = match second_byte & PAYLOAD_LEN_MASK {
            PAYLOAD_LEN_16 => {
                header_len += 2;
                ensure_len(buf, header_len)?;
                u16::from_be_bytes([buf[2], buf[3]]) as usize
            }
            PAYLOAD_LEN_64 => {
                header_len += 8;
                ensure_len(buf, header_len)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[2..10]);
                u64::from_be_bytes(raw) as usize
            }
            len => len as usize,
        };

        if opcode.is_control() {
            if !fin {
                return Err(FrameError::FragmentedControlFrame.into());
            }
            if payload_len > MAX_CONTROL_PAYLOAD_SIZE {
                return Err(FrameError::ControlFrameTooLarge(payload_len).into());
            }
        }

        if payload_len > max_frame_size {
            return Err(FrameError::TooLarge {
                size: payload_len,
                max: max_frame_size,
            }
            .into());
        }

        let mask_offset = header_len;
        if masked {
            header_len += MASKING_KEY_LEN;
        }
        ensure_len(buf, header_len + payload_len)?;

        let mask = if masked {
            let mut mask = [0u8; 4];
            mask.copy_from_slice(&buf[mask_offset..mask_offset + MASKING_KEY_LEN]);
            Some(mask)
        } else {
            None
        };

        buf.advance(header_len);
        let mut payload = buf.split_to(payload_len);
        if let Some(mask) = mask {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= mask[i % MASKING_KEY_LEN];
            }
        }

        Ok(Frame {
            fin,
            opcode,
            mask,
            payload: payload.freeze(),
        })
    }

    /// Decode the status code and reason carried by a close frame
    pub fn close_payload(&self) -> (Option<CloseCode>, String) {
        if self.payload.len() < 2 {
            return (None, String::new());
        }
        let code = u16::from_be_bytes([self.payload[0], self.payload[1]]);
        let reason = String::from_utf8_lossy(&self.payload[2..]).into_owned();
        (Some(CloseCode::from(code)), reason)
    }

    /// Get the payload length
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if this is a control frame
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }
}

fn ensure_len(buf: &BytesMut, needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(FrameError::InsufficientData {
            needed,
            have: buf.len(),
        }
        .into());
    }
    Ok(())
}

/// Incremental frame parser over a byte stream
#[derive(Debug)]
pub struct FrameParser {
    /// Bytes received but not yet consumed as frames
    buffer: BytesMut,
    max_frame_size: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(crate::protocol::constants::DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameParser {
    /// Create a parser rejecting frames above `max_frame_size`
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Append raw bytes read from the stream
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Pop the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match Frame::parse(&mut self.buffer, self.max_frame_size) {
            Ok(frame) => Ok(Some(frame)),
            Err(Error::Frame(FrameError::InsufficientData { .. })) => Ok(None),
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
        }
    }

    /// Get the number of bytes currently buffered
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }
}

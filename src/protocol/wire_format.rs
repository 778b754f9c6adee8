//! Wire format encoding and decoding.
//!
//! Implements the 14-byte header format:
//! ```text
//! ┌───────────┬───────────┬───────┬──────────────┬──────────┐
//! │ Stream ID │ Frame Type│ Flags │ Metadata Len │ Data Len │
//! │ 4 bytes   │ 1 byte    │ 1 byte│ 4 bytes      │ 4 bytes  │
//! │ uint32 BE │           │       │ uint32 BE    │ uint32 BE│
//! └───────────┴───────────┴───────┴──────────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. The frame body is the
//! metadata bytes followed by the data bytes.

use crate::error::{Result, WirecallError};

/// Header size in bytes (fixed, exactly 14).
pub const HEADER_SIZE: usize = 14;

/// Default maximum frame body size (16 MB).
pub const DEFAULT_MAX_BODY_SIZE: u32 = 16 * 1024 * 1024;

/// Stream ID reserved for connection-level frames (SETUP).
pub const SETUP_STREAM_ID: u32 = 0;

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Connection setup, stream 0 only. Data is a JSON setup document.
    Setup = 0x01,
    /// Single request expecting a single response element.
    RequestResponse = 0x04,
    /// Single request expecting a stream of response elements.
    RequestStream = 0x05,
    /// Opens a bidirectional channel; payloads follow as PAYLOAD frames.
    RequestChannel = 0x06,
    /// Single request expecting no response.
    FireForget = 0x07,
    /// Payload element on an open stream (NEXT and/or COMPLETE flags).
    Payload = 0x08,
    /// Terminal error for a stream. Data is a UTF-8 message.
    Error = 0x09,
    /// Requester is no longer interested in the stream.
    Cancel = 0x0A,
}

impl FrameType {
    /// Decode a frame type byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Setup),
            0x04 => Some(Self::RequestResponse),
            0x05 => Some(Self::RequestStream),
            0x06 => Some(Self::RequestChannel),
            0x07 => Some(Self::FireForget),
            0x08 => Some(Self::Payload),
            0x09 => Some(Self::Error),
            0x0A => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Flag constants for the protocol.
pub mod flags {
    /// Metadata present: the body starts with `metadata_length` metadata bytes.
    pub const METADATA: u8 = 0b0000_0001;
    /// The frame carries a payload element.
    pub const NEXT: u8 = 0b0000_0010;
    /// The stream completes after this frame.
    pub const COMPLETE: u8 = 0b0000_0100;

    /// Reserved bits mask (bits 3-7).
    pub const RESERVED_MASK: u8 = 0b1111_1000;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Stream identifier (0 reserved for connection-level frames).
    pub stream_id: u32,
    /// Frame type byte (see [`FrameType`]).
    pub frame_type: u8,
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Metadata length in bytes.
    pub metadata_length: u32,
    /// Data length in bytes.
    pub data_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(
        stream_id: u32,
        frame_type: FrameType,
        flags: u8,
        metadata_length: u32,
        data_length: u32,
    ) -> Self {
        Self {
            stream_id,
            frame_type: frame_type as u8,
            flags,
            metadata_length,
            data_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.stream_id.to_be_bytes());
        buf[4] = self.frame_type;
        buf[5] = self.flags;
        buf[6..10].copy_from_slice(&self.metadata_length.to_be_bytes());
        buf[10..14].copy_from_slice(&self.data_length.to_be_bytes());
        buf
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            stream_id: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            frame_type: buf[4],
            flags: buf[5],
            metadata_length: u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]),
            data_length: u32::from_be_bytes([buf[10], buf[11], buf[12], buf[13]]),
        })
    }

    /// Total body length (metadata + data).
    #[inline]
    pub fn body_length(&self) -> u64 {
        u64::from(self.metadata_length) + u64::from(self.data_length)
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Frame type is known
    /// - Body length doesn't exceed max
    /// - Reserved flag bits are 0
    pub fn validate(&self, max_body_size: u32) -> Result<()> {
        if FrameType::from_u8(self.frame_type).is_none() {
            return Err(WirecallError::Protocol(format!(
                "Unknown frame type 0x{:02X}",
                self.frame_type
            )));
        }

        if self.body_length() > u64::from(max_body_size) {
            return Err(WirecallError::Protocol(format!(
                "Frame body size {} exceeds maximum {}",
                self.body_length(),
                max_body_size
            )));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(WirecallError::Protocol(
                "Reserved flag bits must be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the decoded frame type, if known.
    #[inline]
    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_u8(self.frame_type)
    }

    /// Check if the metadata flag is set.
    #[inline]
    pub fn has_metadata(&self) -> bool {
        flags::has_flag(self.flags, flags::METADATA)
    }

    /// Check if the frame carries a payload element.
    #[inline]
    pub fn is_next(&self) -> bool {
        flags::has_flag(self.flags, flags::NEXT)
    }

    /// Check if the stream completes after this frame.
    #[inline]
    pub fn is_complete(&self) -> bool {
        flags::has_flag(self.flags, flags::COMPLETE)
    }
}

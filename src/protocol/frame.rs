//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header, metadata, and data.
//! Uses `bytes::Bytes` for zero-copy body sharing.

use bytes::Bytes;

use super::wire_format::{flags, FrameType, Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Metadata bytes (empty when the METADATA flag is clear).
    pub metadata: Bytes,
    /// Data bytes (zero-copy via `bytes::Bytes`).
    pub data: Bytes,
}

impl Frame {
    /// Create a new frame from header, metadata, and data.
    pub fn new(header: Header, metadata: Bytes, data: Bytes) -> Self {
        Self {
            header,
            metadata,
            data,
        }
    }

    /// Get the stream ID.
    #[inline]
    pub fn stream_id(&self) -> u32 {
        self.header.stream_id
    }

    /// Get the decoded frame type, if known.
    #[inline]
    pub fn frame_type(&self) -> Option<FrameType> {
        self.header.frame_type()
    }

    /// Check if the metadata flag is set.
    #[inline]
    pub fn has_metadata(&self) -> bool {
        self.header.has_metadata()
    }

    /// Check if the frame carries a payload element.
    #[inline]
    pub fn is_next(&self) -> bool {
        self.header.is_next()
    }

    /// Check if the stream completes after this frame.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.header.is_complete()
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes the header and appends metadata and data into a contiguous
/// buffer. The metadata and data lengths in `header` must match the
/// slices passed here.
pub fn build_frame(stream_id: u32, frame_type: FrameType, metadata: &[u8], data: &[u8]) -> Vec<u8> {
    let mut frame_flags = 0u8;
    if !metadata.is_empty() {
        frame_flags |= flags::METADATA;
    }
    build_frame_with_flags(stream_id, frame_type, frame_flags, metadata, data)
}

/// Build a complete frame with explicit flags.
pub fn build_frame_with_flags(
    stream_id: u32,
    frame_type: FrameType,
    frame_flags: u8,
    metadata: &[u8],
    data: &[u8],
) -> Vec<u8> {
    let header = Header::new(
        stream_id,
        frame_type,
        frame_flags,
        metadata.len() as u32,
        data.len() as u32,
    );
    let mut buf = Vec::with_capacity(HEADER_SIZE + metadata.len() + data.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(metadata);
    buf.extend_from_slice(data);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuffer;

    #[test]
    fn test_frame_creation() {
        let header = Header::new(42, FrameType::Payload, flags::METADATA | flags::NEXT, 4, 5);
        let frame = Frame::new(
            header,
            Bytes::from_static(b"meta"),
            Bytes::from_static(b"hello"),
        );

        assert_eq!(frame.stream_id(), 42);
        assert_eq!(frame.frame_type(), Some(FrameType::Payload));
        assert!(frame.has_metadata());
        assert!(frame.is_next());
        assert!(!frame.is_complete());
        assert_eq!(&frame.metadata[..], b"meta");
        assert_eq!(&frame.data[..], b"hello");
    }

    #[test]
    fn test_frame_empty_body() {
        let header = Header::new(1, FrameType::Cancel, 0, 0, 0);
        let frame = Frame::new(header, Bytes::new(), Bytes::new());

        assert!(frame.metadata.is_empty());
        assert!(frame.data.is_empty());
        assert_eq!(frame.frame_type(), Some(FrameType::Cancel));
    }

    #[test]
    fn test_build_frame_sets_metadata_flag() {
        let bytes = build_frame(1, FrameType::RequestResponse, b"meta", b"data");
        let header = Header::decode(&bytes).unwrap();
        assert!(header.has_metadata());
        assert_eq!(header.metadata_length, 4);
        assert_eq!(header.data_length, 4);

        let without = build_frame(1, FrameType::RequestResponse, b"", b"data");
        let header = Header::decode(&without).unwrap();
        assert!(!header.has_metadata());
    }

    #[test]
    fn test_build_frame_roundtrip() {
        let bytes = build_frame_with_flags(
            123,
            FrameType::Payload,
            flags::METADATA | flags::NEXT,
            b"m",
            b"0123456789",
        );

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.stream_id(), 123);
        assert_eq!(&frame.metadata[..], b"m");
        assert_eq!(&frame.data[..], b"0123456789");
        assert!(frame.is_next());
    }
}

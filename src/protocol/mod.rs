//! Wire protocol: frame header format, frame struct, and the
//! incremental parser for fragmented reads.

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, build_frame_with_flags, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    flags, FrameType, Header, DEFAULT_MAX_BODY_SIZE, HEADER_SIZE, SETUP_STREAM_ID,
};

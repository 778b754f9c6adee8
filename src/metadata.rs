//! Metadata composition.
//!
//! Every outbound payload carries at most one metadata blob plus its
//! MIME type. The blob is composed once per invocation from the
//! configured entries:
//!
//! - no entries: no metadata attached
//! - one entry: the entry's bytes pass through raw, under its own MIME
//! - several entries: encoded under [`COMPOSITE_MIME`], each entry as
//!   `[u8 mime-len][mime bytes][u32-BE data-len][data bytes]`
//!
//! The composed blob is `Bytes`, so attaching it to every element of a
//! channel payload stream is a reference-count bump, not a copy.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, WirecallError};

/// MIME type of the composite metadata encoding.
pub const COMPOSITE_MIME: &str = "message/x.wirecall.composite.v0";

/// MIME type of the routing metadata entry.
pub const ROUTING_MIME: &str = "message/x.wirecall.routing.v0";

/// One configured metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    /// MIME type of this entry.
    pub mime: String,
    /// Entry bytes.
    pub bytes: Bytes,
}

impl MetadataEntry {
    /// Create an entry from a MIME type and bytes.
    pub fn new(mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Create a routing entry.
    pub fn route(route: &str) -> Self {
        Self::new(ROUTING_MIME, Bytes::copy_from_slice(route.as_bytes()))
    }
}

/// The composed metadata blob attached to outbound payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMetadata {
    /// MIME type of the blob.
    pub mime: String,
    /// Blob bytes.
    pub bytes: Bytes,
}

/// Compose the configured entries into a single blob plus MIME type.
///
/// # Errors
///
/// Returns `Metadata` errors for entries that cannot be encoded in the
/// composite format (MIME longer than 255 bytes, data longer than
/// `u32::MAX`).
pub fn compose(entries: &[MetadataEntry]) -> Result<Option<ComposedMetadata>> {
    match entries {
        [] => Ok(None),
        [single] => Ok(Some(ComposedMetadata {
            mime: single.mime.clone(),
            bytes: single.bytes.clone(),
        })),
        many => {
            let mut buf = BytesMut::new();
            for entry in many {
                let mime_len = entry.mime.len();
                if mime_len == 0 || mime_len > u8::MAX as usize {
                    return Err(WirecallError::Metadata(format!(
                        "MIME type length {} not in 1..=255: {}",
                        mime_len, entry.mime
                    )));
                }
                if entry.bytes.len() > u32::MAX as usize {
                    return Err(WirecallError::Metadata(format!(
                        "Entry for {} too large",
                        entry.mime
                    )));
                }
                buf.put_u8(mime_len as u8);
                buf.put_slice(entry.mime.as_bytes());
                buf.put_u32(entry.bytes.len() as u32);
                buf.put_slice(&entry.bytes);
            }
            Ok(Some(ComposedMetadata {
                mime: COMPOSITE_MIME.to_string(),
                bytes: buf.freeze(),
            }))
        }
    }
}

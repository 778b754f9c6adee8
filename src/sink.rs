//! Output sink: raw response bytes persisted to a file.
//!
//! The sink is prepared before any network activity: a stale file at
//! the destination is deleted (missing is fine, anything else is
//! fatal) and the destination is opened in create+append mode. For
//! the rest of the invocation the sink is the file's only writer.
//! Content is the exact concatenation of response elements in
//! delivery order, with no framing. A failed write aborts the stream;
//! bytes already written stay on disk.

use std::path::Path;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Exclusive writer for the invocation's output destination.
pub struct OutputSink {
    file: File,
}

impl OutputSink {
    /// Prepare the sink for one invocation.
    ///
    /// Returns `None` when no destination is configured. Otherwise
    /// deletes any pre-existing file and opens the destination for
    /// appending.
    pub async fn prepare(path: Option<&Path>) -> Result<Option<Self>> {
        let Some(path) = path else {
            return Ok(None);
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Some(Self { file }))
    }

    /// Append one response element's raw bytes.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes).await?;
        self.file.flush().await?;
        Ok(())
    }
}

//! Payload type and the two payload production modes.
//!
//! A [`Payload`] is one unit of application data plus its composed
//! metadata. Payloads are produced either from a pre-loaded static
//! body or live from a line-oriented reader:
//!
//! - static: one payload (or a singleton stream for the channel variant)
//! - live: one payload per input line, read on a `spawn_blocking`
//!   worker and bridged into the async pipeline through a bounded
//!   channel. End of input is clean completion, never an error.
//!
//! The composed metadata is reused across all elements of a live
//! stream; cloning it is a `Bytes` reference-count bump.

use std::io::BufRead;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use crate::config::{InputSource, InvocationConfig};
use crate::error::{Result, WirecallError};
use crate::metadata::{compose, ComposedMetadata};

/// Capacity of the line bridge channel. Bounded so a slow outbound
/// side backpressures the blocking reader instead of buffering stdin.
const LINE_CHANNEL_CAPACITY: usize = 16;

/// One unit of application data plus attached metadata.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Payload body.
    pub data: Bytes,
    /// Composed metadata, if any entries were configured.
    pub metadata: Option<ComposedMetadata>,
}

impl Payload {
    /// Create a payload.
    pub fn new(data: Bytes, metadata: Option<ComposedMetadata>) -> Self {
        Self { data, metadata }
    }
}

/// Stream of outbound payloads for the channel variant.
pub type PayloadStream = BoxStream<'static, Result<Payload>>;

/// Produce the single payload for the single-request variants.
///
/// In static mode the configured body is used as-is. In stdin mode all
/// input lines are read off the runtime and joined with `\n` into one
/// body.
pub async fn single(config: &InvocationConfig) -> Result<Payload> {
    let metadata = compose(&config.metadata)?;
    match &config.input {
        InputSource::Body(body) => Ok(Payload::new(body.clone(), metadata)),
        InputSource::Stdin => {
            let body = tokio::task::spawn_blocking(|| -> std::io::Result<String> {
                let stdin = std::io::stdin();
                let mut lines = Vec::new();
                for line in stdin.lock().lines() {
                    lines.push(line?);
                }
                Ok(lines.join("\n"))
            })
            .await
            .map_err(|e| WirecallError::Protocol(format!("Input reader task failed: {e}")))??;
            Ok(Payload::new(Bytes::from(body), metadata))
        }
    }
}

/// Produce the payload stream for the channel variant.
///
/// Static mode yields a singleton stream; stdin mode yields one
/// payload per line.
pub fn stream(config: &InvocationConfig) -> Result<PayloadStream> {
    let metadata = compose(&config.metadata)?;
    match &config.input {
        InputSource::Body(body) => {
            let payload = Payload::new(body.clone(), metadata);
            Ok(stream::once(async move { Ok(payload) }).boxed())
        }
        InputSource::Stdin => Ok(line_payloads(
            std::io::BufReader::new(std::io::stdin()),
            metadata,
            config.log.clone(),
        )),
    }
}

/// Map each line of a blocking reader to one payload.
///
/// The reader is owned by a `spawn_blocking` worker and dropped on
/// every termination path: end of input, read error, or the consumer
/// dropping the stream (which closes the bridge channel and makes the
/// worker's next send fail). When a log label is configured, each
/// outbound line is traced under it.
pub fn line_payloads<R>(
    reader: R,
    metadata: Option<ComposedMetadata>,
    log: Option<String>,
) -> PayloadStream
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<std::io::Result<String>>(LINE_CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        for line in reader.lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() {
                // Consumer dropped the stream.
                return;
            }
            if failed {
                return;
            }
        }
        // End of input: dropping the sender completes the stream.
    });

    stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .map(move |line| match line {
        Ok(line) => {
            if let Some(label) = &log {
                tracing::info!(label = %label, bytes = line.len(), "input line");
            }
            Ok(Payload::new(Bytes::from(line), metadata.clone()))
        }
        Err(e) => Err(WirecallError::Io(e)),
    })
    .boxed()
}

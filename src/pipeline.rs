//! Response-stream transform pipeline.
//!
//! The stage order is fixed regardless of which stages are active:
//!
//! ```text
//! response stream → record → log → limit_rate → take → delay → echo
//! ```
//!
//! Each optional stage is the identity transform when its option is
//! absent; the active pipeline is built by folding the stages over
//! the stream. Recording sits ahead of every transform so the output
//! file holds the raw bytes of every element pulled from upstream,
//! unaffected by rate limiting, delay, or the take limit's early
//! termination of later elements.
//!
//! Cancellation falls out of the pull model: `take` stops polling
//! after N elements and the upstream stream is dropped when the
//! pipeline finishes, which is the client's signal to cancel the
//! in-flight subscription.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::client::ResponseStream;
use crate::config::PipelineOptions;
use crate::console;
use crate::error::Result;
use crate::sink::OutputSink;

/// Drive a response stream through the configured pipeline to
/// completion.
pub async fn run(
    stream: ResponseStream,
    sink: Option<OutputSink>,
    options: &PipelineOptions,
) -> Result<()> {
    let stream = record(stream, sink);
    let stream = log(stream, options.log.clone());
    let stream = limit_rate(stream, options.limit_rate);
    let stream = take(stream, options.take);
    let stream = delay(stream, options.delay);
    drain(stream, options.quiet).await
}

/// Output-sink tap: append each element's raw bytes before any other
/// stage sees it. A write failure terminates the stream with an error.
fn record(stream: ResponseStream, sink: Option<OutputSink>) -> ResponseStream {
    let Some(sink) = sink else {
        return stream;
    };
    stream::try_unfold((stream, sink), |(mut stream, mut sink)| async move {
        match stream.try_next().await? {
            Some(bytes) => {
                sink.write(&bytes).await?;
                Ok(Some((bytes, (stream, sink))))
            }
            None => Ok(None),
        }
    })
    .boxed()
}

/// Diagnostic trace of each element under the configured label.
fn log(stream: ResponseStream, label: Option<String>) -> ResponseStream {
    let Some(label) = label else {
        return stream;
    };
    stream
        .inspect(move |element| match element {
            Ok(bytes) => tracing::info!(label = %label, bytes = bytes.len(), "next"),
            Err(e) => tracing::warn!(label = %label, error = %e, "stream error"),
        })
        .boxed()
}

/// Demand batching: pull at most `n` elements before yielding back to
/// the scheduler. Never drops, reorders, or buffers elements.
fn limit_rate(stream: ResponseStream, n: Option<usize>) -> ResponseStream {
    let Some(n) = n.filter(|n| *n > 0) else {
        return stream;
    };
    let mut pulled = 0usize;
    stream
        .then(move |element| {
            pulled += 1;
            let batch_done = pulled % n == 0;
            async move {
                if batch_done {
                    tokio::task::yield_now().await;
                }
                element
            }
        })
        .boxed()
}

/// Deliver at most `n` elements, then stop polling upstream.
fn take(stream: ResponseStream, n: Option<usize>) -> ResponseStream {
    match n {
        Some(n) => stream.take(n).boxed(),
        None => stream,
    }
}

/// Insert a minimum interval before each element delivery.
fn delay(stream: ResponseStream, interval: Option<Duration>) -> ResponseStream {
    let Some(interval) = interval else {
        return stream;
    };
    stream
        .then(move |element| async move {
            tokio::time::sleep(interval).await;
            element
        })
        .boxed()
}

/// Terminal consumer: echo each element to stdout unless quiet, and
/// surface the first stream error to the caller.
async fn drain(mut stream: ResponseStream, quiet: bool) -> Result<()> {
    while let Some(element) = stream.next().await {
        let bytes: Bytes = element?;
        if !quiet {
            console::echo_element(&bytes)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WirecallError;
    use std::time::Instant;

    fn elements(bodies: &[&'static [u8]]) -> ResponseStream {
        stream::iter(
            bodies
                .iter()
                .map(|b| Ok(Bytes::from_static(b)))
                .collect::<Vec<_>>(),
        )
        .boxed()
    }

    fn endless(body: &'static [u8]) -> ResponseStream {
        stream::repeat_with(move || Ok(Bytes::from_static(body))).boxed()
    }

    fn quiet_options() -> PipelineOptions {
        PipelineOptions {
            quiet: true,
            ..PipelineOptions::default()
        }
    }

    #[tokio::test]
    async fn test_all_stages_absent_is_identity() {
        let result = run(elements(&[b"a", b"b", b"c"]), None, &quiet_options()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_take_bounds_endless_stream() {
        let mut options = quiet_options();
        options.take = Some(5);
        let result = run(endless(b"x"), None, &options).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_sink_records_exactly_taken_elements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let sink = OutputSink::prepare(Some(&path)).await.unwrap();

        let mut options = quiet_options();
        options.take = Some(2);
        run(endless(b"el!"), sink, &options).await.unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content, b"el!el!");
    }

    #[tokio::test]
    async fn test_sink_content_unaffected_by_delay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let sink = OutputSink::prepare(Some(&path)).await.unwrap();

        let mut options = quiet_options();
        options.take = Some(2);
        options.delay = Some(Duration::from_millis(10));
        run(elements(&[b"one", b"two", b"three"]), sink, &options)
            .await
            .unwrap();

        // Raw concatenation of the first two elements, no gaps.
        let content = std::fs::read(&path).unwrap();
        assert_eq!(content, b"onetwo");
    }

    #[tokio::test]
    async fn test_delay_spaces_deliveries() {
        let mut options = quiet_options();
        options.delay = Some(Duration::from_millis(20));

        let start = Instant::now();
        run(elements(&[b"a", b"b", b"c"]), None, &options)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_limit_rate_preserves_all_elements_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let sink = OutputSink::prepare(Some(&path)).await.unwrap();

        let mut options = quiet_options();
        options.limit_rate = Some(2);
        run(elements(&[b"1", b"2", b"3", b"4", b"5"]), sink, &options)
            .await
            .unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content, b"12345");
    }

    #[tokio::test]
    async fn test_stream_error_aborts_and_keeps_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let sink = OutputSink::prepare(Some(&path)).await.unwrap();

        let stream: ResponseStream = stream::iter(vec![
            Ok(Bytes::from_static(b"good")),
            Err(WirecallError::Remote("boom".to_string())),
            Ok(Bytes::from_static(b"never")),
        ])
        .boxed();

        let result = run(stream, sink, &quiet_options()).await;
        assert!(matches!(result, Err(WirecallError::Remote(_))));

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content, b"good");
    }

    #[tokio::test]
    async fn test_log_stage_leaves_content_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let sink = OutputSink::prepare(Some(&path)).await.unwrap();

        let mut options = quiet_options();
        options.log = Some("test".to_string());
        run(elements(&[b"a", b"b"]), sink, &options).await.unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content, b"ab");
    }
}

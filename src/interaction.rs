//! Interaction variants and their execution.
//!
//! The four variants map one invocation onto the client trait:
//!
//! - request/response: one payload out, one element back
//! - request/stream: one payload out, an element stream back
//! - request/channel: a payload stream out, an element stream back
//! - fire-and-forget: one payload out, nothing back
//!
//! The streaming variants hand their response stream to the transform
//! pipeline; request/response applies the sink, log, and echo steps
//! directly since there is exactly one element. Fire-and-forget never
//! touches the output destination, even when one is configured.

use crate::client::MessagingClient;
use crate::config::InvocationConfig;
use crate::console;
use crate::error::Result;
use crate::payload;
use crate::pipeline;
use crate::sink::OutputSink;

/// The four request/response shapes an invocation can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionVariant {
    /// One payload out, one response element back.
    RequestResponse,
    /// One payload out, a response stream back.
    RequestStream,
    /// Payload stream out, response stream back.
    RequestChannel,
    /// One payload out, no response.
    FireAndForget,
}

impl InteractionVariant {
    /// Execute this variant against a connected client.
    pub async fn execute(
        &self,
        client: &dyn MessagingClient,
        config: &InvocationConfig,
    ) -> Result<()> {
        match self {
            Self::RequestResponse => request_response(client, config).await,
            Self::RequestStream => request_stream(client, config).await,
            Self::RequestChannel => request_channel(client, config).await,
            Self::FireAndForget => fire_and_forget(client, config).await,
        }
    }
}

async fn request_response(client: &dyn MessagingClient, config: &InvocationConfig) -> Result<()> {
    let sink = OutputSink::prepare(config.output.as_deref()).await?;
    let payload = payload::single(config).await?;

    let response = client.request_response(payload).await?;

    if let Some(mut sink) = sink {
        sink.write(&response).await?;
    }
    if let Some(label) = &config.log {
        tracing::info!(label = %label, bytes = response.len(), "response");
    }
    if !config.quiet {
        console::echo_element(&response)?;
    }
    Ok(())
}

async fn request_stream(client: &dyn MessagingClient, config: &InvocationConfig) -> Result<()> {
    let sink = OutputSink::prepare(config.output.as_deref()).await?;
    let payload = payload::single(config).await?;

    let responses = client.request_stream(payload).await?;
    pipeline::run(responses, sink, &config.pipeline_options()).await
}

async fn request_channel(client: &dyn MessagingClient, config: &InvocationConfig) -> Result<()> {
    let sink = OutputSink::prepare(config.output.as_deref()).await?;
    let payloads = payload::stream(config)?;

    let responses = client.request_channel(payloads).await?;
    pipeline::run(responses, sink, &config.pipeline_options()).await
}

async fn fire_and_forget(client: &dyn MessagingClient, config: &InvocationConfig) -> Result<()> {
    let payload = payload::single(config).await?;
    client.fire_and_forget(payload).await?;
    if let Some(label) = &config.log {
        tracing::info!(label = %label, "fire-and-forget sent");
    }
    Ok(())
}

//! Command-line interface.
//!
//! The argument surface follows the curl model: one positional target
//! URI, a flag to pick the interaction variant, and options for the
//! payload body, metadata, output destination, and pipeline stages.
//! Parsing produces a [`ConnectTarget`] plus an immutable
//! [`InvocationConfig`]; nothing below the CLI layer ever sees clap
//! types.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use clap::{ArgGroup, Parser};

use crate::config::{InputSource, InvocationConfig};
use crate::error::{Result, WirecallError};
use crate::interaction::InteractionVariant;
use crate::metadata::MetadataEntry;
use crate::transport::ConnectTarget;

/// Command-line client for bidirectional messaging endpoints.
#[derive(Debug, Parser)]
#[command(name = "wirecall", version, about)]
#[command(group(ArgGroup::new("variant").args(["request", "stream", "channel", "fnf"])))]
#[command(group(ArgGroup::new("body").args(["data", "load"])))]
pub struct Cli {
    /// Target endpoint URI (tcp://host:port or unix:///path).
    pub target: String,

    /// Request/response interaction (the default).
    #[arg(long)]
    pub request: bool,

    /// Request/stream interaction.
    #[arg(long)]
    pub stream: bool,

    /// Bidirectional channel interaction.
    #[arg(long)]
    pub channel: bool,

    /// Fire-and-forget interaction.
    #[arg(long)]
    pub fnf: bool,

    /// Payload body, or "-" to read from stdin.
    #[arg(short, long)]
    pub data: Option<String>,

    /// Read the payload body from a file.
    #[arg(long, value_name = "FILE")]
    pub load: Option<PathBuf>,

    /// Routing metadata entry.
    #[arg(long, value_name = "ROUTE")]
    pub route: Option<String>,

    /// Additional metadata entry payload.
    #[arg(short, long, value_name = "METADATA")]
    pub metadata: Vec<String>,

    /// MIME type for --metadata entries.
    #[arg(long, value_name = "MIME", default_value = "application/json")]
    pub metadata_mime_type: String,

    /// Append raw response bytes to a file.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Log each response element, optionally under a label.
    #[arg(long, value_name = "LABEL", num_args = 0..=1, default_missing_value = "wirecall")]
    pub log: Option<String>,

    /// Pull at most N response elements per demand batch.
    #[arg(long, value_name = "N")]
    pub limit_rate: Option<usize>,

    /// Consume at most N response elements, then cancel.
    #[arg(long, value_name = "N")]
    pub take: Option<usize>,

    /// Minimum milliseconds between delivered response elements.
    #[arg(long, value_name = "MS")]
    pub delay_elements: Option<u64>,

    /// Suppress console echo of response elements.
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Resolve the parsed arguments into a connect target and an
    /// invocation configuration. Reads `--load` files here so the
    /// rest of the program only ever sees bytes.
    pub async fn into_invocation(self) -> Result<(ConnectTarget, InvocationConfig)> {
        let target: ConnectTarget = self.target.parse()?;

        let input = match (&self.data, &self.load) {
            (Some(data), _) if data == "-" => InputSource::Stdin,
            (Some(data), _) => InputSource::Body(Bytes::from(data.clone())),
            (None, Some(path)) => InputSource::Body(Bytes::from(tokio::fs::read(path).await?)),
            (None, None) => InputSource::Body(Bytes::new()),
        };

        let mut config = InvocationConfig::new(self.interaction(), input);
        config.output = self.output;
        config.log = self.log;
        config.limit_rate = self.limit_rate;
        config.take = self.take;
        config.delay_elements = self.delay_elements.map(Duration::from_millis);
        config.quiet = self.quiet;

        if let Some(route) = self.route {
            config.metadata.push(MetadataEntry::route(&route));
        }
        for entry in &self.metadata {
            config.metadata.push(MetadataEntry::new(
                &self.metadata_mime_type,
                Bytes::from(entry.clone()),
            ));
        }

        Ok((target, config))
    }

    fn interaction(&self) -> InteractionVariant {
        if self.stream {
            InteractionVariant::RequestStream
        } else if self.channel {
            InteractionVariant::RequestChannel
        } else if self.fnf {
            InteractionVariant::FireAndForget
        } else {
            InteractionVariant::RequestResponse
        }
    }
}

/// Validate pipeline numeric arguments before connecting.
pub fn validate(config: &InvocationConfig) -> Result<()> {
    if config.limit_rate == Some(0) {
        return Err(WirecallError::Protocol(
            "--limit-rate must be at least 1".to_string(),
        ));
    }
    Ok(())
}

//! Invocation configuration.
//!
//! [`InvocationConfig`] is an immutable snapshot of everything one
//! invocation needs: the interaction variant, the payload input
//! source, the optional output destination, the pipeline toggles, and
//! the metadata entries. It is built once (by the CLI layer or a
//! test) and never mutated afterwards.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;

use crate::interaction::InteractionVariant;
use crate::metadata::MetadataEntry;

/// Where outbound payload bodies come from.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// A pre-loaded static body.
    Body(Bytes),
    /// Live line-oriented reads from stdin.
    Stdin,
}

/// Immutable configuration for one invocation.
#[derive(Debug, Clone)]
pub struct InvocationConfig {
    /// Which interaction variant to execute.
    pub interaction: InteractionVariant,
    /// Payload body source.
    pub input: InputSource,
    /// Optional destination for raw response bytes.
    pub output: Option<PathBuf>,
    /// Diagnostic log label; `None` disables the log stage.
    pub log: Option<String>,
    /// Demand batch size for the rate-limit stage.
    pub limit_rate: Option<usize>,
    /// Maximum number of response elements to consume.
    pub take: Option<usize>,
    /// Minimum interval between delivered response elements.
    pub delay_elements: Option<Duration>,
    /// Suppress console echo of response elements.
    pub quiet: bool,
    /// Metadata entries composed onto every outbound payload.
    pub metadata: Vec<MetadataEntry>,
}

impl InvocationConfig {
    /// Create a configuration with all optional behaviors disabled.
    pub fn new(interaction: InteractionVariant, input: InputSource) -> Self {
        Self {
            interaction,
            input,
            output: None,
            log: None,
            limit_rate: None,
            take: None,
            delay_elements: None,
            quiet: false,
            metadata: Vec::new(),
        }
    }

    /// Project the pipeline-relevant options.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            log: self.log.clone(),
            limit_rate: self.limit_rate,
            take: self.take,
            delay: self.delay_elements,
            quiet: self.quiet,
        }
    }
}

/// Options consumed by the response transform pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Diagnostic log label; `None` disables the log stage.
    pub log: Option<String>,
    /// Demand batch size for the rate-limit stage.
    pub limit_rate: Option<usize>,
    /// Maximum number of elements to consume.
    pub take: Option<usize>,
    /// Minimum interval between delivered elements.
    pub delay: Option<Duration>,
    /// Suppress console echo.
    pub quiet: bool,
}

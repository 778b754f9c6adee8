//! wirecall: a command-line client for bidirectional, multiplexed
//! request/response messaging endpoints.
//!
//! The crate is split along the invocation's lifecycle:
//!
//! ```text
//! cli ─→ config ─→ interaction ─┬→ payload (outbound)
//!                               ├→ client  (wire protocol)
//!                               └→ pipeline ─→ sink / console
//! ```
//!
//! - [`protocol`]: frame layout, header codec, and incremental parser
//! - [`transport`]: target URIs and TCP/Unix socket connection
//! - [`writer`]: single-writer outbound task over the transport
//! - [`client`]: multiplexed client and the [`client::MessagingClient`]
//!   trait the interaction layer programs against
//! - [`metadata`]: per-payload metadata composition
//! - [`payload`]: static and live (stdin) payload production
//! - [`pipeline`]: response transforms (record, log, rate limit,
//!   take, delay) and the console echo
//! - [`interaction`]: the four interaction variants
//! - [`cli`] / [`config`]: argument parsing and the invocation snapshot

pub mod cli;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod interaction;
pub mod metadata;
pub mod payload;
pub mod pipeline;
pub mod protocol;
pub mod sink;
pub mod transport;
pub mod writer;

pub use client::{MessagingClient, ResponseStream, Setup, WireClient};
pub use config::{InputSource, InvocationConfig, PipelineOptions};
pub use error::{Result, WirecallError};
pub use interaction::InteractionVariant;
pub use payload::{Payload, PayloadStream};
pub use transport::ConnectTarget;

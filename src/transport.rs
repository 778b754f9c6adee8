//! Transport connection for the wire client.
//!
//! The CLI dials out to a remote endpoint over TCP (default) or a
//! Unix domain socket:
//! - `tcp://host:port` (a bare `host:port` is treated as TCP)
//! - `unix:///path/to/socket` (Unix only)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Result, WirecallError};

/// A connected duplex byte transport.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Parsed connect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// TCP endpoint as `host:port`.
    Tcp(String),
    /// Unix domain socket path.
    Unix(PathBuf),
}

impl FromStr for ConnectTarget {
    type Err = WirecallError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix("tcp://") {
            if rest.is_empty() {
                return Err(WirecallError::Target(s.to_string()));
            }
            return Ok(Self::Tcp(rest.to_string()));
        }
        if let Some(rest) = s.strip_prefix("unix://") {
            if rest.is_empty() {
                return Err(WirecallError::Target(s.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(rest)));
        }
        if s.contains("://") {
            return Err(WirecallError::Target(s.to_string()));
        }
        if s.is_empty() {
            return Err(WirecallError::Target(s.to_string()));
        }
        Ok(Self::Tcp(s.to_string()))
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Connect to the target and return a boxed duplex transport.
pub async fn connect(target: &ConnectTarget) -> Result<Box<dyn Transport>> {
    match target {
        ConnectTarget::Tcp(addr) => {
            let stream = tokio::net::TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        ConnectTarget::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(path).await?;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        ConnectTarget::Unix(_) => Err(WirecallError::Target(
            "unix:// targets are not supported on this platform".to_string(),
        )),
    }
}

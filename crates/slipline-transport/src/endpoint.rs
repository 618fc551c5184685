//! Transport addressing.
//!
//! Endpoints are written as `serial:<path>`, `unix:<path>`, or a bare path.
//! A bare path pointing at a character device is treated as a serial port,
//! anything else as a Unix socket.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::TransportError;

/// Default serial speed, matching common SLIP firmware.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Where a link's byte channel lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A serial device opened in raw mode at `baud`.
    Serial { path: PathBuf, baud: u32 },
    /// A connected Unix domain socket.
    Unix { path: PathBuf },
}

impl Endpoint {
    /// Serial endpoint at the default baud rate.
    pub fn serial(path: impl Into<PathBuf>) -> Self {
        Self::Serial {
            path: path.into(),
            baud: DEFAULT_BAUD,
        }
    }

    /// Unix socket endpoint.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Override the speed parameter. No effect on socket endpoints.
    pub fn with_baud(self, baud: u32) -> Self {
        match self {
            Self::Serial { path, .. } => Self::Serial { path, baud },
            other => other,
        }
    }

    /// Filesystem path of the endpoint.
    pub fn path(&self) -> &Path {
        match self {
            Self::Serial { path, .. } | Self::Unix { path } => path,
        }
    }

    /// Speed parameter, if the endpoint has one.
    pub fn baud(&self) -> Option<u32> {
        match self {
            Self::Serial { baud, .. } => Some(*baud),
            Self::Unix { .. } => None,
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Self::Serial { .. } => "serial",
            Self::Unix { .. } => "unix-domain-socket",
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if let Some(path) = input.strip_prefix("serial:") {
            return non_empty(path).map(Self::serial);
        }
        if let Some(path) = input.strip_prefix("unix:") {
            return non_empty(path).map(Self::unix);
        }

        let path = non_empty(input)?;
        if is_char_device(Path::new(path)) {
            Ok(Self::serial(path))
        } else {
            Ok(Self::unix(path))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { path, baud } => write!(f, "serial:{}@{baud}", path.display()),
            Self::Unix { path } => write!(f, "unix:{}", path.display()),
        }
    }
}

fn non_empty(path: &str) -> Result<&str, TransportError> {
    if path.is_empty() {
        return Err(TransportError::InvalidEndpoint(
            "endpoint path must not be empty".to_string(),
        ));
    }
    Ok(path)
}

#[cfg(unix)]
fn is_char_device(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;

    std::fs::metadata(path)
        .map(|m| m.file_type().is_char_device())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_char_device(_path: &Path) -> bool {
    false
}

use std::path::PathBuf;

/// Errors surfaced by a [`Link`](crate::Link).
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error (acquisition or configuration).
    #[error("transport error: {0}")]
    Transport(#[from] slipline_transport::TransportError),

    /// Frame-level error (I/O while reading or writing, busy writer, oversize payload).
    #[error("frame error: {0}")]
    Frame(#[from] slipline_frame::FrameError),

    /// The link has been closed; no further frames are sent or delivered.
    #[error("link closed")]
    Closed,

    /// The link has not been opened yet.
    #[error("link not open")]
    NotOpen,

    /// `open` was called on a link that is already open.
    #[error("link already open")]
    AlreadyOpen,

    /// The configuration is unusable.
    #[error("invalid link config: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON configuration error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors that can occur while writing or reading SLIP frames.
///
/// Overflow and malformed escape sequences are not errors: the decoder
/// recovers from them locally and reports them as events and statistics.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A frame write is already in flight on this writer.
    #[error("frame write already in progress")]
    Busy,

    /// The receive buffer capacity must be at least one byte.
    #[error("invalid receive buffer capacity: {0}")]
    InvalidCapacity(usize),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport reached end of stream.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for I/O errors that only mean "nothing happened yet"
    /// (an expired read or write timeout).
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

//! SLIP framing over serial ports and sockets.
//!
//! slipline delimits frames with `0xC0`, escapes reserved bytes inside
//! them, and reassembles frames from a byte stream no matter how the
//! transport splits it.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial ports, Unix sockets, endpoint addressing
//! - [`frame`]: encoder, decoder state machine, frame reader and writer
//! - [`link`]: duplex link with lifecycle and event callbacks (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use slipline_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use slipline_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use slipline_link::*;
}

//! Byte channels that SLIP frames travel over.
//!
//! Provides a unified interface over the transports a SLIP link is usually
//! run on:
//! - Serial ports (raw-mode TTYs with a configured baud rate)
//! - Unix domain sockets (loopback, test harnesses, serial-over-socket bridges)
//!
//! This is the lowest layer of slipline. The framing core only ever sees a
//! [`SlipStream`] (or any other [`WriteTransport`]) as an ordered byte channel.

pub mod endpoint;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod serial;
#[cfg(unix)]
mod sys;
#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, DEFAULT_BAUD};
pub use error::{Result, TransportError};
pub use traits::{SlipStream, WriteTransport};

#[cfg(unix)]
pub use serial::SerialPort;
#[cfg(unix)]
pub use uds::UnixDomainSocket;

//! A duplex SLIP link.
//!
//! Ties a transport, the frame writer, and the receive state machine
//! together behind one lifecycle:
//!
//! ```text
//! Unopened --open--> Open --close / peer EOF--> Closed
//!                      \--transport failure--> Errored
//! ```
//!
//! Inbound frames and overflow notices arrive as [`LinkHandler`] callbacks.
//! A [`CloseHandle`] stops a running link from another thread.

pub mod config;
pub mod error;
pub mod handler;
pub mod link;

pub use config::{LinkConfig, DEFAULT_READ_TIMEOUT_MS};
pub use error::{LinkError, Result};
pub use handler::{CloseHandle, LinkHandler};
pub use link::{Link, LinkState};

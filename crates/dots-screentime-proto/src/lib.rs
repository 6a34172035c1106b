//! Local control protocol between the screen time daemon and its clients.
//!
//! Every message is a 4-byte little-endian length followed by that many
//! bytes of UTF-8 JSON. A connection carries exactly one request and one
//! response.

pub mod action;
pub mod client;
pub mod dto;
pub mod envelope;
pub mod error;
pub mod events;
pub mod frame;

pub use action::Action;
pub use client::ControlClient;
pub use envelope::{IpcRequest, IpcResponse};
pub use error::{ClientError, ProtocolError};
pub use events::DomainEvent;

/// Reported by `Ping`.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

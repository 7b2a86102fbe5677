//! WebSocket Session Management
//!
//! This module contains the client side of the puppeting protocol. It is
//! structured into submodules for clarity:
//!
//! - `protocol`: JSON message formats for the handshake, commands and replies.
//! - `transport`: the message transport trait and its tokio-tungstenite implementation.
//! - `session`: the `Controller` and its connection lifecycle, from handshake to teardown.
//! - `dispatch`: serialized command round trips and the catalog/query helpers.

mod dispatch;
pub mod protocol;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;

pub use protocol::{Command, Response};
pub use session::{ConnectionState, Controller};

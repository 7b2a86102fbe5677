//! Puppet Controller Library Crate
//!
//! This library contains the client for a remote animation-puppeting service:
//! configuration, the connection lifecycle, serialized command dispatch,
//! round-trip latency tracking and the watchdog that alerts on slow sessions.
//! The `puppetctl` binary is a thin wrapper around this library.

pub mod config;
pub mod error;
pub mod latency;
pub mod notifier;
pub mod pipeline;
pub mod watchdog;
pub mod ws;

pub use config::{Config, ControllerConfig};
pub use error::ControllerError;
pub use ws::{Command, ConnectionState, Controller, Response};

//! Manages the connection lifecycle: open, handshake, watchdog, teardown.

use super::{
    protocol::{self, HandshakeRequest, VERSION_ACK_FIELD},
    transport::{Connector, Transport, WsConnector},
};
use crate::{
    config::ControllerConfig,
    error::ControllerError,
    latency::LatencySampler,
    notifier::{AlertNotifier, LogNotifier},
    watchdog::{Watchdog, WatchdogHandle, WatchdogState},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of the single connection owned by a [`Controller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticated,
    Closed,
}

/// Client for the puppeting service.
///
/// One controller owns one connection. Commands may be issued from several
/// tasks at once; they are serialized on the connection because the protocol
/// matches replies to requests purely by order.
pub struct Controller {
    pub(super) config: Arc<ControllerConfig>,
    connector: Arc<dyn Connector>,
    notifier: Arc<dyn AlertNotifier>,
    pub(super) sampler: Arc<LatencySampler>,
    pub(super) state: Mutex<ConnectionState>,
    /// Holding this lock is holding the right to use the wire.
    pub(super) link: tokio::sync::Mutex<Option<Box<dyn Transport>>>,
    /// Held for the whole of `connect()` and `close()`, so lifecycle
    /// transitions never interleave.
    lifecycle: tokio::sync::Mutex<()>,
    watchdog: tokio::sync::Mutex<Option<WatchdogHandle>>,
    /// Written by the watchdog task itself once it has been spawned.
    watchdog_state: Arc<Mutex<WatchdogState>>,
}

impl Controller {
    /// Creates a controller that talks WebSocket and logs alerts.
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_parts(config, Arc::new(WsConnector), Arc::new(LogNotifier))
    }

    /// Creates a controller with an explicit transport and alert sink.
    pub fn with_parts(
        config: ControllerConfig,
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        let sampler = Arc::new(LatencySampler::new(config.latency_window));
        Self {
            config: Arc::new(config),
            connector,
            notifier,
            sampler,
            state: Mutex::new(ConnectionState::Disconnected),
            link: tokio::sync::Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            watchdog: tokio::sync::Mutex::new(None),
            watchdog_state: Arc::new(Mutex::new(WatchdogState::Idle)),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn watchdog_state(&self) -> WatchdogState {
        *self.watchdog_state.lock()
    }

    /// The latency window shared with the watchdog.
    pub fn latency(&self) -> &Arc<LatencySampler> {
        &self.sampler
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Opens the transport, performs the handshake and starts the watchdog.
    ///
    /// Failures are reported, never retried; the state falls back to
    /// `Disconnected`. Calling this while already authenticated does nothing.
    /// A concurrent `close()` waits until this call has finished.
    #[instrument(skip(self), fields(url = %self.config.url()))]
    pub async fn connect(&self) -> Result<(), ControllerError> {
        let _lifecycle = self.lifecycle.lock().await;
        {
            let mut state = self.state.lock();
            match *state {
                ConnectionState::Connecting | ConnectionState::Authenticated => {
                    warn!(state = ?*state, "connect() called on a live connection; ignoring.");
                    return Ok(());
                }
                ConnectionState::Disconnected | ConnectionState::Closed => {
                    *state = ConnectionState::Connecting;
                }
            }
        }

        let url = self.config.url();
        info!("Connecting to puppeting service");
        let mut transport = match self.connector.open(&url).await {
            Ok(transport) => transport,
            Err(source) => {
                error!(error = %source, "Failed to open transport");
                self.set_state(ConnectionState::Disconnected);
                return Err(ControllerError::Connection { url, source });
            }
        };

        if let Err(e) = self.handshake(transport.as_mut(), &url).await {
            error!(error = %e, "Handshake failed");
            if let Err(close_err) = transport.close().await {
                debug!(error = %close_err, "Error closing rejected transport");
            }
            self.set_state(ConnectionState::Disconnected);
            return Err(e);
        }

        *self.link.lock().await = Some(transport);

        let handle = Watchdog::new(
            self.sampler.clone(),
            self.notifier.clone(),
            self.config.watchdog_interval,
            self.config.alert_threshold,
        )
        .spawn_with_state(self.watchdog_state.clone());
        *self.watchdog.lock().await = Some(handle);

        self.set_state(ConnectionState::Authenticated);
        info!("Connected and authenticated.");
        Ok(())
    }

    async fn handshake(
        &self,
        transport: &mut dyn Transport,
        url: &str,
    ) -> Result<(), ControllerError> {
        let request = HandshakeRequest {
            identity: &self.config.identity,
            protocol_version: self.config.protocol_version,
        };
        let payload = serde_json::to_string(&request)?;

        let connection_error = |source| ControllerError::Connection {
            url: url.to_string(),
            source,
        };
        transport
            .send_text(payload)
            .await
            .map_err(connection_error)?;
        let reply = transport.recv_text().await.map_err(connection_error)?;

        if !protocol::acknowledges_version(&reply) {
            return Err(ControllerError::Authentication {
                reason: format!("handshake reply has no `{VERSION_ACK_FIELD}` field"),
                reply,
            });
        }
        debug!(%reply, "Handshake accepted");
        Ok(())
    }

    /// Tears the session down. Idempotent.
    ///
    /// Waits for any in-flight command, sends a close signal, then stops the
    /// watchdog and waits for it to exit. When this returns no background
    /// work is left running, including when another `connect()` or `close()`
    /// was in progress at the time of the call.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state() == ConnectionState::Closed {
            debug!("close() on a closed connection; nothing to do.");
            return;
        }

        let transport = self.link.lock().await.take();
        if let Some(mut transport) = transport {
            if let Err(e) = transport.close().await {
                warn!(error = %e, "Error while closing transport");
            }
        }

        let handle = self.watchdog.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }

        self.set_state(ConnectionState::Closed);
        info!("Connection closed.");
    }
}

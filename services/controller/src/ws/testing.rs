//! In-memory transport used by the controller's unit tests.

use super::transport::{Connector, Transport, TransportError};
use crate::config::ControllerConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite;

pub(crate) fn test_config() -> ControllerConfig {
    ControllerConfig {
        identity: "test-plugin".to_string(),
        alert_threshold: Duration::from_secs(1),
        ..Default::default()
    }
}

enum Step {
    Reply { text: String, delay: Duration },
    Fail,
}

#[derive(Default)]
struct Inner {
    refuse: bool,
    fail_next_send: bool,
    steps: VecDeque<Step>,
    opened: Vec<String>,
    sent: Vec<String>,
    wire_log: Vec<String>,
    closes: usize,
}

/// Scripted peer: replies are queued up front and handed out in order.
#[derive(Clone, Default)]
pub(crate) struct Script {
    inner: Arc<Mutex<Inner>>,
}

impl Script {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(&self, text: &str) {
        self.reply_after(text, Duration::ZERO);
    }

    /// Queues a reply that arrives `delay` after it is awaited.
    pub(crate) fn reply_after(&self, text: &str, delay: Duration) {
        self.inner.lock().steps.push_back(Step::Reply {
            text: text.to_string(),
            delay,
        });
    }

    pub(crate) fn fail_next_recv(&self) {
        self.inner.lock().steps.push_back(Step::Fail);
    }

    pub(crate) fn fail_next_send(&self) {
        self.inner.lock().fail_next_send = true;
    }

    pub(crate) fn refuse_connections(&self) {
        self.inner.lock().refuse = true;
    }

    pub(crate) fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(ScriptedConnector {
            script: self.clone(),
        })
    }

    pub(crate) fn opened_urls(&self) -> Vec<String> {
        self.inner.lock().opened.clone()
    }

    /// Every frame written so far, in order.
    pub(crate) fn sent(&self) -> Vec<String> {
        self.inner.lock().sent.clone()
    }

    pub(crate) fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|s| serde_json::from_str(s).expect("sent frame is JSON"))
            .collect()
    }

    /// Interleaving of writes (`send:`) and completed reads (`recv:`).
    pub(crate) fn wire_log(&self) -> Vec<String> {
        self.inner.lock().wire_log.clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.inner.lock().closes
    }
}

struct ScriptedConnector {
    script: Script,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let mut inner = self.script.inner.lock();
        if inner.refuse {
            return Err(TransportError::WebSocket(tungstenite::Error::Io(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            )));
        }
        inner.opened.push(url.to_string());
        Ok(Box::new(ScriptedTransport {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedTransport {
    script: Script,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let mut inner = self.script.inner.lock();
        if std::mem::take(&mut inner.fail_next_send) {
            return Err(TransportError::Closed);
        }
        inner.wire_log.push(format!("send:{text}"));
        inner.sent.push(text);
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String, TransportError> {
        let step = self.script.inner.lock().steps.pop_front();
        match step {
            Some(Step::Reply { text, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                self.script.inner.lock().wire_log.push(format!("recv:{text}"));
                Ok(text)
            }
            Some(Step::Fail) | None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.script.inner.lock().closes += 1;
        Ok(())
    }
}

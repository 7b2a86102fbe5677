//! Command dispatch: one request, one reply, one latency sample.

use super::{
    protocol::{Command, Response},
    session::{ConnectionState, Controller},
    transport::{Transport, TransportError},
};
use crate::error::{CatalogKind, ControllerError};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Hotkey type that plays a motion.
const ANIMATION_HOTKEY: &str = "TriggerAnimation";

impl Controller {
    /// Sends `command` and waits for its reply.
    ///
    /// Only one command is on the wire at a time; concurrent callers queue on
    /// the connection lock. Every reply that arrives adds a latency sample,
    /// including replies that turn out to be the wrong type. Transport
    /// failures add nothing.
    #[instrument(skip_all, fields(request_type = %command.name))]
    pub async fn send_command(&self, command: Command) -> Result<Response, ControllerError> {
        let state = self.state();
        if state != ConnectionState::Authenticated {
            warn!(?state, "Refusing command: not authenticated.");
            return Err(ControllerError::NotConnected { state });
        }
        let payload = command.to_wire()?;

        let mut link = self.link.lock().await;
        let Some(transport) = link.as_mut() else {
            // close() won the race for the lock.
            return Err(ControllerError::NotConnected {
                state: self.state(),
            });
        };

        let started = Instant::now();
        let reply = match round_trip(transport.as_mut(), payload).await {
            Ok(reply) => reply,
            Err(source) => {
                error!(error = %source, "Transport failed mid-command");
                return Err(ControllerError::Transport {
                    request_type: command.name,
                    source,
                });
            }
        };
        let latency = started.elapsed();
        self.sampler.append(latency);
        drop(link);

        let latency_ms = latency.as_secs_f64() * 1000.0;
        if latency > self.config.alert_threshold {
            warn!(latency_ms, "Slow round trip");
        } else {
            debug!(latency_ms, "Round trip complete");
        }

        let response = Response::parse(reply);
        if !response.answers(&command.name) {
            warn!(got = %response.discriminator, "Reply does not match request type");
            return Err(ControllerError::Protocol {
                expected: command.name,
                response,
            });
        }
        Ok(response)
    }

    /// Shows the expression configured under `key`.
    pub async fn set_expression(&self, key: &str) -> Result<Response, ControllerError> {
        let name = self.lookup(CatalogKind::Expression, key)?;
        info!(key, expression = %name, "Setting expression");
        self.send_command(Command::new("SetExpression").param("expressionName", name))
            .await
    }

    /// Plays the motion configured under `key`.
    pub async fn set_motion(&self, key: &str) -> Result<Response, ControllerError> {
        let name = self.lookup(CatalogKind::Motion, key)?;
        info!(key, motion = %name, "Setting motion");
        self.send_command(Command::new("SetMotion").param("motionName", name))
            .await
    }

    /// Triggers a hotkey, optionally on a specific item instance.
    pub async fn trigger_hotkey(
        &self,
        hotkey_id: &str,
        item_instance_id: Option<&str>,
    ) -> Result<Response, ControllerError> {
        self.send_command(
            Command::new("HotkeyTrigger")
                .param("hotkeyID", hotkey_id)
                .optional_param("itemInstanceID", item_instance_id),
        )
        .await
    }

    /// Lists hotkeys of the current model, or of `model_id`.
    pub async fn available_hotkeys(
        &self,
        model_id: Option<&str>,
    ) -> Result<Response, ControllerError> {
        self.send_command(
            Command::new("HotkeysInCurrentModel").optional_param("modelID", model_id),
        )
        .await
    }

    /// Queries expression state, optionally for a single expression file.
    pub async fn expression_state(
        &self,
        details: bool,
        expression_file: Option<&str>,
    ) -> Result<Response, ControllerError> {
        self.send_command(
            Command::new("ExpressionState")
                .param("details", details)
                .optional_param("expressionFile", expression_file),
        )
        .await
    }

    /// Queries the currently loaded model.
    pub async fn current_model(&self) -> Result<Response, ControllerError> {
        self.send_command(Command::new("CurrentModel")).await
    }

    /// Triggers the `TriggerAnimation` hotkey named `animation_name`.
    ///
    /// Lists the current model's hotkeys first, so this costs two round trips.
    pub async fn trigger_animation(&self, animation_name: &str) -> Result<Response, ControllerError> {
        let hotkeys = self.available_hotkeys(None).await?;
        let hotkey_id = hotkeys
            .items("availableHotkeys")
            .find(|hotkey| {
                hotkey.get("type").and_then(Value::as_str) == Some(ANIMATION_HOTKEY)
                    && hotkey.get("name").and_then(Value::as_str) == Some(animation_name)
            })
            .and_then(|hotkey| hotkey.get("hotkeyID"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                warn!(animation = animation_name, "No matching animation hotkey");
                ControllerError::UnknownAnimation {
                    name: animation_name.to_string(),
                }
            })?;
        info!(animation = animation_name, %hotkey_id, "Triggering animation");
        self.trigger_hotkey(&hotkey_id, None).await
    }

    /// Catalog key of the active expression, if it is one we know.
    pub async fn current_expression(&self) -> Result<Option<String>, ControllerError> {
        let state = self.expression_state(false, None).await?;
        let active = state
            .items("expressions")
            .filter(|expression| expression.get("active").and_then(Value::as_bool) == Some(true))
            .filter_map(|expression| expression.get("name").and_then(Value::as_str))
            .find_map(|name| self.reverse_lookup(CatalogKind::Expression, name));
        debug!(key = ?active, "Current expression");
        Ok(active)
    }

    /// Catalog key of the active animation hotkey, if it is one we know.
    pub async fn current_motion(&self) -> Result<Option<String>, ControllerError> {
        let hotkeys = self.available_hotkeys(None).await?;
        let active = hotkeys
            .items("availableHotkeys")
            .filter(|hotkey| {
                hotkey.get("type").and_then(Value::as_str) == Some(ANIMATION_HOTKEY)
                    && hotkey.get("isActive").and_then(Value::as_bool) == Some(true)
            })
            .filter_map(|hotkey| hotkey.get("file").and_then(Value::as_str))
            .find_map(|file| self.reverse_lookup(CatalogKind::Motion, file));
        debug!(key = ?active, "Current motion");
        Ok(active)
    }

    fn catalog(&self, kind: CatalogKind) -> &BTreeMap<String, String> {
        match kind {
            CatalogKind::Expression => &self.config.expressions,
            CatalogKind::Motion => &self.config.motions,
        }
    }

    fn reverse_lookup(&self, kind: CatalogKind, name: &str) -> Option<String> {
        self.catalog(kind)
            .iter()
            .find(|(_, configured)| configured.as_str() == name)
            .map(|(key, _)| key.clone())
    }

    fn lookup(&self, kind: CatalogKind, key: &str) -> Result<String, ControllerError> {
        self.catalog(kind)
            .get(key)
            .cloned()
            .ok_or_else(|| ControllerError::UnknownKey {
                kind,
                key: key.to_string(),
            })
    }
}

async fn round_trip(
    transport: &mut dyn Transport,
    payload: String,
) -> Result<String, TransportError> {
    transport.send_text(payload).await?;
    transport.recv_text().await
}

#[cfg(test)]
mod tests {
    use crate::error::{CatalogKind, ControllerError};
    use crate::notifier::ChannelNotifier;
    use crate::ws::{
        protocol::Command,
        session::{ConnectionState, Controller},
        testing::{Script, test_config},
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const ACK: &str = r#"{"apiVersion": 1}"#;

    async fn connected(script: &Script) -> Controller {
        script.reply(ACK);
        let (notifier, _rx) = ChannelNotifier::new();
        let controller =
            Controller::with_parts(test_config(), script.connector(), Arc::new(notifier));
        controller.connect().await.unwrap();
        controller
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_while_disconnected() {
        let script = Script::new();
        let (notifier, _rx) = ChannelNotifier::new();
        let controller =
            Controller::with_parts(test_config(), script.connector(), Arc::new(notifier));

        let err = controller
            .send_command(Command::new("SetExpression"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::NotConnected {
                state: ConnectionState::Disconnected
            }
        ));
        assert!(script.sent().is_empty());
        assert!(controller.latency().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_after_close() {
        let script = Script::new();
        let controller = connected(&script).await;
        controller.close().await;

        let err = controller.current_model().await.unwrap_err();

        assert!(matches!(
            err,
            ControllerError::NotConnected {
                state: ConnectionState::Closed
            }
        ));
        assert_eq!(script.sent().len(), 1);
        assert!(controller.latency().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_reply_succeeds_and_records_latency() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.reply_after(
            r#"{"responseType":"SetExpression","data":{}}"#,
            Duration::from_millis(250),
        );

        let response = controller
            .send_command(Command::new("SetExpression").param("expressionName", "Hiyori_Happy"))
            .await
            .unwrap();

        assert_eq!(response.discriminator, "SetExpression");
        assert_eq!(
            script.sent_json().last(),
            Some(&json!({
                "requestType": "SetExpression",
                "parameters": {"expressionName": "Hiyori_Happy"}
            }))
        );
        assert_eq!(
            controller.latency().snapshot(),
            vec![Duration::from_millis(250)]
        );
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_reply_is_protocol_error_but_counts() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.reply(r#"{"responseType":"APIError","data":{"message":"nope"}}"#);

        let err = controller
            .send_command(Command::new("SetExpression"))
            .await
            .unwrap_err();

        match err {
            ControllerError::Protocol { expected, response } => {
                assert_eq!(expected, "SetExpression");
                assert_eq!(response.discriminator, "APIError");
                assert!(response.raw.contains("nope"));
            }
            other => panic!("expected Protocol, got {other:?}"),
        }
        assert_eq!(controller.latency().len(), 1);
        assert_eq!(controller.state(), ConnectionState::Authenticated);

        // Still usable afterwards.
        script.reply(r#"{"responseType":"CurrentModel"}"#);
        controller.current_model().await.unwrap();
        assert_eq!(controller.latency().len(), 2);
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_records_nothing() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.fail_next_recv();

        let err = controller
            .send_command(Command::new("SetMotion"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::Transport { ref request_type, .. } if request_type == "SetMotion"
        ));
        assert!(controller.latency().is_empty());
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_records_nothing() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.fail_next_send();

        let err = controller.current_model().await.unwrap_err();

        assert!(matches!(err, ControllerError::Transport { .. }));
        assert!(controller.latency().is_empty());
        assert_eq!(script.sent().len(), 1);
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_commands_are_serialized() {
        let script = Script::new();
        let controller = Arc::new(connected(&script).await);
        script.reply_after(r#"{"responseType":"First"}"#, Duration::from_millis(300));
        script.reply_after(r#"{"responseType":"Second"}"#, Duration::from_millis(100));

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.send_command(Command::new("First")).await })
        };
        tokio::task::yield_now().await;
        let second = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.send_command(Command::new("Second")).await })
        };

        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());

        let log: Vec<String> = script.wire_log().into_iter().skip(2).collect();
        assert_eq!(
            log,
            vec![
                r#"send:{"requestType":"First","parameters":{}}"#,
                r#"recv:{"responseType":"First"}"#,
                r#"send:{"requestType":"Second","parameters":{}}"#,
                r#"recv:{"responseType":"Second"}"#,
            ]
        );
        assert_eq!(
            controller.latency().snapshot(),
            vec![Duration::from_millis(300), Duration::from_millis(100)]
        );
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_helpers_resolve_names() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.reply(r#"{"responseType":"SetExpression"}"#);
        script.reply(r#"{"responseType":"SetMotion"}"#);

        controller.set_expression("thinking").await.unwrap();
        controller.set_motion("wave").await.unwrap();

        let sent = script.sent_json();
        assert_eq!(
            sent[1],
            json!({"requestType": "SetExpression", "parameters": {"expressionName": "Hiyori_Thinking"}})
        );
        assert_eq!(
            sent[2],
            json!({"requestType": "SetMotion", "parameters": {"motionName": "Hiyori_Wave"}})
        );
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_catalog_key_sends_nothing() {
        let script = Script::new();
        let controller = connected(&script).await;

        let err = controller.set_expression("ecstatic").await.unwrap_err();

        assert!(matches!(
            err,
            ControllerError::UnknownKey {
                kind: CatalogKind::Expression,
                ..
            }
        ));
        assert_eq!(script.sent().len(), 1);
        assert!(controller.latency().is_empty());
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_helpers_build_requests() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.reply(r#"{"responseType":"HotkeyTrigger"}"#);
        script.reply(r#"{"responseType":"HotkeysInCurrentModel"}"#);
        script.reply(r#"{"responseType":"ExpressionState"}"#);

        controller
            .trigger_hotkey("hk-1", Some("item-9"))
            .await
            .unwrap();
        controller.available_hotkeys(None).await.unwrap();
        controller
            .expression_state(true, Some("smile.exp3.json"))
            .await
            .unwrap();

        let sent = script.sent_json();
        assert_eq!(
            sent[1]["parameters"],
            json!({"hotkeyID": "hk-1", "itemInstanceID": "item-9"})
        );
        assert_eq!(sent[2]["parameters"], json!({}));
        assert_eq!(
            sent[3]["parameters"],
            json!({"details": true, "expressionFile": "smile.exp3.json"})
        );
        controller.close().await;
    }

    const HOTKEYS: &str = r#"{"responseType":"HotkeysInCurrentModel","data":{
        "modelName":"Hiyori","availableHotkeys":[
            {"name":"Smile","type":"ToggleExpression","hotkeyID":"hk-exp","file":"smile.exp3.json","isActive":false},
            {"name":"Wave","type":"TriggerAnimation","hotkeyID":"hk-wave","file":"Hiyori_Wave","isActive":false},
            {"name":"Nod","type":"TriggerAnimation","hotkeyID":"hk-nod","file":"Hiyori_Nod","isActive":true}
        ]}}"#;

    #[tokio::test(start_paused = true)]
    async fn test_trigger_animation_finds_hotkey_by_name() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.reply(HOTKEYS);
        script.reply(r#"{"responseType":"HotkeyTrigger","data":{"hotkeyID":"hk-wave"}}"#);

        let response = controller.trigger_animation("Wave").await.unwrap();

        assert_eq!(response.data()["hotkeyID"], "hk-wave");
        let sent = script.sent_json();
        assert_eq!(sent[1]["requestType"], "HotkeysInCurrentModel");
        assert_eq!(
            sent[2],
            json!({"requestType": "HotkeyTrigger", "parameters": {"hotkeyID": "hk-wave"}})
        );
        assert_eq!(controller.latency().len(), 2);
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_animation_ignores_other_hotkey_types() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.reply(HOTKEYS);

        let err = controller.trigger_animation("Smile").await.unwrap_err();

        assert!(matches!(
            err,
            ControllerError::UnknownAnimation { ref name } if name == "Smile"
        ));
        // Only the listing went out.
        assert_eq!(script.sent().len(), 2);
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_expression_maps_active_name_to_key() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.reply(
            r#"{"responseType":"ExpressionState","data":{"modelLoaded":true,"expressions":[
                {"name":"Hiyori_Happy","active":false},
                {"name":"Hiyori_Thinking","active":true}
            ]}}"#,
        );
        script.reply(
            r#"{"responseType":"ExpressionState","data":{"expressions":[
                {"name":"Unlisted","active":true}
            ]}}"#,
        );

        assert_eq!(
            controller.current_expression().await.unwrap().as_deref(),
            Some("thinking")
        );
        assert_eq!(controller.current_expression().await.unwrap(), None);
        assert_eq!(script.sent_json()[1]["parameters"], json!({"details": false}));
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_motion_maps_active_animation_file_to_key() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.reply(HOTKEYS);
        script.reply(r#"{"responseType":"HotkeysInCurrentModel","data":{"availableHotkeys":[]}}"#);

        assert_eq!(controller.current_motion().await.unwrap().as_deref(), Some("nod"));
        assert_eq!(controller.current_motion().await.unwrap(), None);
        controller.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_motion_propagates_protocol_error() {
        let script = Script::new();
        let controller = connected(&script).await;
        script.reply(r#"{"responseType":"APIError"}"#);

        let err = controller.current_motion().await.unwrap_err();

        assert!(matches!(err, ControllerError::Protocol { .. }));
        controller.close().await;
    }
}

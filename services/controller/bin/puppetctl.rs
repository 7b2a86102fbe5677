//! Main Entrypoint for the Puppet Controller CLI
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Connecting and authenticating against the puppeting service.
//! 4. Running the requested command (or monitoring until Ctrl+C).
//! 5. Closing the connection and reporting latency statistics.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use puppet_controller::{
    config::Config,
    ws::{Command, Controller, Response},
};
use serde_json::Value;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Control client for a remote animation-puppeting service")]
struct Cli {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Show an expression from the configured catalog.
    Expression { key: String },
    /// Play a motion from the configured catalog.
    Motion { key: String },
    /// Trigger a hotkey by id.
    Hotkey {
        id: String,
        /// Live2D item instance to trigger the hotkey on.
        #[arg(long)]
        item: Option<String>,
    },
    /// List hotkeys of the current (or given) model.
    Hotkeys {
        #[arg(long)]
        model: Option<String>,
    },
    /// Play a model animation by its hotkey name.
    Animation { name: String },
    /// Show the currently loaded model.
    Model,
    /// Print the active expression and motion as catalog keys.
    Current,
    /// Send an arbitrary request.
    Send {
        request_type: String,
        /// Parameter as key=value; the value is parsed as JSON, falling back to a string.
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Stay connected with the latency watchdog running until Ctrl+C.
    Monitor,
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("'{raw}' is not key=value"))?;
    if key.is_empty() {
        return Err(format!("'{raw}' has an empty key"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Listens for the `Ctrl+C` signal to end monitoring.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Closing connection...");
}

async fn run(controller: &Controller, action: Action) -> Result<Option<Response>> {
    let response = match action {
        Action::Expression { key } => controller.set_expression(&key).await?,
        Action::Motion { key } => controller.set_motion(&key).await?,
        Action::Hotkey { id, item } => controller.trigger_hotkey(&id, item.as_deref()).await?,
        Action::Hotkeys { model } => controller.available_hotkeys(model.as_deref()).await?,
        Action::Animation { name } => controller.trigger_animation(&name).await?,
        Action::Model => controller.current_model().await?,
        Action::Current => {
            let expression = controller.current_expression().await?;
            let motion = controller.current_motion().await?;
            println!("expression: {}", expression.as_deref().unwrap_or("-"));
            println!("motion: {}", motion.as_deref().unwrap_or("-"));
            return Ok(None);
        }
        Action::Send {
            request_type,
            params,
        } => {
            let command = params
                .into_iter()
                .fold(Command::new(request_type), |command, (key, value)| {
                    command.param(key, value)
                });
            controller.send_command(command).await?
        }
        Action::Monitor => {
            shutdown_signal().await;
            return Ok(None);
        }
    };
    Ok(Some(response))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(
        url = %config.controller.url(),
        window = config.controller.latency_window,
        threshold_ms = config.controller.alert_threshold.as_millis() as u64,
        "Configuration loaded."
    );

    // --- 3. Connect ---
    let controller = Controller::new(config.controller);
    controller
        .connect()
        .await
        .context("Failed to connect to the puppeting service")?;

    // --- 4. Run ---
    let outcome = run(&controller, cli.action).await;

    // --- 5. Close and Report ---
    controller.close().await;
    if let Some(stats) = controller.latency().stats() {
        info!(
            samples = stats.count,
            mean_ms = stats.mean.as_secs_f64() * 1000.0,
            stddev_ms = stats.stddev.as_secs_f64() * 1000.0,
            "Round-trip latency"
        );
    }

    if let Some(response) = outcome? {
        println!("{}", serde_json::to_string_pretty(&response.payload)?);
    }
    Ok(())
}

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_LATENCY_WINDOW: usize = 100;
pub const DEFAULT_ALERT_THRESHOLD: Duration = Duration::from_secs(2);
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(10);

/// Everything the controller needs, fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    /// Identity / credential string presented in the handshake.
    pub identity: String,
    pub protocol_version: u32,
    /// Number of round-trip samples kept for statistics.
    pub latency_window: usize,
    /// The watchdog alerts when the window mean exceeds this.
    pub alert_threshold: Duration,
    pub watchdog_interval: Duration,
    /// Expression catalog: short key -> expression name on the service.
    pub expressions: BTreeMap<String, String>,
    /// Motion catalog: short key -> motion name on the service.
    pub motions: BTreeMap<String, String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            identity: String::new(),
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            latency_window: DEFAULT_LATENCY_WINDOW,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            expressions: default_expressions(),
            motions: default_motions(),
        }
    }
}

impl ControllerConfig {
    /// WebSocket URL of the puppeting service.
    pub fn url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.port)
    }
}

fn default_expressions() -> BTreeMap<String, String> {
    [
        ("happy", "Hiyori_Happy"),
        ("sad", "Hiyori_Sad"),
        ("thinking", "Hiyori_Thinking"),
        ("concerned", "Hiyori_Concerned"),
        ("neutral", "Hiyori_Neutral"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_motions() -> BTreeMap<String, String> {
    [("wave", "Hiyori_Wave"), ("nod", "Hiyori_Nod")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub controller: ControllerConfig,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let host = std::env::var("PUPPET_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = parse_var("PUPPET_PORT", DEFAULT_PORT)?;

        let identity = std::env::var("PUPPET_IDENTITY")
            .map_err(|_| ConfigError::MissingVar("PUPPET_IDENTITY".to_string()))?;
        if identity.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "PUPPET_IDENTITY".to_string(),
                "identity must not be empty".to_string(),
            ));
        }

        let protocol_version = parse_var("PUPPET_PROTOCOL_VERSION", DEFAULT_PROTOCOL_VERSION)?;

        let latency_window = parse_var("LATENCY_WINDOW", DEFAULT_LATENCY_WINDOW)?;
        if latency_window == 0 {
            return Err(ConfigError::InvalidValue(
                "LATENCY_WINDOW".to_string(),
                "window size must be at least 1".to_string(),
            ));
        }

        let alert_threshold = parse_secs(
            "LATENCY_THRESHOLD_SECS",
            DEFAULT_ALERT_THRESHOLD,
            |secs| secs >= 0.0,
        )?;
        let watchdog_interval = parse_secs(
            "WATCHDOG_INTERVAL_SECS",
            DEFAULT_WATCHDOG_INTERVAL,
            |secs| secs > 0.0,
        )?;

        let expressions = match std::env::var("PUPPET_EXPRESSIONS") {
            Ok(raw) => parse_catalog("PUPPET_EXPRESSIONS", &raw)?,
            Err(_) => default_expressions(),
        };
        let motions = match std::env::var("PUPPET_MOTIONS") {
            Ok(raw) => parse_catalog("PUPPET_MOTIONS", &raw)?,
            Err(_) => default_motions(),
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            controller: ControllerConfig {
                host,
                port,
                identity,
                protocol_version,
                latency_window,
                alert_threshold,
                watchdog_interval,
                expressions,
                motions,
            },
            log_level,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_secs(
    name: &str,
    default: Duration,
    accept: impl Fn(f64) -> bool,
) -> Result<Duration, ConfigError> {
    let secs = parse_var(name, default.as_secs_f64())?;
    if !secs.is_finite() || !accept(secs) {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("{secs} is out of range"),
        ));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Parses `key=Name,key=Name` into a catalog.
fn parse_catalog(name: &str, raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{entry}' is not a key=Name pair"),
            )),
        })
        .collect()
}

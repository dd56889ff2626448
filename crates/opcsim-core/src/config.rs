//! Configuration loading and typed config structures for the simulator.
//!
//! The configuration lives in `opcsim-config.yaml` in the working
//! directory. This module defines strongly-typed structs that mirror the
//! YAML structure and a loader that reads and validates the file. Every
//! section and field has a default, so an empty file (or no file at all)
//! yields a runnable simulator with the demo variables.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::history::HISTORY_CAPACITY;
use crate::variables::VariableSet;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content, including invalid variable definitions.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override holds an unusable value.
    #[error("invalid value for {key}: {value}")]
    InvalidOverride {
        /// The environment variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The configured host and port do not form a socket address.
    #[error("invalid address {address}: {source}")]
    InvalidAddress {
        /// The address that failed to parse.
        address: String,
        /// The underlying parse error.
        source: std::net::AddrParseError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulator configuration.
///
/// Mirrors the structure of `opcsim-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatorConfig {
    /// Protocol endpoint settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Simulation, broadcast and history timing.
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// HTTP/WebSocket observer settings.
    #[serde(default)]
    pub observer: ObserverSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Variables registered at startup.
    #[serde(default = "VariableSet::demo")]
    pub variables: VariableSet,
}

impl SimulatorConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `OPCSIM_PORT` overrides `server.port`
    /// - `OPCSIM_OBSERVER_PORT` overrides `observer.port`
    /// - `OPCSIM_LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML or defines
    /// invalid variables, or [`ConfigError::InvalidOverride`] for a bad
    /// environment override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides looked up through `lookup` (normally the process
    /// environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a port override is not
    /// a valid port number.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("OPCSIM_PORT") {
            self.server.port = parse_port("OPCSIM_PORT", val)?;
        }
        if let Some(val) = lookup("OPCSIM_OBSERVER_PORT") {
            self.observer.port = parse_port("OPCSIM_OBSERVER_PORT", val)?;
        }
        if let Some(val) = lookup("OPCSIM_LOG_LEVEL") {
            self.logging.level = val;
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            simulation: SimulationSettings::default(),
            observer: ObserverSettings::default(),
            logging: LoggingConfig::default(),
            variables: VariableSet::demo(),
        }
    }
}

fn parse_port(key: &'static str, value: String) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_parse_err: std::num::ParseIntError| ConfigError::InvalidOverride { key, value })
}

/// Protocol endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Address to bind the protocol endpoint to.
    #[serde(default = "default_server_host")]
    pub host: String,

    /// TCP port of the protocol endpoint (0 picks a free port).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Name reported to clients in the `hello_ack` frame.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Maximum number of concurrent client sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Start the protocol server as soon as the process starts.
    #[serde(default)]
    pub autostart: bool,
}

impl ServerSettings {
    /// The socket address the endpoint binds to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if host and port do not
    /// parse as a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.port)
    }

    /// The endpoint URL advertised to clients.
    pub fn endpoint_url(&self) -> String {
        format!("opc.tcp://{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            server_name: default_server_name(),
            max_sessions: default_max_sessions(),
            autostart: false,
        }
    }
}

/// Simulation timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationSettings {
    /// Milliseconds between simulation ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Milliseconds between value broadcasts to listeners.
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,

    /// Milliseconds `stop` waits for each background task.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Samples kept per variable.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Seed for the random walks; a fresh seed is drawn when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationSettings {
    /// Period between simulation ticks.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Period between broadcasts.
    pub const fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Bounded wait for each background task on stop.
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            history_capacity: default_history_capacity(),
            seed: None,
        }
    }
}

/// HTTP/WebSocket observer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverSettings {
    /// Address to bind the observer to.
    #[serde(default = "default_server_host")]
    pub host: String,

    /// TCP port of the observer.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl ObserverSettings {
    /// The socket address the observer binds to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if host and port do not
    /// parse as a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.port)
    }
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_observer_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let address = format!("{host}:{port}");
    address
        .parse()
        .map_err(|source| ConfigError::InvalidAddress { address, source })
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_server_host() -> String {
    String::from("0.0.0.0")
}

const fn default_server_port() -> u16 {
    4840
}

fn default_server_name() -> String {
    String::from("OPC_UA_Simulator")
}

const fn default_max_sessions() -> usize {
    8
}

const fn default_tick_interval_ms() -> u64 {
    2000
}

const fn default_broadcast_interval_ms() -> u64 {
    2000
}

const fn default_stop_timeout_ms() -> u64 {
    2000
}

const fn default_history_capacity() -> usize {
    HISTORY_CAPACITY
}

const fn default_observer_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults_with_demo_variables() {
        let config = SimulatorConfig::parse("").unwrap();
        assert_eq!(config.server.port, 4840);
        assert_eq!(config.server.server_name, "OPC_UA_Simulator");
        assert_eq!(config.simulation.tick_interval(), Duration::from_secs(2));
        assert_eq!(config.simulation.history_capacity, 100);
        assert_eq!(config.observer.port, 5000);
        assert_eq!(config.variables.len(), 4);
        assert!(config.variables.contains("Temperature"));
    }

    #[test]
    fn missing_variables_key_uses_demo_set() {
        let config = SimulatorConfig::parse("server:\n  port: 4841\n").unwrap();
        assert_eq!(config.server.port, 4841);
        assert_eq!(config.variables.len(), 4);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 48400
  server_name: "Line 3"
  max_sessions: 2
  autostart: true

simulation:
  tick_interval_ms: 500
  broadcast_interval_ms: 1000
  stop_timeout_ms: 250
  history_capacity: 20
  seed: 99

observer:
  port: 8081

logging:
  level: debug
  json: true

variables:
  Flow:
    type: Numeric
    mode: Random
    min: 0.0
    max: 10.0
  Door:
    type: Boolean
    value: true
  Shift:
    type: String
    value: Day
    use_dropdown: true
    dropdown_options: [Day, Night]
"#;
        let config = SimulatorConfig::parse(yaml).unwrap();
        assert_eq!(config.server.socket_addr().unwrap().port(), 48400);
        assert_eq!(config.server.endpoint_url(), "opc.tcp://127.0.0.1:48400");
        assert!(config.server.autostart);
        assert_eq!(config.simulation.seed, Some(99));
        assert_eq!(config.simulation.stop_timeout(), Duration::from_millis(250));
        assert_eq!(config.observer.host, "0.0.0.0");
        assert!(config.logging.json);
        assert_eq!(config.variables.len(), 3);
        assert!(config.variables.get("Flow").unwrap().random_range().is_some());
    }

    #[test]
    fn invalid_variables_fail_to_parse() {
        let yaml = "variables:\n  Bad:\n    type: Numeric\n    min: 5\n    max: 1\n";
        assert!(matches!(
            SimulatorConfig::parse(yaml),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = SimulatorConfig::default();
        config
            .apply_env_overrides(|key| match key {
                "OPCSIM_PORT" => Some(String::from("4900")),
                "OPCSIM_LOG_LEVEL" => Some(String::from("warn")),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.port, 4900);
        assert_eq!(config.observer.port, 5000);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = SimulatorConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == "OPCSIM_OBSERVER_PORT").then(|| String::from("http"))
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOverride {
                key: "OPCSIM_OBSERVER_PORT",
                ..
            })
        ));
    }
}

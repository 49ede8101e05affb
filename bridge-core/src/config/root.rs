use serde::Deserialize;
use std::net::SocketAddr;

fn default_tcp_bind() -> SocketAddr {
    "0.0.0.0:12345".parse().unwrap()
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_client_id() -> String {
    "tcp-mqtt-bridge".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_patterns() -> Vec<String> {
    vec!["*.yaml".to_string(), "*.yml".to_string()]
}

/// TCP listener settings.
#[derive(Debug, Deserialize, Clone)]
pub struct TcpConfig {
    /// Address and port to listen on. Example: "0.0.0.0:12345".
    #[serde(default = "default_tcp_bind")]
    pub bind: SocketAddr,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            bind: default_tcp_bind(),
        }
    }
}

/// MQTT broker connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_mqtt_client_id(),
        }
    }
}

/// Logging settings. `level` seeds the default `tracing` filter; `RUST_LOG` and the
/// `--log-level`/`--verbose` CLI flags take precedence when set.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Packet catalog discovery settings.
#[derive(Debug, Deserialize, Clone)]
pub struct PacketDefsConfig {
    /// Directories to scan for `*.yaml`/`*.yml` catalog files.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Additional glob patterns matched as-is (not restricted to a directory).
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
}

impl Default for PacketDefsConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            patterns: default_patterns(),
        }
    }
}

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub packet_defs: PacketDefsConfig,
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::observability::activity::DEFAULT_LOG_CAPACITY;

/// Root configuration for the session server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Listener configuration (transport, endpoint, secret).
    pub listener: ListenerConfig,

    /// Activity log settings.
    pub activity_log: ActivityLogConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Which transport the listener binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Loopback TCP.
    #[default]
    Tcp,
    /// Unix domain socket.
    Local,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Transport to bind ("tcp" or "local").
    pub transport: TransportKind,

    /// TCP bind address (e.g., "127.0.0.1:8989").
    pub bind_address: String,

    /// Unix socket path, used when transport = "local".
    pub socket_path: String,

    /// Shared secret clients must present. None means no auth check.
    pub shared_secret: Option<String>,

    /// How long stop() waits for the listener thread, in seconds.
    pub stop_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            bind_address: "127.0.0.1:8989".to_string(),
            socket_path: default_socket_path(),
            shared_secret: None,
            stop_timeout_secs: 3,
        }
    }
}

/// Activity log settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivityLogConfig {
    /// Maximum entries retained.
    pub capacity: usize,
}

impl Default for ActivityLogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "sessiond=info".to_string(),
        }
    }
}

fn default_socket_path() -> String {
    std::env::temp_dir()
        .join("sessiond.socket")
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_tcp_loopback() {
        let config = SessionConfig::default();
        assert_eq!(config.listener.transport, TransportKind::Tcp);
        assert_eq!(config.listener.bind_address, "127.0.0.1:8989");
        assert_eq!(config.listener.stop_timeout_secs, 3);
        assert!(config.listener.shared_secret.is_none());
        assert_eq!(config.activity_log.capacity, DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: SessionConfig = toml::from_str(
            r#"
            [listener]
            transport = "local"
            socket_path = "/run/user/1000/session.sock"
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.transport, TransportKind::Local);
        assert_eq!(config.listener.socket_path, "/run/user/1000/session.sock");
        // Untouched sections keep their defaults.
        assert_eq!(config.listener.bind_address, "127.0.0.1:8989");
        assert_eq!(config.logging.filter, "sessiond=info");
    }

    #[test]
    fn secret_round_trips() {
        let config: SessionConfig = toml::from_str(
            r#"
            [listener]
            shared_secret = "abc123"
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.shared_secret.as_deref(), Some("abc123"));
    }
}

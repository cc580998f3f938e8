//! Capabilities the embedding host provides to the plugin.

use crate::config::{ConnectionConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection status shown by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// A transport exists but has not proven itself yet.
    #[default]
    Connecting,
    /// The transport connected or delivered data.
    Ok,
    /// The transport reported a failure; the message is kept for display.
    Error(String),
}

impl ConnectionStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ConnectionStatus::Ok)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionStatus::Error(_))
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => f.write_str("connecting"),
            ConnectionStatus::Ok => f.write_str("ok"),
            ConnectionStatus::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Host services available to a plugin instance.
///
/// The plugin owns its host context; there is no process-wide logger or
/// status handle.
pub trait HostContext {
    /// Publish a new connection status for display.
    fn report_status(&self, status: &ConnectionStatus);

    /// Write a user-facing log line into the host's log.
    fn log(&self, level: LogLevel, message: &str);

    /// Current connection configuration as stored by the host.
    fn read_config(&self) -> ConnectionConfig;
}

impl<H: HostContext + ?Sized> HostContext for &H {
    fn report_status(&self, status: &ConnectionStatus) {
        (**self).report_status(status)
    }

    fn log(&self, level: LogLevel, message: &str) {
        (**self).log(level, message)
    }

    fn read_config(&self) -> ConnectionConfig {
        (**self).read_config()
    }
}

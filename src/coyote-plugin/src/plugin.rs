//! The plugin instance the host talks to.

use crate::catalog::{self, ActionDefinition, InputField, PresetDefinition};
use crate::connection::ConnectionManager;
use crate::protocol::{Action, ActionInvocation};
use crate::transport::{NoticeSender, TransportFactory, TransportNotice};
use coyote_core::{ConnectionConfig, ConnectionStatus, HostContext, LogLevel};

/// What happened to a dispatched action. Purely informational; the host is
/// never handed an error for a command that could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handed to the transport.
    Sent,
    /// No usable transport; the command was discarded.
    Dropped,
    /// The action is not one this plugin knows.
    Unknown,
}

/// Coyote remote-control plugin.
///
/// Lifecycle: [`init`](Self::init) once, [`update_config`](Self::update_config)
/// whenever the host's settings change, [`teardown`](Self::teardown) when the
/// instance is removed. Transport notices must be fed back through
/// [`handle_notice`](Self::handle_notice).
pub struct CoyotePlugin<H: HostContext, F: TransportFactory> {
    host: H,
    connection: ConnectionManager<F>,
}

impl<H: HostContext, F: TransportFactory> CoyotePlugin<H, F> {
    pub fn new(host: H, factory: F, notices: NoticeSender) -> Self {
        Self {
            host,
            connection: ConnectionManager::new(factory, notices),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn connection(&self) -> &ConnectionManager<F> {
        &self.connection
    }

    pub fn status(&self) -> &ConnectionStatus {
        self.connection.status()
    }

    /// Start using the configuration currently stored by the host.
    pub fn init(&mut self) {
        let config = self.host.read_config();
        self.connection.configure(&self.host, config);
    }

    pub fn update_config(&mut self, config: ConnectionConfig) {
        self.connection.configure(&self.host, config);
    }

    pub fn teardown(&mut self) {
        self.connection.teardown();
        tracing::debug!("plugin torn down");
    }

    pub fn handle_notice(&mut self, notice: TransportNotice) {
        self.connection.handle_notice(&self.host, notice);
    }

    /// Run an action exactly as the host delivered it.
    pub fn action(&mut self, invocation: &ActionInvocation) -> DispatchOutcome {
        self.dispatch(&Action::from_invocation(invocation))
    }

    pub fn dispatch(&mut self, action: &Action) -> DispatchOutcome {
        let Some(payload) = action.encode() else {
            tracing::debug!(?action, "ignoring unknown action");
            return DispatchOutcome::Unknown;
        };

        let protocol = self.connection.config().protocol;
        if !self.connection.ready_for_commands() {
            tracing::debug!(%protocol, status = %self.connection.status(), "Socket not connected");
            return DispatchOutcome::Dropped;
        }

        tracing::debug!(
            payload = payload.trim_end(),
            host = self.connection.config().host().unwrap_or_default(),
            "sending"
        );
        match self.connection.send(&payload) {
            Ok(()) => DispatchOutcome::Sent,
            Err(err) => {
                self.host
                    .log(LogLevel::Warn, &format!("Failed to send command: {err}"));
                DispatchOutcome::Dropped
            }
        }
    }

    pub fn actions(&self) -> Vec<ActionDefinition> {
        catalog::actions()
    }

    pub fn presets(&self) -> Vec<PresetDefinition> {
        catalog::presets()
    }

    pub fn config_fields(&self) -> Vec<InputField> {
        catalog::config_fields()
    }
}

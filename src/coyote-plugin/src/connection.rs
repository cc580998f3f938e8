//! Ownership of the single live transport and the status derived from it.

use crate::transport::{
    Endpoint, NoticeSender, NoticeSink, Transport, TransportError, TransportEvent,
    TransportFactory, TransportNotice,
};
use coyote_core::{ConnectionConfig, ConnectionStatus, HostContext, LogLevel};

/// Keeps at most one transport alive and tracks how it is doing.
///
/// Replacing the configuration always destroys the current transport before a
/// new one is created. Nothing is queued or retried here; a transport that
/// fails stays failed until the next [`configure`](Self::configure).
pub struct ConnectionManager<F: TransportFactory> {
    factory: F,
    notices: NoticeSender,
    config: ConnectionConfig,
    transport: Option<F::Transport>,
    generation: u64,
    status: ConnectionStatus,
}

impl<F: TransportFactory> ConnectionManager<F> {
    pub fn new(factory: F, notices: NoticeSender) -> Self {
        Self {
            factory,
            notices,
            config: ConnectionConfig::default(),
            transport: None,
            generation: 0,
            status: ConnectionStatus::default(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Generation of the current transport; bumps on every creation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Tear down the current transport and build one for `config`.
    pub fn configure<H: HostContext>(&mut self, host: &H, config: ConnectionConfig) {
        self.destroy_transport();
        self.config = config;

        let Some(endpoint) = Endpoint::from_config(&self.config) else {
            tracing::debug!("no host configured, not creating a transport");
            // a cleared host must not keep showing the old transport's status
            self.set_status(host, ConnectionStatus::Connecting);
            return;
        };

        // every new transport starts over as connecting, even if already shown
        self.generation += 1;
        self.status = ConnectionStatus::Connecting;
        host.report_status(&self.status);

        let sink = NoticeSink::new(self.generation, self.notices.clone());
        match self.factory.create(self.config.protocol, &endpoint, sink) {
            Ok(transport) => {
                tracing::info!(
                    %endpoint,
                    protocol = %self.config.protocol,
                    generation = self.generation,
                    "transport created"
                );
                self.transport = Some(transport);
            }
            Err(err) => self.fail(host, err.to_string()),
        }
    }

    /// Apply a transport notification. Notices from replaced transports are
    /// ignored.
    pub fn handle_notice<H: HostContext>(&mut self, host: &H, notice: TransportNotice) {
        if self.transport.is_none() || notice.generation != self.generation {
            tracing::trace!(
                generation = notice.generation,
                current = self.generation,
                "discarding stale transport notice"
            );
            return;
        }

        match notice.event {
            TransportEvent::Connected => {
                tracing::debug!(generation = self.generation, "connected");
                self.set_status(host, ConnectionStatus::Ok);
            }
            TransportEvent::Data(bytes) => {
                tracing::trace!(len = bytes.len(), "data received");
                self.set_status(host, ConnectionStatus::Ok);
            }
            TransportEvent::Error(message) => self.fail(host, message),
        }
    }

    /// Whether a command may be handed to the transport right now.
    ///
    /// Stream transports must be connected with an `Ok` status. Datagram
    /// transports accept commands whenever they exist.
    pub fn ready_for_commands(&self) -> bool {
        match &self.transport {
            None => false,
            Some(transport) if self.config.protocol.is_stream() => {
                transport.is_connected() && self.status.is_ok()
            }
            Some(_) => true,
        }
    }

    pub fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        match self.transport.as_mut() {
            Some(transport) => transport.send(payload),
            None => Err(TransportError::NotConnected),
        }
    }

    /// Destroy the transport, if any. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.destroy_transport();
    }

    fn destroy_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            tracing::debug!(generation = self.generation, "destroying transport");
            transport.destroy();
        }
    }

    fn fail<H: HostContext>(&mut self, host: &H, message: String) {
        tracing::warn!(error = %message, "network error");
        host.log(LogLevel::Error, &format!("Network error: {message}"));
        self.set_status(host, ConnectionStatus::Error(message));
    }

    fn set_status<H: HostContext>(&mut self, host: &H, status: ConnectionStatus) {
        if self.status != status {
            self.status = status;
            host.report_status(&self.status);
        }
    }
}

impl<F: TransportFactory> Drop for ConnectionManager<F> {
    fn drop(&mut self) {
        self.destroy_transport();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingFactory, RecordingHost};
    use crate::transport::notice_channel;
    use coyote_core::Protocol;

    fn manager() -> (ConnectionManager<RecordingFactory>, RecordingHost) {
        let (tx, _rx) = notice_channel();
        (
            ConnectionManager::new(RecordingFactory::default(), tx),
            RecordingHost::default(),
        )
    }

    fn notice(generation: u64, event: TransportEvent) -> TransportNotice {
        TransportNotice { generation, event }
    }

    #[test]
    fn configure_without_host_creates_nothing() {
        let (mut manager, host) = manager();
        manager.configure(&host, ConnectionConfig::default());

        assert!(!manager.has_transport());
        assert!(manager.factory().log().created.is_empty());
        assert!(host.statuses().is_empty());
    }

    #[test]
    fn clearing_host_drops_ok_status() {
        let (mut manager, host) = manager();
        manager.configure(&host, ConnectionConfig::new("10.0.0.9", 7000, Protocol::Tcp));
        manager.handle_notice(&host, notice(1, TransportEvent::Connected));
        assert!(manager.status().is_ok());

        manager.configure(&host, ConnectionConfig::default());

        assert!(!manager.has_transport());
        assert_eq!(manager.status(), &ConnectionStatus::Connecting);
        assert_eq!(host.last_status(), Some(ConnectionStatus::Connecting));
        assert!(!manager.ready_for_commands());
    }

    #[test]
    fn configure_creates_transport_and_reports_connecting() {
        let (mut manager, host) = manager();
        manager.configure(&host, ConnectionConfig::new("10.0.0.9", 7000, Protocol::Tcp));

        assert!(manager.has_transport());
        assert_eq!(manager.generation(), 1);
        assert_eq!(host.statuses(), [ConnectionStatus::Connecting]);
        let log = manager.factory().log();
        assert_eq!(log.created.len(), 1);
        assert_eq!(log.created[0].protocol, Protocol::Tcp);
        assert_eq!(log.created[0].endpoint, Endpoint::new("10.0.0.9", 7000));
    }

    #[test]
    fn connected_then_error_updates_status() {
        let (mut manager, host) = manager();
        manager.configure(&host, ConnectionConfig::new("10.0.0.9", 7000, Protocol::Tcp));

        manager.handle_notice(&host, notice(1, TransportEvent::Connected));
        assert_eq!(manager.status(), &ConnectionStatus::Ok);

        manager.handle_notice(&host, notice(1, TransportEvent::Error("reset".into())));
        assert_eq!(manager.status(), &ConnectionStatus::Error("reset".into()));

        assert_eq!(
            host.statuses(),
            [
                ConnectionStatus::Connecting,
                ConnectionStatus::Ok,
                ConnectionStatus::Error("reset".into()),
            ]
        );
        assert!(host
            .logs()
            .iter()
            .any(|(level, msg)| *level == LogLevel::Error && msg == "Network error: reset"));
    }

    #[test]
    fn data_counts_as_liveness() {
        let (mut manager, host) = manager();
        manager.configure(&host, ConnectionConfig::new("10.0.0.9", 9000, Protocol::Udp));

        manager.handle_notice(&host, notice(1, TransportEvent::Data(b"{}".to_vec())));
        assert!(manager.status().is_ok());
    }

    #[test]
    fn stale_notices_are_ignored() {
        let (mut manager, host) = manager();
        manager.configure(&host, ConnectionConfig::new("10.0.0.9", 7000, Protocol::Tcp));
        manager.configure(&host, ConnectionConfig::new("10.0.0.10", 7000, Protocol::Tcp));
        assert_eq!(manager.generation(), 2);

        manager.handle_notice(&host, notice(1, TransportEvent::Connected));
        assert_eq!(manager.status(), &ConnectionStatus::Connecting);
    }

    #[test]
    fn factory_failure_reports_error() {
        let (tx, _rx) = notice_channel();
        let mut manager = ConnectionManager::new(RecordingFactory::failing("no runtime"), tx);
        let host = RecordingHost::default();
        manager.configure(&host, ConnectionConfig::new("10.0.0.9", 7000, Protocol::Tcp));

        assert!(!manager.has_transport());
        assert!(manager.status().is_error());
    }

    #[test]
    fn reconfigure_destroys_before_creating() {
        let (mut manager, host) = manager();
        manager.configure(&host, ConnectionConfig::new("10.0.0.9", 7000, Protocol::Tcp));
        manager.configure(&host, ConnectionConfig::new("10.0.0.9", 7000, Protocol::Udp));

        let log = manager.factory().log();
        assert_eq!(log.created.len(), 2);
        assert_eq!(log.destroyed, [1]);
        assert_eq!(log.max_live, 1);
    }

    #[test]
    fn teardown_is_idempotent() {
        let (mut manager, host) = manager();
        manager.configure(&host, ConnectionConfig::new("10.0.0.9", 7000, Protocol::Tcp));

        manager.teardown();
        manager.teardown();
        assert!(!manager.has_transport());
        assert_eq!(manager.factory().log().destroyed, [1]);
    }
}

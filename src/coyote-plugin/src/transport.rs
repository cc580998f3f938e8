//! Transport seam between the plugin and the sockets that reach the device.
//!
//! Transports report what happens to them by emitting [`TransportNotice`]s into
//! a channel the plugin drains. Each notice carries the generation of the
//! transport that produced it, so events from a replaced transport can be told
//! apart from events of the current one.

use coyote_core::{ConnectionConfig, Protocol};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Address of the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `None` when the configuration has no usable host.
    pub fn from_config(config: &ConnectionConfig) -> Option<Self> {
        config.host().map(|host| Self::new(host, config.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Something that happened to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Stream transports only: the connection is established.
    Connected,
    /// Bytes arrived from the device.
    Data(Vec<u8>),
    /// The transport failed; the message is meant for display.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportNotice {
    pub generation: u64,
    pub event: TransportEvent,
}

pub type NoticeSender = mpsc::UnboundedSender<TransportNotice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<TransportNotice>;

pub fn notice_channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::unbounded_channel()
}

/// Handle a transport uses to publish its events.
#[derive(Debug, Clone)]
pub struct NoticeSink {
    generation: u64,
    tx: NoticeSender,
}

impl NoticeSink {
    pub fn new(generation: u64, tx: NoticeSender) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `false` once nobody is listening anymore.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(TransportNotice {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("transport has been closed")]
    Closed,
    #[error("no async runtime available: {0}")]
    Runtime(String),
}

/// A live connection (or datagram socket) to the device.
pub trait Transport {
    /// Queue `payload` for delivery. Never waits for the network.
    fn send(&mut self, payload: &str) -> Result<(), TransportError>;

    /// Whether the transport considers itself able to deliver right now.
    fn is_connected(&self) -> bool;

    /// Release the underlying socket. Pending work is abandoned.
    fn destroy(&mut self);
}

/// Creates transports for the connection manager.
pub trait TransportFactory {
    type Transport: Transport;

    /// Start a transport towards `endpoint`. Connecting happens in the
    /// background; its outcome is reported through `sink`.
    fn create(
        &mut self,
        protocol: Protocol,
        endpoint: &Endpoint,
        sink: NoticeSink,
    ) -> Result<Self::Transport, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_requires_host() {
        assert!(Endpoint::from_config(&ConnectionConfig::default()).is_none());

        let config = ConnectionConfig::new("10.1.1.2", 7000, Protocol::Tcp);
        assert_eq!(
            Endpoint::from_config(&config),
            Some(Endpoint::new("10.1.1.2", 7000))
        );
    }

    #[test]
    fn endpoint_display_brackets_ipv6() {
        assert_eq!(Endpoint::new("::1", 7000).to_string(), "[::1]:7000");
        assert_eq!(Endpoint::new("coyote.local", 9000).to_string(), "coyote.local:9000");
    }

    #[test]
    fn sink_tags_notices_with_generation() {
        let (tx, mut rx) = notice_channel();
        let sink = NoticeSink::new(4, tx);
        assert!(sink.emit(TransportEvent::Connected));

        let notice = rx.try_recv().expect("notice queued");
        assert_eq!(notice.generation, 4);
        assert_eq!(notice.event, TransportEvent::Connected);

        drop(rx);
        assert!(!sink.emit(TransportEvent::Data(vec![1])));
    }
}

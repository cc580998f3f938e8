//! Tokio-backed TCP and UDP transports.
//!
//! A TCP transport connects once. After a refused connect, a peer close or a
//! socket error its task ends and it never reconnects; the owner has to build
//! a new transport (via `ConnectionManager::configure`) to try again. UDP
//! transports report errors and keep their socket open.

use crate::transport::{
    Endpoint, NoticeSink, Transport, TransportError, TransportEvent, TransportFactory,
};
use coyote_core::Protocol;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 4096;
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Spawns socket tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTransportFactory {
    handle: Handle,
}

impl TokioTransportFactory {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    pub fn current() -> Result<Self, TransportError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|err| TransportError::Runtime(err.to_string()))
    }
}

impl TransportFactory for TokioTransportFactory {
    type Transport = NetTransport;

    fn create(
        &mut self,
        protocol: Protocol,
        endpoint: &Endpoint,
        sink: NoticeSink,
    ) -> Result<NetTransport, TransportError> {
        let transport = match protocol {
            Protocol::Tcp => NetTransport::Tcp(TcpTransport::spawn(&self.handle, endpoint, sink)),
            Protocol::Udp => NetTransport::Udp(UdpTransport::spawn(&self.handle, endpoint, sink)),
        };
        Ok(transport)
    }
}

#[derive(Debug)]
pub enum NetTransport {
    Tcp(TcpTransport),
    Udp(UdpTransport),
}

impl Transport for NetTransport {
    fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        match self {
            NetTransport::Tcp(t) => t.send(payload),
            NetTransport::Udp(t) => t.send(payload),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            NetTransport::Tcp(t) => t.is_connected(),
            NetTransport::Udp(t) => t.is_connected(),
        }
    }

    fn destroy(&mut self) {
        match self {
            NetTransport::Tcp(t) => t.destroy(),
            NetTransport::Udp(t) => t.destroy(),
        }
    }
}

/// Persistent stream connection to the device.
#[derive(Debug)]
pub struct TcpTransport {
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TcpTransport {
    pub fn spawn(handle: &Handle, endpoint: &Endpoint, sink: NoticeSink) -> Self {
        let (outbound, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let task = handle.spawn(run_tcp(
            endpoint.clone(),
            rx,
            Arc::clone(&connected),
            sink,
        ));
        Self {
            outbound,
            connected,
            task,
        }
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(payload.to_string())
            .map_err(|_| TransportError::Closed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn destroy(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_tcp(
    endpoint: Endpoint,
    mut outbound: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
    sink: NoticeSink,
) {
    let stream = match TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::debug!(%endpoint, error = %err, "tcp connect failed");
            sink.emit(TransportEvent::Error(err.to_string()));
            return;
        }
    };
    if let Err(err) = stream.set_nodelay(true) {
        tracing::trace!(error = %err, "could not disable nagle");
    }

    connected.store(true, Ordering::SeqCst);
    tracing::debug!(%endpoint, "tcp connected");
    sink.emit(TransportEvent::Connected);

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let failure = loop {
        tokio::select! {
            payload = outbound.recv() => match payload {
                Some(payload) => {
                    if let Err(err) = writer.write_all(payload.as_bytes()).await {
                        break err.to_string();
                    }
                }
                // the owning transport is gone
                None => return,
            },
            read = reader.read(&mut buf) => match read {
                Ok(0) => break "connection closed by peer".to_string(),
                Ok(n) => {
                    sink.emit(TransportEvent::Data(buf[..n].to_vec()));
                }
                Err(err) => break err.to_string(),
            },
        }
    };

    connected.store(false, Ordering::SeqCst);
    tracing::debug!(%endpoint, error = %failure, "tcp connection lost");
    sink.emit(TransportEvent::Error(failure));
}

/// Datagram socket aimed at the device. Has no connection state; it counts as
/// connected for as long as its task is alive.
#[derive(Debug)]
pub struct UdpTransport {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl UdpTransport {
    pub fn spawn(handle: &Handle, endpoint: &Endpoint, sink: NoticeSink) -> Self {
        let (outbound, rx) = mpsc::unbounded_channel();
        let task = handle.spawn(run_udp(endpoint.clone(), rx, sink));
        Self { outbound, task }
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        self.outbound
            .send(payload.to_string())
            .map_err(|_| TransportError::Closed)
    }

    fn is_connected(&self) -> bool {
        !self.task.is_finished()
    }

    fn destroy(&mut self) {
        self.task.abort();
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_udp(
    endpoint: Endpoint,
    mut outbound: mpsc::UnboundedReceiver<String>,
    sink: NoticeSink,
) {
    let socket = match bind_udp(&endpoint).await {
        Ok(socket) => socket,
        Err(err) => {
            tracing::debug!(%endpoint, error = %err, "udp setup failed");
            sink.emit(TransportEvent::Error(err.to_string()));
            return;
        }
    };
    tracing::debug!(%endpoint, "udp socket ready");

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        tokio::select! {
            payload = outbound.recv() => match payload {
                Some(payload) => {
                    if let Err(err) = socket.send(payload.as_bytes()).await {
                        sink.emit(TransportEvent::Error(err.to_string()));
                    }
                }
                None => return,
            },
            received = socket.recv(&mut buf) => match received {
                Ok(n) => {
                    sink.emit(TransportEvent::Data(buf[..n].to_vec()));
                }
                Err(err) => {
                    sink.emit(TransportEvent::Error(err.to_string()));
                }
            },
        }
    }
}

async fn bind_udp(endpoint: &Endpoint) -> io::Result<UdpSocket> {
    let target = lookup_host((endpoint.host.as_str(), endpoint.port))
        .await?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {endpoint}"),
            )
        })?;

    let local: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(target).await?;
    Ok(socket)
}

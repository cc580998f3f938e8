//! In-memory host and transport doubles for exercising the plugin without
//! sockets.

use crate::transport::{
    Endpoint, NoticeSink, Transport, TransportError, TransportEvent, TransportFactory,
};
use coyote_core::{ConnectionConfig, ConnectionStatus, HostContext, LogLevel, Protocol};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTransport {
    pub protocol: Protocol,
    pub endpoint: Endpoint,
    pub generation: u64,
}

/// Everything the recording transports were asked to do.
#[derive(Debug, Clone, Default)]
pub struct TransportLog {
    pub created: Vec<CreatedTransport>,
    /// `(generation, payload)` for every accepted send.
    pub sent: Vec<(u64, String)>,
    /// Generations in the order they were destroyed.
    pub destroyed: Vec<u64>,
    pub live: usize,
    pub max_live: usize,
}

/// Factory producing [`RecordingTransport`]s that share one [`TransportLog`].
#[derive(Debug, Clone)]
pub struct RecordingFactory {
    log: Rc<RefCell<TransportLog>>,
    link_up: Rc<Cell<bool>>,
    sink: Rc<RefCell<Option<NoticeSink>>>,
    failure: Option<String>,
}

impl Default for RecordingFactory {
    fn default() -> Self {
        Self {
            log: Rc::default(),
            link_up: Rc::new(Cell::new(true)),
            sink: Rc::default(),
            failure: None,
        }
    }
}

impl RecordingFactory {
    /// A factory whose every `create` fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn log(&self) -> TransportLog {
        self.log.borrow().clone()
    }

    /// What live transports answer from `is_connected`.
    pub fn set_link_up(&self, up: bool) {
        self.link_up.set(up);
    }

    /// Emit an event through the sink of the most recently created transport.
    pub fn emit(&self, event: TransportEvent) -> bool {
        match self.sink.borrow().as_ref() {
            Some(sink) => sink.emit(event),
            None => false,
        }
    }
}

impl TransportFactory for RecordingFactory {
    type Transport = RecordingTransport;

    fn create(
        &mut self,
        protocol: Protocol,
        endpoint: &Endpoint,
        sink: NoticeSink,
    ) -> Result<RecordingTransport, TransportError> {
        if let Some(message) = &self.failure {
            return Err(TransportError::Runtime(message.clone()));
        }

        let generation = sink.generation();
        {
            let mut log = self.log.borrow_mut();
            log.created.push(CreatedTransport {
                protocol,
                endpoint: endpoint.clone(),
                generation,
            });
            log.live += 1;
            log.max_live = log.max_live.max(log.live);
        }
        *self.sink.borrow_mut() = Some(sink);

        Ok(RecordingTransport {
            generation,
            log: Rc::clone(&self.log),
            link_up: Rc::clone(&self.link_up),
            destroyed: false,
        })
    }
}

#[derive(Debug)]
pub struct RecordingTransport {
    generation: u64,
    log: Rc<RefCell<TransportLog>>,
    link_up: Rc<Cell<bool>>,
    destroyed: bool,
}

impl Transport for RecordingTransport {
    fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        if self.destroyed {
            return Err(TransportError::Closed);
        }
        self.log
            .borrow_mut()
            .sent
            .push((self.generation, payload.to_string()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.destroyed && self.link_up.get()
    }

    fn destroy(&mut self) {
        let mut log = self.log.borrow_mut();
        log.destroyed.push(self.generation);
        if !self.destroyed {
            log.live -= 1;
        }
        self.destroyed = true;
    }
}

/// Host that remembers every status and log line it receives.
#[derive(Debug, Default)]
pub struct RecordingHost {
    config: RefCell<ConnectionConfig>,
    statuses: RefCell<Vec<ConnectionStatus>>,
    logs: RefCell<Vec<(LogLevel, String)>>,
}

impl RecordingHost {
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            config: RefCell::new(config),
            ..Self::default()
        }
    }

    pub fn set_config(&self, config: ConnectionConfig) {
        *self.config.borrow_mut() = config;
    }

    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.statuses.borrow().clone()
    }

    pub fn last_status(&self) -> Option<ConnectionStatus> {
        self.statuses.borrow().last().cloned()
    }

    pub fn logs(&self) -> Vec<(LogLevel, String)> {
        self.logs.borrow().clone()
    }
}

impl HostContext for RecordingHost {
    fn report_status(&self, status: &ConnectionStatus) {
        self.statuses.borrow_mut().push(status.clone());
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.logs.borrow_mut().push((level, message.to_string()));
    }

    fn read_config(&self) -> ConnectionConfig {
        self.config.borrow().clone()
    }
}

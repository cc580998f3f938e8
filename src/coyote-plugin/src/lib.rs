//! Remote control plugin for Coyote playback devices.
//!
//! This crate provides:
//! - The Coyote command encoder ([`protocol`])
//! - Static action, preset and config-field definitions for the host UI ([`catalog`])
//! - A transport seam plus tokio TCP/UDP implementations ([`transport`], [`net`])
//! - The connection manager and the plugin instance that dispatches actions
//!
//! # Wire format
//!
//! Commands are JSON objects terminated by `\r\n\r\n`, sent either over a
//! persistent TCP connection or as UDP datagrams (port 7000 by default):
//!
//! ```text
//! {"CoyoteAPIVersion":"0.3","CommandName":"SeekTo","Data":{"PK":3,"TimeIndex":5000}}
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use coyote_plugin::{notice_channel, ActionInvocation, ActionKind, CoyotePlugin, TokioTransportFactory};
//!
//! let (tx, mut notices) = notice_channel();
//! let mut plugin = CoyotePlugin::new(host, TokioTransportFactory::current()?, tx);
//! plugin.init();
//!
//! // feed transport notices back in from the event loop
//! while let Some(notice) = notices.recv().await {
//!     plugin.handle_notice(notice);
//! }
//!
//! plugin.action(&ActionInvocation::new(ActionKind::Play).with_option("id", "4"));
//! ```

pub mod catalog;
mod connection;
pub mod net;
mod plugin;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use catalog::{ActionDefinition, InputField, PresetCategory, PresetDefinition};
pub use connection::ConnectionManager;
pub use net::{NetTransport, TokioTransportFactory};
pub use plugin::{CoyotePlugin, DispatchOutcome};
pub use protocol::{encode, Action, ActionInvocation, ActionKind, PresetId, UnknownAction};
pub use transport::{
    notice_channel, Endpoint, NoticeReceiver, NoticeSender, NoticeSink, Transport,
    TransportError, TransportEvent, TransportFactory, TransportNotice,
};

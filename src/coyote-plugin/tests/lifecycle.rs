use coyote_core::{ConnectionConfig, ConnectionStatus, HostContext, Protocol};
use coyote_plugin::testing::{RecordingFactory, RecordingHost};
use coyote_plugin::{
    notice_channel, ActionInvocation, ActionKind, CoyotePlugin, DispatchOutcome, NoticeReceiver,
    TransportEvent,
};

fn drain<H: HostContext>(
    plugin: &mut CoyotePlugin<H, RecordingFactory>,
    notices: &mut NoticeReceiver,
) {
    while let Ok(notice) = notices.try_recv() {
        plugin.handle_notice(notice);
    }
}

#[test]
fn host_driven_lifecycle() {
    let factory = RecordingFactory::default();
    let (tx, mut notices) = notice_channel();
    let host = RecordingHost::with_config(ConnectionConfig::new("192.168.10.20", 7000, Protocol::Tcp));
    let mut plugin = CoyotePlugin::new(host, factory.clone(), tx);

    plugin.init();
    assert_eq!(plugin.status(), &ConnectionStatus::Connecting);

    let seek = ActionInvocation::new(ActionKind::SeekTo)
        .with_option("id", "3")
        .with_option("seek_time", 5000);
    assert_eq!(plugin.action(&seek), DispatchOutcome::Dropped);

    factory.emit(TransportEvent::Connected);
    drain(&mut plugin, &mut notices);
    assert_eq!(plugin.status(), &ConnectionStatus::Ok);
    assert_eq!(plugin.action(&seek), DispatchOutcome::Sent);

    factory.emit(TransportEvent::Error("ECONNRESET".into()));
    drain(&mut plugin, &mut notices);
    assert_eq!(plugin.action(&seek), DispatchOutcome::Dropped);

    plugin.teardown();
    plugin.teardown();
    drop(plugin);

    let log = factory.log();
    assert_eq!(log.sent.len(), 1);
    assert_eq!(
        log.sent[0].1,
        "{\"CoyoteAPIVersion\":\"0.3\",\"CommandName\":\"SeekTo\",\"Data\":{\"PK\":3,\"TimeIndex\":5000}}\r\n\r\n"
    );
    assert_eq!(log.destroyed, [1]);
    assert_eq!(log.live, 0);
}

#[test]
fn notices_from_replaced_transport_are_ignored() {
    let factory = RecordingFactory::default();
    let (tx, mut notices) = notice_channel();
    let host = RecordingHost::with_config(ConnectionConfig::new("192.168.10.20", 7000, Protocol::Tcp));
    let mut plugin = CoyotePlugin::new(host, factory.clone(), tx);
    plugin.init();

    factory.emit(TransportEvent::Connected);
    plugin.update_config(ConnectionConfig::new("192.168.10.21", 7000, Protocol::Tcp));
    drain(&mut plugin, &mut notices);

    assert_eq!(plugin.status(), &ConnectionStatus::Connecting);
    assert_eq!(
        plugin.action(&ActionInvocation::new(ActionKind::TakeNext)),
        DispatchOutcome::Dropped
    );
}

#[test]
fn reconfigure_never_overlaps_transports() {
    let factory = RecordingFactory::default();
    let (tx, _notices) = notice_channel();
    let host = RecordingHost::with_config(ConnectionConfig::new("10.0.0.1", 7000, Protocol::Tcp));
    let mut plugin = CoyotePlugin::new(host, factory.clone(), tx);
    plugin.init();

    for protocol in [Protocol::Udp, Protocol::Tcp, Protocol::Udp] {
        plugin.update_config(ConnectionConfig::new("10.0.0.1", 7000, protocol));
    }
    plugin.update_config(ConnectionConfig::default());

    let log = factory.log();
    assert_eq!(log.created.len(), 4);
    assert_eq!(log.destroyed, [1, 2, 3, 4]);
    assert_eq!(log.max_live, 1);
    assert_eq!(log.live, 0);
    assert!(!plugin.connection().has_transport());
}

#[test]
fn host_config_is_read_on_init() {
    let factory = RecordingFactory::default();
    let (tx, _notices) = notice_channel();
    let host = RecordingHost::default();
    host.set_config(ConnectionConfig::new("coyote.local", 7001, Protocol::Udp));
    let mut plugin = CoyotePlugin::new(host, factory.clone(), tx);
    plugin.init();

    let log = factory.log();
    let created = &log.created[0];
    assert_eq!(created.endpoint.to_string(), "coyote.local:7001");
    assert_eq!(created.protocol, Protocol::Udp);
}

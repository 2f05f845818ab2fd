use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use ripple_shared::{
    entity_serializer, Bindable, IdKind, LifetimeDefinition, Protocol, RdList, RdModel,
    RdProperty, SocketConfig, SocketWire, ThreadScheduler, Wire,
};
use ripple_test::{assert_eventually, init_logging, TestProtocols};

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn property_converges_to_last_writer() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_value = RdProperty::new(0);
    let server_value = RdProperty::new(0);
    protocols.client.bind_static(&client_value, "value", 1).unwrap();
    protocols.server.bind_static(&server_value, "value", 1).unwrap();

    client_value.set(1).unwrap();
    protocols.exchange();
    assert_eq!(server_value.value(), Some(1));

    server_value.set(2).unwrap();
    protocols.exchange();
    assert_eq!(client_value.value(), Some(2));
    assert_eq!(server_value.value(), Some(2));
}

#[test]
fn value_set_before_bind_is_sent_on_bind() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_value = RdProperty::new(String::new());
    let server_value = RdProperty::new(String::new());
    client_value.set("early".to_string()).unwrap();

    protocols.server.bind_static(&server_value, "name", 2).unwrap();
    protocols.client.bind_static(&client_value, "name", 2).unwrap();
    protocols.exchange();

    assert_eq!(server_value.value(), Some("early".to_string()));
}

#[test]
fn remote_changes_reach_local_listeners() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_value = RdProperty::new(0);
    let server_value = RdProperty::new(0);
    protocols.client.bind_static(&client_value, "value", 3).unwrap();
    protocols.server.bind_static(&server_value, "value", 3).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    server_value.advise(protocols.lifetime(), move |value| recorder.lock().push(*value));

    for value in [5, 6, 7] {
        client_value.set(value).unwrap();
    }
    protocols.exchange();

    assert_eq!(*seen.lock(), vec![0, 5, 6, 7]);
}

#[test]
fn slave_yields_to_master_version() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_value = RdProperty::new(0).slave();
    let server_value = RdProperty::new(0);
    protocols.client.bind_static(&client_value, "value", 4).unwrap();
    protocols.server.bind_static(&server_value, "value", 4).unwrap();

    server_value.set(10).unwrap();
    protocols.exchange();
    assert_eq!(client_value.value(), Some(10));
    assert_eq!(client_value.master_version(), 1);

    client_value.set(11).unwrap();
    protocols.exchange();
    assert_eq!(server_value.value(), Some(11));
}

#[test]
fn unbound_property_stops_receiving() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_value = RdProperty::new(0);
    let server_value = RdProperty::new(0);
    protocols.client.bind_static(&client_value, "value", 5).unwrap();
    protocols.server.bind_static(&server_value, "value", 5).unwrap();

    let id = server_value.rd_id();
    assert!(protocols.server.wire.is_subscribed(id));
    assert!(server_value.unbind());
    assert!(!protocols.server.wire.is_subscribed(id));

    client_value.set(3).unwrap();
    protocols.exchange();
    assert_eq!(server_value.value(), Some(0));
}

#[test]
fn property_converges_over_sockets() {
    init_logging();
    let lifetime = LifetimeDefinition::new();

    let server_scheduler = ThreadScheduler::new(lifetime.lifetime(), "server").unwrap();
    let server_wire = SocketWire::server(
        lifetime.lifetime(),
        server_scheduler.clone(),
        None,
        SocketConfig::default(),
    )
    .unwrap();
    let client_scheduler = ThreadScheduler::new(lifetime.lifetime(), "client").unwrap();
    let client_wire = SocketWire::client(
        lifetime.lifetime(),
        client_scheduler.clone(),
        server_wire.port(),
        SocketConfig::default().with_connect_retry_interval(Duration::from_millis(20)),
    )
    .unwrap();

    let server = Protocol::builder()
        .name("server")
        .identity_kind(IdKind::Server)
        .scheduler(server_scheduler)
        .wire(server_wire.clone())
        .lifetime(lifetime.lifetime())
        .build()
        .unwrap();
    let client = Protocol::builder()
        .name("client")
        .identity_kind(IdKind::Client)
        .scheduler(client_scheduler)
        .wire(client_wire.clone())
        .lifetime(lifetime.lifetime())
        .build()
        .unwrap();

    let client_value = RdProperty::new(0);
    let server_value = RdProperty::new(0);
    client_value.set_async(true);
    server_value.set_async(true);
    server.bind_static(&server_value, "value", 1).unwrap();
    client.bind_static(&client_value, "value", 1).unwrap();

    client_value.set(1).unwrap();
    assert_eventually!(TIMEOUT, server_value.value() == Some(1));

    server_value.set(2).unwrap();
    assert_eventually!(TIMEOUT, client_value.value() == Some(2));

    lifetime.terminate();
    assert!(client_wire.is_closed());
    assert!(server_wire.is_closed());
}

fn profile() -> RdModel {
    RdModel::new()
        .with_field("name", &RdProperty::new(String::new()))
        .unwrap()
        .with_field("scores", &RdList::<i32>::new())
        .unwrap()
}

#[test]
fn model_valued_property_replicates_under_shared_ids() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_profile = RdProperty::<RdModel>::with_serializer(None, entity_serializer(profile));
    let server_profile = RdProperty::<RdModel>::with_serializer(None, entity_serializer(profile));
    protocols.client.bind_static(&client_profile, "profile", 4).unwrap();
    protocols.server.bind_static(&server_profile, "profile", 4).unwrap();

    let sent = profile();
    let sent_name = sent.field::<RdProperty<String>>("name").unwrap();
    let sent_scores = sent.field::<RdList<i32>>("scores").unwrap();
    sent_name.set("alice".to_string()).unwrap();
    sent_scores.add(7).unwrap();
    client_profile.set(sent.clone()).unwrap();
    protocols.exchange();

    assert!(sent.is_bound());
    let received = server_profile.value().unwrap();
    assert!(received.is_bound());
    assert_eq!(received.rd_id(), sent.rd_id());

    let received_name = received.field::<RdProperty<String>>("name").unwrap();
    let received_scores = received.field::<RdList<i32>>("scores").unwrap();
    assert_eq!(received_name.rd_id(), sent_name.rd_id());
    assert_eq!(received_name.value(), Some("alice".to_string()));
    assert_eq!(received_scores.to_vec(), vec![7]);

    received_name.set("bob".to_string()).unwrap();
    received_scores.add(8).unwrap();
    protocols.exchange();

    assert_eq!(sent_name.value(), Some("bob".to_string()));
    assert_eq!(sent_scores.to_vec(), vec![7, 8]);
}

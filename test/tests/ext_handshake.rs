use std::sync::Arc;

use parking_lot::Mutex;

use ripple_shared::{Bindable, ExtThreading, RdExt, RdModel, RdProperty};
use ripple_test::{init_logging, TestProtocols};

struct Side {
    model: RdModel,
    good: RdExt,
    bad: RdExt,
    value: RdProperty<i32>,
}

fn build_side(bad_fingerprint: i64) -> Side {
    let value = RdProperty::new(0);
    let good = RdExt::new(ExtThreading::Parent)
        .with_field("value", &value)
        .unwrap();
    let bad = RdExt::new(ExtThreading::Parent).with_fingerprint(bad_fingerprint);
    let model = RdModel::new()
        .with_field("good", &good)
        .unwrap()
        .with_field("bad", &bad)
        .unwrap();
    Side {
        model,
        good,
        bad,
        value,
    }
}

#[test]
fn fingerprint_mismatch_isolates_only_that_extension() {
    init_logging();
    let protocols = TestProtocols::new();

    let client = build_side(1);
    let server = build_side(2);
    protocols.client.bind_static(&client.model, "model", 7).unwrap();
    protocols.server.bind_static(&server.model, "model", 7).unwrap();
    protocols.exchange();

    assert!(protocols.client.protocol.is_out_of_sync(client.bad.rd_id()));
    assert!(protocols.server.protocol.is_out_of_sync(server.bad.rd_id()));
    assert!(!client.bad.is_connected());
    assert!(!server.bad.is_connected());

    assert!(client.good.is_connected());
    assert!(server.good.is_connected());
    assert!(!protocols.client.protocol.is_out_of_sync(client.good.rd_id()));

    client.value.set(42).unwrap();
    protocols.exchange();
    assert_eq!(server.value.value(), Some(42));
}

#[test]
fn traffic_before_handshake_is_held_back() {
    init_logging();
    let protocols = TestProtocols::new();

    let client = build_side(3);
    let server = build_side(3);
    protocols.client.bind_static(&client.model, "model", 8).unwrap();

    // the server side does not exist yet, so the client extension cannot connect
    client.value.set(5).unwrap();
    assert!(!client.good.is_connected());
    assert_eq!(client.good.queued(), 1);

    protocols.server.bind_static(&server.model, "model", 8).unwrap();
    protocols.exchange();

    assert!(client.good.is_connected());
    assert!(client.bad.is_connected());
    assert_eq!(client.good.queued(), 0);
    assert_eq!(server.value.value(), Some(5));
}

#[test]
fn extension_created_after_bind_connects() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_model = RdModel::new();
    let server_model = RdModel::new();
    protocols.client.bind_static(&client_model, "model", 9).unwrap();
    protocols.server.bind_static(&server_model, "model", 9).unwrap();

    let created = Arc::new(Mutex::new(Vec::new()));
    let sink = created.clone();
    protocols
        .server
        .protocol
        .ext_created()
        .advise(protocols.lifetime(), move |event| sink.lock().push(event.id));

    let make = || {
        RdExt::new(ExtThreading::Parent)
            .with_field("count", &RdProperty::new(0))
            .unwrap()
    };
    let client_ext: RdExt = client_model.get_or_create_extension("late", make).unwrap();
    let server_ext: RdExt = server_model.get_or_create_extension("late", make).unwrap();
    protocols.exchange();

    assert_eq!(client_ext.rd_id(), server_ext.rd_id());
    assert_eq!(*created.lock(), vec![server_ext.rd_id()]);
    assert!(client_ext.is_connected());
    assert!(server_ext.is_connected());

    let again: RdExt = client_model.get_or_create_extension("late", make).unwrap();
    assert_eq!(again.rd_id(), client_ext.rd_id());

    let count: RdProperty<i32> = client_ext.field("count").unwrap();
    let remote_count: RdProperty<i32> = server_ext.field("count").unwrap();
    count.set(9).unwrap();
    protocols.exchange();
    assert_eq!(remote_count.value(), Some(9));
}

#[test]
fn unbinding_an_extension_disconnects_the_counterpart() {
    init_logging();
    let protocols = TestProtocols::new();

    let client = build_side(4);
    let server = build_side(4);
    protocols.client.bind_static(&client.model, "model", 10).unwrap();
    protocols.server.bind_static(&server.model, "model", 10).unwrap();
    protocols.exchange();
    assert!(server.good.is_connected());

    assert!(client.good.unbind());
    protocols.exchange();

    assert!(!client.good.is_connected());
    assert!(!server.good.is_connected());
}

use std::sync::Arc;

use parking_lot::Mutex;

use ripple_shared::{Bindable, RdSignal, Wire};
use ripple_test::{init_logging, TestProtocols};

fn recorder(signal: &RdSignal<String>, protocols: &TestProtocols) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    signal.advise(protocols.lifetime(), move |value: &String| sink.lock().push(value.clone()));
    seen
}

#[test]
fn fire_without_remote_subscriber_is_dropped() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_signal = RdSignal::<String>::new();
    let server_signal = RdSignal::<String>::new();
    protocols.client.bind_static(&client_signal, "events", 1).unwrap();

    let local = recorder(&client_signal, &protocols);
    client_signal.fire("lost".to_string()).unwrap();
    assert_eq!(*local.lock(), vec!["lost".to_string()]);

    protocols.exchange();
    assert!(!protocols.server.wire.has_pending(client_signal.rd_id()));

    protocols.server.bind_static(&server_signal, "events", 1).unwrap();
    let remote = recorder(&server_signal, &protocols);
    protocols.exchange();
    assert!(remote.lock().is_empty());

    client_signal.fire("seen".to_string()).unwrap();
    protocols.exchange();
    assert_eq!(*remote.lock(), vec!["seen".to_string()]);
}

#[test]
fn late_subscriber_gets_messages_in_order() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_signal = RdSignal::<String>::new();
    let server_signal = RdSignal::<String>::new();
    protocols.client.bind_static(&client_signal, "events", 2).unwrap();

    client_signal.fire("m1".to_string()).unwrap();
    client_signal.fire("m2".to_string()).unwrap();

    // messages reach the broker, but the server scheduler has not run yet
    protocols.client.wire.flush();
    assert!(protocols.server.wire.has_pending(client_signal.rd_id()));

    protocols.server.bind_static(&server_signal, "events", 2).unwrap();
    let remote = recorder(&server_signal, &protocols);
    protocols.exchange();

    assert_eq!(*remote.lock(), vec!["m1".to_string(), "m2".to_string()]);
    assert!(!protocols.server.wire.has_pending(client_signal.rd_id()));
}

#[test]
fn unbound_signal_fires_locally_only() {
    init_logging();
    let protocols = TestProtocols::new();

    let signal = RdSignal::<String>::new();
    let local = recorder(&signal, &protocols);
    signal.fire("local".to_string()).unwrap();

    assert_eq!(*local.lock(), vec!["local".to_string()]);
    assert_eq!(protocols.client.wire.sent_count(), 0);
}

#[test]
fn terminated_binding_removes_subscription() {
    init_logging();
    let protocols = TestProtocols::new();

    let signal = RdSignal::<String>::new();
    let binding = protocols.lifetime().create_nested();
    protocols
        .client
        .protocol
        .bind_static_in(binding.lifetime(), &signal, "events", 3)
        .unwrap();
    let id = signal.rd_id();
    assert!(protocols.client.wire.is_subscribed(id));

    binding.terminate();
    assert!(!protocols.client.wire.is_subscribed(id));
    assert!(!signal.is_bound());
}

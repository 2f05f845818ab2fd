use std::sync::Arc;

use parking_lot::Mutex;

use ripple_shared::{ListEvent, RdList, RdMap, RdSet};
use ripple_test::{init_logging, TestProtocols};

#[test]
fn list_edits_replicate_in_both_directions() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_list = RdList::<String>::new();
    let server_list = RdList::<String>::new();
    protocols.client.bind_static(&client_list, "names", 30).unwrap();
    protocols.server.bind_static(&server_list, "names", 30).unwrap();

    client_list.add("a".to_string()).unwrap();
    client_list.add("c".to_string()).unwrap();
    assert!(client_list.insert(1, "b".to_string()).unwrap());
    protocols.exchange();
    assert_eq!(server_list.to_vec(), vec!["a", "b", "c"]);

    assert_eq!(server_list.set(0, "z".to_string()).unwrap(), Some("a".to_string()));
    assert_eq!(server_list.remove_at(2).unwrap(), Some("c".to_string()));
    protocols.exchange();
    assert_eq!(client_list.to_vec(), vec!["z", "b"]);

    client_list.clear().unwrap();
    protocols.exchange();
    assert!(server_list.is_empty());
}

#[test]
fn remote_list_edits_reach_listeners_as_events() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_list = RdList::<i32>::new();
    let server_list = RdList::<i32>::new();
    protocols.client.bind_static(&client_list, "values", 31).unwrap();
    protocols.server.bind_static(&server_list, "values", 31).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    server_list.advise(protocols.lifetime(), move |event: &ListEvent<i32>| {
        sink.lock().push(event.clone())
    });

    client_list.add(1).unwrap();
    client_list.set(0, 2).unwrap();
    client_list.remove_at(0).unwrap();
    protocols.exchange();

    assert_eq!(
        *events.lock(),
        vec![
            ListEvent::Add { index: 0, value: 1 },
            ListEvent::Update {
                index: 0,
                old_value: 1,
                new_value: 2
            },
            ListEvent::Remove { index: 0, value: 2 },
        ]
    );
}

#[test]
fn set_membership_replicates() {
    init_logging();
    let protocols = TestProtocols::new();

    let client_set = RdSet::<i32>::new();
    let server_set = RdSet::<i32>::new();
    protocols.client.bind_static(&client_set, "ids", 32).unwrap();
    protocols.server.bind_static(&server_set, "ids", 32).unwrap();

    assert!(client_set.add(1).unwrap());
    assert!(client_set.add(2).unwrap());
    assert!(!client_set.add(2).unwrap());
    protocols.exchange();
    assert!(server_set.contains(&1));
    assert!(server_set.contains(&2));
    assert_eq!(server_set.len(), 2);

    assert!(server_set.remove(&1).unwrap());
    protocols.exchange();
    assert!(!client_set.contains(&1));

    server_set.add(3).unwrap();
    protocols.exchange();
    assert_eq!(client_set.to_vec(), vec![2, 3]);

    client_set.clear().unwrap();
    protocols.exchange();
    assert!(client_set.is_empty());
    assert!(server_set.is_empty());
}

#[test]
fn map_master_tracks_acknowledgements() {
    init_logging();
    let protocols = TestProtocols::new();

    let server_map = RdMap::<String, i32>::new().master();
    let client_map = RdMap::<String, i32>::new();
    protocols.server.bind_static(&server_map, "scores", 33).unwrap();
    protocols.client.bind_static(&client_map, "scores", 33).unwrap();

    server_map.set("alice".to_string(), 1).unwrap();
    assert_eq!(server_map.pending_keys(), vec!["alice".to_string()]);

    protocols.exchange();
    assert_eq!(client_map.get(&"alice".to_string()), Some(1));
    assert!(server_map.pending_keys().is_empty());

    client_map.set("bob".to_string(), 2).unwrap();
    protocols.exchange();
    assert_eq!(server_map.get(&"bob".to_string()), Some(2));

    client_map.remove(&"alice".to_string()).unwrap();
    protocols.exchange();
    assert!(!server_map.contains_key(&"alice".to_string()));
}

#[test]
fn map_master_rejects_slave_change_to_unacknowledged_key() {
    init_logging();
    let protocols = TestProtocols::new();

    let server_map = RdMap::<String, i32>::new().master();
    let client_map = RdMap::<String, i32>::new();
    protocols.server.bind_static(&server_map, "scores", 34).unwrap();
    protocols.client.bind_static(&client_map, "scores", 34).unwrap();

    // both edit the same key before anything crosses
    server_map.set("key".to_string(), 10).unwrap();
    client_map.set("key".to_string(), 20).unwrap();
    protocols.exchange();

    assert_eq!(server_map.get(&"key".to_string()), Some(10));
    assert_eq!(client_map.get(&"key".to_string()), Some(10));
    assert!(server_map.pending_keys().is_empty());
}

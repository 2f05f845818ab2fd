use ripple_shared::{
    EntityKind, ExtThreading, LifetimeDefinition, ModelSynchronizer, RdCall, RdExt, RdList,
    RdMap, RdModel, RdProperty, RdSet, RdSignal, SyncError,
};
use ripple_test::{init_logging, TestProtocols};

fn profile() -> (RdModel, RdProperty<String>, RdList<i32>) {
    let name = RdProperty::new(String::new());
    let scores = RdList::<i32>::new();
    let model = RdModel::new()
        .with_field("name", &name)
        .unwrap()
        .with_field("scores", &scores)
        .unwrap();
    (model, name, scores)
}

#[test]
fn synchronized_models_mirror_each_other() {
    init_logging();
    let lifetime = LifetimeDefinition::new();
    let (left, left_name, left_scores) = profile();
    let (right, right_name, right_scores) = profile();
    left_name.set("ada".to_string()).unwrap();
    left_scores.add(3).unwrap();

    ModelSynchronizer::new()
        .synchronize(lifetime.lifetime(), &left, &right)
        .unwrap();
    assert_eq!(right_name.value(), Some("ada".to_string()));
    assert_eq!(right_scores.to_vec(), vec![3]);

    right_name.set("grace".to_string()).unwrap();
    right_scores.add(4).unwrap();
    assert_eq!(left_name.value(), Some("grace".to_string()));
    assert_eq!(left_scores.to_vec(), vec![3, 4]);

    lifetime.terminate();
    left_name.set("alan".to_string()).unwrap();
    assert_eq!(right_name.value(), Some("grace".to_string()));
}

#[test]
fn sets_merge_both_ways() {
    init_logging();
    let lifetime = LifetimeDefinition::new();
    let left = RdSet::<i32>::new();
    let right = RdSet::<i32>::new();
    left.add(1).unwrap();
    right.add(2).unwrap();

    ModelSynchronizer::new()
        .synchronize(lifetime.lifetime(), &left, &right)
        .unwrap();

    assert!(left.contains(&2));
    assert!(right.contains(&1));
}

#[test]
fn signals_forward_fires() {
    init_logging();
    let lifetime = LifetimeDefinition::new();
    let left = RdSignal::<i32>::new();
    let right = RdSignal::<i32>::new();
    ModelSynchronizer::new()
        .synchronize(lifetime.lifetime(), &left, &right)
        .unwrap();

    let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    right.advise(lifetime.lifetime(), move |value| sink.lock().push(*value));
    left.fire(8).unwrap();

    assert_eq!(*seen.lock(), vec![8]);
}

#[test]
fn missing_extension_is_created_on_the_other_side() {
    init_logging();
    let lifetime = LifetimeDefinition::new();
    let level = RdProperty::new(1);
    let left = RdModel::new()
        .with_field(
            "stats",
            &RdExt::new(ExtThreading::Parent)
                .with_field("level", &level)
                .unwrap(),
        )
        .unwrap();
    let right = RdModel::new();

    ModelSynchronizer::new()
        .synchronize(lifetime.lifetime(), &left, &right)
        .unwrap();

    let created: RdExt = right.field("stats").unwrap();
    let mirrored_level: RdProperty<i32> = created.field("level").unwrap();
    assert_eq!(mirrored_level.value(), Some(1));

    level.set(2).unwrap();
    assert_eq!(mirrored_level.value(), Some(2));
}

#[test]
fn mismatched_kinds_are_rejected() {
    init_logging();
    let lifetime = LifetimeDefinition::new();

    let result = ModelSynchronizer::new().synchronize(
        lifetime.lifetime(),
        &RdProperty::new(0),
        &RdList::<i32>::new(),
    );
    assert!(matches!(
        result,
        Err(SyncError::NotMutuallySynchronizable {
            left_kind: EntityKind::Property,
            right_kind: EntityKind::List,
            ..
        })
    ));

    let result = ModelSynchronizer::new().synchronize(
        lifetime.lifetime(),
        &RdProperty::new(0),
        &RdProperty::new(String::new()),
    );
    assert!(matches!(
        result,
        Err(SyncError::NotMutuallySynchronizable { .. })
    ));
}

#[test]
fn models_with_rpc_fields_synchronize() {
    init_logging();
    let lifetime = LifetimeDefinition::new();
    let side = || {
        let count = RdProperty::new(0);
        let model = RdModel::new()
            .with_field("count", &count)
            .unwrap()
            .with_field("ping", &RdCall::<i32, i32>::new())
            .unwrap();
        (model, count)
    };
    let (left, left_count) = side();
    let (right, right_count) = side();

    ModelSynchronizer::new()
        .synchronize(lifetime.lifetime(), &left, &right)
        .unwrap();

    left_count.set(3).unwrap();
    assert_eq!(right_count.value(), Some(3));
}

#[test]
fn lists_holding_data_on_both_sides_end_up_equal() {
    init_logging();
    let lifetime = LifetimeDefinition::new();
    let left = RdList::<i32>::new();
    let right = RdList::<i32>::new();
    left.add(1).unwrap();
    left.add(2).unwrap();
    right.add(3).unwrap();

    ModelSynchronizer::new()
        .synchronize(lifetime.lifetime(), &left, &right)
        .unwrap();
    assert_eq!(left.to_vec(), vec![1, 2]);
    assert_eq!(right.to_vec(), vec![1, 2]);

    right.insert(0, 0).unwrap();
    left.remove_at(2).unwrap();
    assert_eq!(left.to_vec(), vec![0, 1]);
    assert_eq!(right.to_vec(), vec![0, 1]);
}

#[test]
fn maps_holding_data_on_both_sides_end_up_equal() {
    init_logging();
    let lifetime = LifetimeDefinition::new();
    let left = RdMap::<i32, i32>::new();
    let right = RdMap::<i32, i32>::new();
    left.set(1, 10).unwrap();
    left.set(3, 30).unwrap();
    right.set(2, 20).unwrap();
    right.set(3, 33).unwrap();

    ModelSynchronizer::new()
        .synchronize(lifetime.lifetime(), &left, &right)
        .unwrap();

    let sorted = |map: &RdMap<i32, i32>| {
        let mut entries = map.entries();
        entries.sort();
        entries
    };
    assert_eq!(sorted(&left), vec![(1, 10), (2, 20), (3, 30)]);
    assert_eq!(sorted(&right), sorted(&left));

    right.remove(&1).unwrap();
    assert!(!left.contains_key(&1));
}

#[test]
fn non_extension_child_on_one_side_is_a_mismatch() {
    init_logging();
    let lifetime = LifetimeDefinition::new();
    let (left, _, _) = profile();
    let right = RdModel::new()
        .with_field("name", &RdProperty::new(String::new()))
        .unwrap();

    let result = ModelSynchronizer::new().synchronize(lifetime.lifetime(), &left, &right);
    assert!(matches!(result, Err(SyncError::ChildrenMismatch { .. })));
}

#[test]
fn local_mirror_drives_a_bound_model() {
    init_logging();
    let protocols = TestProtocols::new();
    let (client_model, _, _) = profile();
    let (server_model, server_name, _) = profile();
    protocols.client.bind_static(&client_model, "profile", 40).unwrap();
    protocols.server.bind_static(&server_model, "profile", 40).unwrap();

    let (mirror, mirror_name, _) = profile();
    ModelSynchronizer::new()
        .synchronize(protocols.lifetime(), &client_model, &mirror)
        .unwrap();

    mirror_name.set("from mirror".to_string()).unwrap();
    protocols.exchange();
    assert_eq!(server_name.value(), Some("from mirror".to_string()));
}

use proptest::prelude::*;

use ripple_shared::RdList;
use ripple_test::TestProtocols;

#[derive(Clone, Debug)]
enum Edit {
    Add(i32),
    Insert(usize, i32),
    Set(usize, i32),
    Remove(usize),
    Clear,
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => any::<i32>().prop_map(Edit::Add),
        3 => (any::<usize>(), any::<i32>()).prop_map(|(i, v)| Edit::Insert(i, v)),
        3 => (any::<usize>(), any::<i32>()).prop_map(|(i, v)| Edit::Set(i, v)),
        3 => any::<usize>().prop_map(Edit::Remove),
        1 => Just(Edit::Clear),
    ]
}

fn apply(list: &RdList<i32>, edit: &Edit) {
    let len = list.len();
    match *edit {
        Edit::Add(value) => list.add(value).unwrap(),
        Edit::Insert(index, value) => {
            assert!(list.insert(index % (len + 1), value).unwrap());
        }
        Edit::Set(index, value) if len > 0 => {
            list.set(index % len, value).unwrap();
        }
        Edit::Remove(index) if len > 0 => {
            list.remove_at(index % len).unwrap();
        }
        Edit::Clear => list.clear().unwrap(),
        _ => {}
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn single_writer_edits_converge(edits in proptest::collection::vec(edit(), 0..40)) {
        let protocols = TestProtocols::new();
        let writer = RdList::<i32>::new();
        let reader = RdList::<i32>::new();
        protocols.client.bind_static(&writer, "values", 50).unwrap();
        protocols.server.bind_static(&reader, "values", 50).unwrap();

        for edit in &edits {
            apply(&writer, edit);
        }
        protocols.exchange();

        prop_assert_eq!(reader.to_vec(), writer.to_vec());
    }

    #[test]
    fn edits_interleaved_with_exchanges_converge(
        edits in proptest::collection::vec((edit(), any::<bool>()), 0..30)
    ) {
        let protocols = TestProtocols::new();
        let writer = RdList::<i32>::new();
        let reader = RdList::<i32>::new();
        protocols.server.bind_static(&writer, "values", 51).unwrap();
        protocols.client.bind_static(&reader, "values", 51).unwrap();

        for (edit, flush) in &edits {
            apply(&writer, edit);
            if *flush {
                protocols.exchange();
            }
        }
        protocols.exchange();

        prop_assert_eq!(reader.to_vec(), writer.to_vec());
    }
}

use proptest::prelude::*;

use ripple_shared::{ByteReader, ByteWriter, IdKind, Identities, RdId, Serde};

#[test]
fn test_mix_concatenation_law() {
    assert_eq!(
        RdId::NULL.mix("abcd").mix("efg"),
        RdId::NULL.mix("abcdefg")
    );
}

#[test]
fn test_path_ids_are_stable_and_flagged() {
    let client = Identities::new(IdKind::Client);
    let server = Identities::new(IdKind::Server);

    let client_id = client.mix(RdId::new(7), ".model");
    let server_id = server.mix(RdId::new(7), ".model");
    assert_eq!(client_id, server_id);
    assert!(client_id.value() < 0);
}

proptest! {
    #[test]
    fn mix_splits_anywhere(head in ".{0,16}", tail in ".{0,16}", seed in any::<i64>()) {
        let whole = format!("{}{}", head, tail);
        prop_assert_eq!(
            RdId::new(seed).mix(&head).mix(&tail),
            RdId::new(seed).mix(&whole)
        );
    }

    #[test]
    fn strings_survive_the_wire(text in "\\PC{0,32}") {
        let mut writer = ByteWriter::new();
        text.ser(&mut writer);
        prop_assert_eq!(writer.len(), text.byte_length());

        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        prop_assert_eq!(String::de(&mut reader).unwrap(), text);
        prop_assert!(reader.is_empty());
    }
}

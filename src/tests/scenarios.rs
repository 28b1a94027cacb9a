//! End-to-end scenarios covering construction, pruning, branch operations,
//! reservation, serialization round-trips, the method registry, and clone
//! independence (labeled S1-S11 for cross-reference).

use crate::{
    read_tree_store, register_method, select_method, write_tree_store, BitmapReadSource,
    BitmapTree, BitmapWriteSink, CodecError, RegistryError, SliceSource, VecSink,
};

fn roundtrip(b: &BitmapTree) -> BitmapTree {
    let mut sink = VecSink::default();
    b.write(&mut sink);
    let mut source = SliceSource::new(&sink.0);
    BitmapTree::read(&mut source).expect("round-trip of a valid tree must decode")
}

#[test]
fn s1_basic_set_clear_pruning() {
    let mut b = BitmapTree::create(256);
    assert_eq!(b.count_ones(), 0);
    assert_eq!(b.count_nodes(), 0);

    b.set_bit(256); // out of range, no-op
    assert_eq!(b.bit(256), 0);

    b.set_bit(255);
    b.set_bit(0);
    assert_eq!(b.count_nodes(), 5);
    assert_eq!(b.count_ones(), 2);

    b.clear_bit(255);
    b.clear_bit(0);
    assert_eq!(b.count_nodes(), 0);
}

#[test]
fn s2_universe_of_2_pow_64() {
    let mut b = BitmapTree::create(0);
    b.set_bit(u64::MAX);
    assert_eq!(b.bit(u64::MAX), 1);
    assert_eq!(b.count_nodes(), 59);

    b.clear_bit(u64::MAX);
    assert_eq!(b.count_nodes(), 0);
}

#[test]
fn s3_branch_operations() {
    let mut b = BitmapTree::create(256);
    assert!(b.set_branch(0, 3).is_err());
    assert!(b.set_branch(17, 8).is_err());
    assert!(b.set_branch(256, 8).is_err());

    b.set_branch(0, 256).unwrap();
    assert_eq!(b.count_ones(), 256);
    assert_eq!(b.count_nodes(), 0);

    b.clear_branch(128, 128).unwrap();
    assert_eq!(b.count_ones(), 128);
    assert_eq!(b.count_nodes(), 1);

    assert_eq!(b.reserve_bit(), Some(128));
}

#[test]
fn s4_sub_64_branch() {
    let mut b = BitmapTree::create(256);
    b.set_branch(0, 0).unwrap(); // size 0 == whole universe

    b.clear_branch(200, 8).unwrap();
    b.clear_branch(248, 4).unwrap();

    for expected in 200..208 {
        assert_eq!(b.reserve_bit(), Some(expected));
    }
    for expected in 248..252 {
        assert_eq!(b.reserve_bit(), Some(expected));
    }
    assert_eq!(b.reserve_bit(), None);
}

#[test]
fn s5_half_universe() {
    let mut b = BitmapTree::create(1u64 << 63);
    assert_eq!(b.size(), 1u64 << 63);

    b.set_branch(0, 0).unwrap();
    assert_eq!(b.count_ones(), 1u64 << 63);
}

#[test]
fn s6_serialize_round_trip() {
    let mut b = BitmapTree::create(0);
    b.set_branch(0, 0).unwrap();
    b.clear_branch(0, 1u64 << 63).unwrap();
    b.set_bit(0);

    let back = roundtrip(&b);
    assert!(b.compare(&back));

    let empty = BitmapTree::create(1024);
    assert!(empty.compare(&roundtrip(&empty)));

    let mut full = BitmapTree::create(1024);
    full.set_branch(0, 0).unwrap();
    assert!(full.compare(&roundtrip(&full)));
}

#[test]
fn s7_single_word_universe() {
    let mut b = BitmapTree::create(64);
    b.set_bit(64); // out of range
    assert_eq!(b.count_ones(), 0);

    b.set_bit(63);
    assert_eq!(b.count_ones(), 1);
    assert_eq!(b.count_nodes(), 1);

    b.clear_bit(63);
    assert_eq!(b.count_ones(), 0);
    assert_eq!(b.count_nodes(), 0);
}

#[test]
fn s8_node_transitions_across_128_bit_universe() {
    let mut b = BitmapTree::create(128);
    for offset in 0..128 {
        b.set_bit(offset);
        assert_eq!(b.bit(offset), 1);
    }
    assert_eq!(b.count_ones(), 128);
    assert_eq!(b.count_nodes(), 0, "fully set tree prunes to a single sentinel");

    for offset in 0..128 {
        b.clear_bit(offset);
    }
    assert_eq!(b.count_ones(), 0);
    assert_eq!(b.count_nodes(), 0, "fully cleared tree prunes back to empty");
}

#[test]
fn s9_reserve_interacts_with_a_cleared_bit() {
    let mut b = BitmapTree::create(256);
    for offset in 0..64 {
        b.set_bit(offset);
    }
    assert_eq!(b.reserve_bit(), Some(64));

    b.clear_bit(1);
    assert_eq!(b.reserve_bit(), Some(1));
}

fn tagged_write(b: &BitmapTree, sink: &mut dyn BitmapWriteSink) {
    sink.write_all(&[0xaa]);
    write_tree_store(b, sink);
}

fn tagged_read(source: &mut dyn BitmapReadSource) -> Result<BitmapTree, CodecError> {
    let mut tag = [0u8; 1];
    let n = source.read(&mut tag);
    if n != 1 || tag[0] != 0xaa {
        return Err(CodecError::ShortRead { expected: 1, actual: n });
    }
    read_tree_store(source)
}

#[test]
fn s10_registry_round_trip_and_selection_failure() {
    let _guard = crate::registry::TEST_LOCK.lock().unwrap();

    register_method("tagged-test", tagged_read, tagged_write, false)
        .expect("registry has room for this test's entries");
    select_method("tagged-test").expect("just registered");

    let mut b = BitmapTree::create(64);
    b.set_bit(3);
    let mut sink = VecSink::default();
    b.write(&mut sink);
    assert_eq!(sink.0[0], 0xaa, "tagged codec's marker byte must lead the stream");

    let mut source = SliceSource::new(&sink.0);
    let back = BitmapTree::read(&mut source).unwrap();
    assert!(b.compare(&back));

    select_method("tree-store").unwrap();

    assert!(matches!(
        select_method("does-not-exist"),
        Err(RegistryError::UnknownMethod { .. })
    ));

    // Fill the table to its cap and confirm the next registration is rejected.
    let mut i = 0;
    while crate::registry::entry_count() < crate::registry::MAX_METHODS {
        let name: &'static str = Box::leak(format!("filler-{i}").into_boxed_str());
        register_method(name, tagged_read, tagged_write, false).expect("table has room");
        i += 1;
    }
    let overflow_name: &'static str = Box::leak(format!("filler-{i}").into_boxed_str());
    assert!(matches!(
        register_method(overflow_name, tagged_read, tagged_write, false),
        Err(RegistryError::TableFull)
    ));
}

#[test]
fn s11_clone_divergence() {
    let mut b = BitmapTree::create(256);
    b.set_bit(10);
    let clone = b.clone();
    assert!(b.compare(&clone));

    b.set_bit(20);
    assert!(!b.compare(&clone));
    assert_eq!(clone.count_ones(), 1);
    assert_eq!(b.count_ones(), 2);
}

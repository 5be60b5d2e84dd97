#![allow(missing_docs)]
use crate::HashSet;
use rand::prelude::*;
use std::hash::BuildHasherDefault;
use zwohash::ZwoHasher;

type ZwoSet<T> = HashSet<T, BuildHasherDefault<ZwoHasher>>;

#[test]
fn test_against_std() {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(17);
    let mut dut: ZwoSet<u16> = ZwoSet::new();
    let mut ref_set = std::collections::HashSet::new();

    for _ in 0..10000 {
        let value = rng.gen_range(0..512u16);
        match rng.gen_range(0..4) {
            0 | 1 => assert_eq!(dut.insert(value), ref_set.insert(value)),
            2 => assert_eq!(dut.remove(&value).is_ok(), ref_set.remove(&value)),
            _ => assert_eq!(dut.exists(&value), ref_set.contains(&value)),
        }
        assert_eq!(dut.len(), ref_set.len());
    }
    dut.check();
    let mut values: Vec<u16> = dut.iter().copied().collect();
    values.sort_unstable();
    let mut expected: Vec<u16> = ref_set.into_iter().collect();
    expected.sort_unstable();
    assert_eq!(values, expected);
}

#[test]
fn find_singleton_returns_canonical_instance() {
    let mut set: ZwoSet<Box<str>> = ZwoSet::new();
    assert!(set.find_singleton("abc").is_none());
    set.insert_without_checking("abc".into());
    set.insert("def".into());
    let first: *const str = &**set.find_singleton("abc").unwrap();
    for i in 0..20 {
        set.insert(i.to_string().into());
    }
    let second: *const str = &**set.find_singleton("abc").unwrap();
    assert_eq!(first, second);
    assert_eq!(set.len(), 22);
    assert_eq!(set.find_singleton("def").map(|s| &**s), Some("def"));
}

#[test]
fn insert_without_checking_duplicates() {
    let mut set: ZwoSet<u32> = ZwoSet::new();
    set.insert_without_checking(4);
    set.insert_without_checking(4);
    assert_eq!(set.len(), 2);
    assert!(!set.insert(4));
    assert_eq!(set.len(), 2);
    set.check();
}

#[test]
fn erase_and_reserve() {
    let mut set: ZwoSet<u32> = ZwoSet::with_buckets(1);
    set.reserve(100);
    let buckets = set.num_buckets();
    set.extend(0..100);
    assert_eq!(set.num_buckets(), buckets);
    assert_eq!(set.erase(&50), 1);
    assert_eq!(set.erase(&50), 0);
    assert!(set.remove(&50).is_err());
    set.retain(|value| value % 2 == 0);
    assert_eq!(set.len(), 49);
    assert!(!set.contains(&51));
    set.check();

    set.clear();
    assert!(set.is_empty());
    set.reset();
    assert_eq!(set.num_buckets(), 1);
    assert_eq!(set.stats().slots, 1);
}

#![allow(missing_docs)]
use crate::{HashTable, NotFoundError};
use indexmap::IndexMap;
use rand::prelude::*;
use std::{
    borrow::Borrow,
    fmt::Debug,
    hash::{BuildHasherDefault, Hash},
};
use zwohash::ZwoHasher;

type ZwoTable<K, V> = HashTable<K, V, BuildHasherDefault<ZwoHasher>>;

struct CheckedTable<K, V> {
    dut: ZwoTable<K, V>,
    ref_map: IndexMap<K, V>,
}

impl<K: Hash + Eq + Clone + Debug, V: Eq + Clone + Debug> CheckedTable<K, V> {
    fn new() -> Self {
        CheckedTable {
            dut: ZwoTable::new(),
            ref_map: IndexMap::new(),
        }
    }
    fn len(&self) -> usize {
        self.ref_map.len()
    }
    fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: Hash + Eq,
        K: Borrow<Q>,
    {
        let ref_result = self.ref_map.get(key);
        let dut_result = self.dut.get(key);
        assert_eq!(ref_result, dut_result);
        ref_result
    }
    fn insert(&mut self, key: K, value: V) -> bool {
        let ref_result = match self.ref_map.entry(key.clone()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(value.clone());
                true
            }
        };
        let (stored, dut_result) = self.dut.insert(key.clone(), value);
        assert_eq!(ref_result, dut_result);
        assert_eq!(Some(&*stored), self.ref_map.get(&key));
        ref_result
    }
    fn get_or_insert_default(&mut self, key: K) -> V
    where
        V: Default,
    {
        let ref_result = self.ref_map.entry(key.clone()).or_default().clone();
        let dut_result = self.dut.get_or_insert_default(key).clone();
        assert_eq!(ref_result, dut_result);
        ref_result
    }
    fn remove<Q>(&mut self, key: &Q) -> Result<V, NotFoundError>
    where
        Q: Hash + Eq,
        K: Borrow<Q>,
    {
        let ref_result = self.ref_map.swap_remove(key).ok_or(NotFoundError);
        let dut_result = self.dut.remove(key);
        assert_eq!(ref_result, dut_result);
        ref_result
    }
    fn retain(&mut self, f: impl Fn(&K, &mut V) -> bool) {
        self.dut.retain(&f);
        self.ref_map.retain(f);
        self.check();
    }
    fn clear(&mut self) {
        let slots = self.dut.stats().slots;
        self.dut.clear();
        self.ref_map.clear();
        assert_eq!(self.dut.stats().slots, slots);
        self.check();
    }
    fn check(&mut self) {
        self.dut.check();
        assert_eq!(self.dut.len(), self.ref_map.len());
        for (key, value) in self.dut.iter() {
            assert_eq!(self.ref_map.get(key), Some(value));
        }
    }
    fn iterator_check(&mut self) {
        assert_eq!(self.dut.iter().len(), self.ref_map.len());
        assert_eq!(self.dut.keys().count(), self.ref_map.len());
        let mut visited = 0;
        for (key, value) in self.dut.iter_mut() {
            assert_eq!(self.ref_map.get(key), Some(&*value));
            visited += 1;
        }
        assert_eq!(visited, self.ref_map.len());
    }
    fn present_or_random_key<R: Rng + SeedableRng>(
        &self,
        random_likelihood: f64,
        rng: &mut R,
        mut rand_k: impl FnMut(&mut R) -> K,
    ) -> K {
        debug_assert!(random_likelihood >= 0.0);
        if self.len() == 0 || rng.gen_range(0.0..1.0 + random_likelihood) >= 1.0 {
            rand_k(rng)
        } else {
            self.ref_map.iter().choose(rng).unwrap().0.clone()
        }
    }
}

macro_rules! weighted_choose {
    ($rng:expr, $($name:ident: $weight:expr => $body:expr),+) => {
        {
            enum Branches { $( $name,  )* }
            let weights = [$((Branches::$name, $weight)),+];
            match weights.choose_weighted($rng, |x| x.1).unwrap().0 {
                $(Branches::$name => $body),*
            }
        }
    }
}

fn test_suite<K, V, R>(
    mut rand_k: impl FnMut(&mut R) -> K,
    mut rand_v: impl FnMut(&mut R) -> V,
    retain_fn: impl Fn(&K, &mut V) -> bool,
) where
    K: Hash + Eq + Clone + Debug,
    V: Eq + Clone + Default + Debug,
    R: Rng + SeedableRng,
{
    let mut table: CheckedTable<K, V> = CheckedTable::new();
    let mut rng = R::seed_from_u64(39);
    let mut max_size = 0;
    let verbosity = 1;
    for _ in 0..5000 {
        weighted_choose! {&mut rng,
            Insert: 2.0 => {
                let k = table.present_or_random_key(6.0, &mut rng, &mut rand_k);
                let v = rand_v(&mut rng);
                let result = table.insert(k.clone(), v.clone());
                if verbosity > 0 {
                    println!("inserting {k:?}: {v:?} -> {result:?}");
                }
            },
            GetOrInsertDefault: 0.3 => {
                let k = table.present_or_random_key(1.0, &mut rng, &mut rand_k);
                let result = table.get_or_insert_default(k.clone());
                if verbosity > 0 {
                    println!("get or insert default {k:?} -> {result:?}");
                }
            },
            Get: 0.5 => {
                let k = table.present_or_random_key(1.0, &mut rng, &mut rand_k);
                let result = table.get(&k);
                if verbosity > 0 {
                    println!("getting {k:?} -> {result:?}");
                }
            },
            Remove: 0.7 => {
                let k = table.present_or_random_key(1.0, &mut rng, &mut rand_k);
                let result = table.remove(&k);
                if verbosity > 0 {
                    println!("removing {k:?} -> {result:?}");
                }
            },
            Retain: 0.05 => {
                let old_len = table.len();
                table.retain(&retain_fn);
                let new_len = table.len();
                if verbosity > 0 {
                    println!("retaining, {old_len} -> {new_len}");
                }
            },
            Clear: 0.005 => {
                table.clear();
                if verbosity > 0 {
                    println!("clearing");
                }
            },
            Check: 0.15 => {
                table.check();
            }
        };
        max_size = std::cmp::max(max_size, table.len());
    }
    table.check();
    table.iterator_check();
    println!("max size {max_size}, {}", table.dut.stats());
}

#[test]
fn test_suite_usize_usize() {
    test_suite::<usize, usize, rand_pcg::Pcg64>(
        |rng| rng.gen::<usize>() >> rng.gen_range(0..usize::BITS),
        |rng| rng.gen(),
        |k, v| {
            *v = v.wrapping_add(3);
            k % 7 < 6
        },
    );
}

#[test]
fn test_suite_string_u64() {
    test_suite::<String, u64, rand_pcg::Pcg64>(
        |rng| {
            let len = rng.gen_range(4..16);
            String::from_iter((0..len).map(|_| rng.gen_range('!'..'~')))
        },
        |rng| rng.gen(),
        |k: &String, v| {
            *v = (*v).wrapping_add(3);
            !k.contains('!')
        },
    );
}

#[test]
fn test_suite_boxed_usize_string() {
    test_suite::<Box<usize>, String, rand_pcg::Pcg64>(
        |rng| Box::new(rng.gen::<usize>() >> rng.gen_range(0..usize::BITS)),
        |rng| {
            let len = rng.gen_range(8..32);
            String::from_iter((0..len).map(|_| rng.gen_range('!'..'~')))
        },
        |k, v| {
            v.push('x');
            **k % 5 != 0
        },
    );
}

#[test]
fn test_basic() {
    let mut table: ZwoTable<String, usize> = Default::default();
    assert!(table.insert("adam".into(), 10).1);
    assert!(table.insert("eve".into(), 23).1);
    *table.get_or_insert_default("mallory".into()) += 40;
    assert_eq!(table.get("adam").copied(), Some(10));
    assert_eq!(table["mallory"], 40);
    assert_eq!(table.get_key_value("eve"), Some((&"eve".into(), &23)));
    assert!(table.contains_key("eve"));
    assert!(!table.contains_key("jim"));
    assert_eq!(table.len(), 3);
    assert_eq!(table.remove("eve"), Ok(23));
    assert_eq!(table.remove("eve"), Err(NotFoundError));
    assert_eq!(table.erase("adam"), 1);
    assert_eq!(table.erase("adam"), 0);
    assert_eq!(table.len(), 1);
    assert!(!table.is_empty());
    table.check();
}

#[test]
fn insert_keeps_existing_value() {
    let mut table: ZwoTable<&str, u32> = ZwoTable::new();
    assert_eq!(table.insert("k", 1), (&mut 1, true));
    let (stored, inserted) = table.insert("k", 2);
    assert!(!inserted);
    assert_eq!(*stored, 1);
    *stored = 5;
    assert_eq!(table["k"], 5);
    assert_eq!(table.len(), 1);

    let table: ZwoTable<u32, u32> = [(1, 10), (2, 20), (1, 30)].into_iter().collect();
    assert_eq!(table.len(), 2);
    assert_eq!(table[&1], 10);
}

#[test]
fn growth_follows_two_n_plus_one() {
    let mut table: ZwoTable<u32, u32> = ZwoTable::new();
    assert_eq!(table.num_buckets(), 1);
    assert_eq!(table.stats().slots, 1);

    let mut expected_buckets = 1;
    let mut expected_slots = 1;
    for key in 0..200 {
        if table.len() == expected_slots {
            let new_buckets = 2 * expected_buckets + 1;
            expected_slots += (((new_buckets - expected_buckets) as f64 * 0.75) as usize).max(1);
            expected_buckets = new_buckets;
        }
        table.insert(key, key * 2);
        assert_eq!(table.num_buckets(), expected_buckets);
        assert_eq!(table.stats().slots, expected_slots);
    }
    for key in 0..200 {
        assert_eq!(table.get(&key), Some(&(key * 2)));
    }
    table.check();
}

#[test]
fn removed_slots_are_reused() {
    let mut table: ZwoTable<u32, String> = ZwoTable::with_buckets(16);
    for key in 0..12 {
        table.insert(key, key.to_string());
    }
    let stats = table.stats();
    assert_eq!(stats.slots, 12);
    assert_eq!(stats.blocks, 1);

    for round in 0..100 {
        let key = round % 12;
        assert_eq!(table.remove(&key), Ok(key.to_string()));
        assert!(table.insert(key + 1000, String::new()).1);
        assert_eq!(table.erase(&(key + 1000)), 1);
        assert!(table.insert(key, key.to_string()).1);
    }
    assert_eq!(table.stats().slots, 12);
    assert_eq!(table.stats().blocks, 1);
    assert_eq!(table.num_buckets(), 16);
    table.check();
}

#[test]
fn reserve_avoids_growth() {
    let mut table: ZwoTable<u32, ()> = ZwoTable::new();
    table.reserve(100);
    let buckets = table.num_buckets();
    assert!(buckets as f64 * table.max_load() >= 100.0);
    for key in 0..100 {
        table.insert(key, ());
    }
    assert_eq!(table.num_buckets(), buckets);
    table.check();
}

#[test]
fn stats_path_length() {
    let mut table: ZwoTable<u32, ()> = ZwoTable::with_buckets_and_load(1, 8.0);
    for key in 0..4 {
        table.insert(key, ());
    }
    let stats = table.stats();
    assert_eq!(stats.buckets, 1);
    assert_eq!(stats.nonempty_buckets, 1);
    assert_eq!(stats.entries, 4);
    assert_eq!(stats.path_length, 1 + 2 + 3 + 4);
    assert_eq!(
        stats.to_string(),
        "4 entries, 1/1 buckets used, path length 10, 8 slots in 1 blocks"
    );
}

#[test]
fn reset_and_clear() {
    let mut table: ZwoTable<u32, Box<u32>> = ZwoTable::with_buckets(7);
    for key in 0..50 {
        table.insert(key, Box::new(key));
    }
    let slots = table.stats().slots;
    table.remove_all();
    assert!(table.is_empty());
    assert_eq!(table.stats().slots, slots);
    assert!(table.iter().next().is_none());
    table.check();

    table.reset();
    assert_eq!(table.num_buckets(), 1);
    assert_eq!(table.stats().slots, 1);
    assert_eq!(table.stats().blocks, 1);
    table.insert(3, Box::new(3));
    assert_eq!(table.get(&3).map(|v| **v), Some(3));
    table.check();
}

#[test]
fn unchecked_insert_allows_duplicates() {
    let mut table: ZwoTable<u32, u32> = ZwoTable::new();
    table.insert_unique_unchecked(1, 1);
    table.insert_unique_unchecked(1, 2);
    assert_eq!(table.len(), 2);
    assert!(table.remove(&1).is_ok());
    assert!(table.remove(&1).is_ok());
    assert!(table.remove(&1).is_err());
    table.check();
}

#[test]
fn values_mut_updates_all() {
    let mut table: ZwoTable<u32, u32> = (0..20).map(|key| (key, key)).collect();
    for value in table.values_mut() {
        *value += 1;
    }
    for key in 0..20 {
        assert_eq!(table[&key], key + 1);
    }
    let cloned = table.clone();
    cloned.check();
    assert_eq!(format!("{cloned:?}"), format!("{table:?}"));
}

#[test]
#[should_panic]
fn index_missing_key_panics() {
    let table: ZwoTable<u32, u32> = ZwoTable::new();
    let _ = table[&0];
}

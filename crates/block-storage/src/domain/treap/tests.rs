//! # Treap Tests

use super::*;
use proptest::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;

type ByteTreap = Treap<Vec<u8>, Vec<u8>>;

fn key(n: u32) -> Vec<u8> {
    n.to_be_bytes().to_vec()
}

/// Walk the whole arena checking order, heap and link invariants.
fn assert_invariants<K: std::fmt::Debug, V>(tree: &Treap<K, V>) {
    let mut seen = 0;
    if let Some(root) = tree.root {
        assert_eq!(tree.nodes[root].parent, None, "root has a parent");
    }
    for (i, node) in tree.nodes.iter().enumerate() {
        for child in [node.left, node.right].into_iter().flatten() {
            assert_eq!(tree.nodes[child].parent, Some(i), "broken parent link");
            assert!(
                tree.nodes[child].priority <= node.priority,
                "heap order violated"
            );
        }
        if let Some(l) = node.left {
            assert_ne!((tree.compare)(&tree.nodes[l].key, &node.key), Ordering::Greater);
        }
        if let Some(r) = node.right {
            assert_ne!((tree.compare)(&tree.nodes[r].key, &node.key), Ordering::Less);
        }
        seen += 1;
    }
    assert_eq!(seen, tree.len());

    let keys: Vec<_> = tree.iter().map(|(k, _)| k).collect();
    assert_eq!(keys.len(), tree.len(), "iteration misses nodes");
    for pair in keys.windows(2) {
        assert_ne!(
            (tree.compare)(pair[0], pair[1]),
            Ordering::Greater,
            "in-order traversal not ascending: {:?}",
            pair
        );
    }
}

#[test]
fn test_empty_tree() {
    let tree = ByteTreap::ordered();
    assert!(tree.is_empty());
    assert_eq!(tree.search(&key(1)), None);
    assert_eq!(tree.iter().count(), 0);

    let mut cursor = tree.cursor();
    cursor.seek_first();
    assert!(!cursor.valid());
}

#[test]
fn test_insert_and_search() {
    let mut tree = ByteTreap::ordered();
    for n in [5, 1, 9, 3, 7] {
        assert!(tree.insert(key(n), vec![n as u8]));
    }
    assert_eq!(tree.len(), 5);
    assert_eq!(tree.search(&key(3)), Some(&vec![3]));
    assert_eq!(tree.search(&key(4)), None);
    assert_invariants(&tree);
}

#[test]
fn test_unique_insert_overwrites_value_in_place() {
    let mut tree = ByteTreap::ordered();
    tree.insert_with_priority(key(1), b"old".to_vec(), 10);
    assert!(!tree.insert_with_priority(key(1), b"new".to_vec(), 99));

    assert_eq!(tree.len(), 1);
    assert_eq!(tree.search(&key(1)), Some(&b"new".to_vec()));
    assert_eq!(tree.nodes[0].priority, 10);
}

#[test]
fn test_non_unique_keeps_duplicates() {
    let mut tree: Treap<u32, &str> = Treap::new(u32::cmp, false);
    tree.insert(1, "a");
    tree.insert(1, "b");
    tree.insert(0, "c");
    assert_eq!(tree.len(), 3);
    assert_invariants(&tree);
}

#[test]
fn test_rotations_restore_heap_order() {
    let mut tree = ByteTreap::ordered();
    // Ascending keys with ascending priorities force a rotation per insert.
    for n in 0..32u32 {
        tree.insert_with_priority(key(n), vec![], n);
        assert_invariants(&tree);
    }
    assert_eq!(tree.root.map(|r| tree.nodes[r].key.clone()), Some(key(31)));
}

#[test]
fn test_remove() {
    let mut tree = ByteTreap::ordered();
    for n in 0..20 {
        tree.insert(key(n), vec![n as u8]);
    }

    assert_eq!(tree.remove(&key(7)), Some(vec![7]));
    assert_eq!(tree.remove(&key(7)), None);
    assert_eq!(tree.len(), 19);
    assert!(!tree.contains(&key(7)));
    assert_invariants(&tree);

    for n in 0..20 {
        tree.remove(&key(n));
        assert_invariants(&tree);
    }
    assert!(tree.is_empty());
    assert_eq!(tree.root, None);
}

#[test]
fn test_range_is_inclusive() {
    let mut tree = ByteTreap::ordered();
    for n in (0..50).step_by(5) {
        tree.insert(key(n), vec![]);
    }

    let max = key(25);
    let got: Vec<_> = tree.range(&key(10), &max).map(|(k, _)| k.clone()).collect();
    assert_eq!(got, vec![key(10), key(15), key(20), key(25)]);

    let max = key(24);
    let got: Vec<_> = tree.range(&key(11), &max).map(|(k, _)| k.clone()).collect();
    assert_eq!(got, vec![key(15), key(20)]);

    let max = key(0);
    assert_eq!(tree.range(&key(1), &max).count(), 0);
}

#[test]
fn test_cursor_seek_and_step() {
    let mut tree = ByteTreap::ordered();
    for n in [10, 20, 30] {
        tree.insert(key(n), vec![n as u8]);
    }

    let mut cursor = tree.cursor();
    cursor.seek(&key(15));
    assert_eq!(cursor.key(), Some(&key(20)));
    cursor.next();
    assert_eq!(cursor.key(), Some(&key(30)));
    cursor.next();
    assert!(!cursor.valid());

    cursor.seek_for_prev(&key(15));
    assert_eq!(cursor.key(), Some(&key(10)));
    cursor.prev();
    assert!(!cursor.valid());

    cursor.seek_for_prev(&key(30));
    assert_eq!(cursor.key(), Some(&key(30)));

    cursor.seek_last();
    assert_eq!(cursor.value(), Some(&vec![30]));
    cursor.prev();
    assert_eq!(cursor.value(), Some(&vec![20]));

    cursor.seek(&key(31));
    assert!(!cursor.valid());
}

#[test]
fn test_snapshot_is_independent() {
    let mut tree = ByteTreap::ordered();
    for n in 0..10 {
        tree.insert(key(n), vec![]);
    }

    let snapshot = tree.snapshot();
    tree.remove(&key(3));
    tree.insert(key(100), vec![]);
    tree.reset();

    assert_eq!(snapshot.len(), 10);
    assert!(snapshot.contains(&key(3)));
    assert!(!snapshot.contains(&key(100)));
    assert!(tree.is_empty());
    assert_invariants(&snapshot);
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u16, u8),
    Remove(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u16..64, any::<u8>()).prop_map(|(k, v)| Op::Insert(k, v)),
        (0u16..64).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_matches_btreemap(ops in proptest::collection::vec(op_strategy(), 0..200)) {
        let mut tree: Treap<u16, u8> = Treap::ordered();
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let created = tree.insert(k, v);
                    prop_assert_eq!(created, model.insert(k, v).is_none());
                }
                Op::Remove(k) => {
                    prop_assert_eq!(tree.remove(&k), model.remove(&k));
                }
            }
        }

        assert_invariants(&tree);
        let got: Vec<_> = tree.iter().map(|(k, v)| (*k, *v)).collect();
        let want: Vec<_> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn prop_range_returns_exactly_bounded_keys(
        keys in proptest::collection::btree_set(0u16..500, 0..100),
        a in 0u16..500,
        b in 0u16..500,
    ) {
        let (min, max) = if a <= b { (a, b) } else { (b, a) };
        let mut tree: Treap<u16, ()> = Treap::ordered();
        for k in &keys {
            tree.insert(*k, ());
        }

        let got: Vec<u16> = tree.range(&min, &max).map(|(k, _)| *k).collect();
        let want: Vec<u16> = keys.range(min..=max).copied().collect();
        prop_assert_eq!(got, want);
    }
}

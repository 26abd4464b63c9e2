//! Cursor and iterators over a borrowed treap.

use std::cmp::Ordering;

use super::Treap;

/// Bidirectional cursor.
///
/// Starts unpositioned; `seek_*` places it, `next`/`prev` move it, and it
/// becomes invalid when it walks off either end.
pub struct Cursor<'a, K, V> {
    tree: &'a Treap<K, V>,
    current: Option<usize>,
}

impl<'a, K, V> Cursor<'a, K, V> {
    pub(super) fn new(tree: &'a Treap<K, V>) -> Self {
        Self {
            tree,
            current: None,
        }
    }

    /// Position on the smallest key.
    pub fn seek_first(&mut self) {
        self.current = self.tree.first();
    }

    /// Position on the largest key.
    pub fn seek_last(&mut self) {
        self.current = self.tree.last();
    }

    /// Position on the first key >= `key`.
    pub fn seek(&mut self, key: &K) {
        self.current = self.tree.lower_bound(key);
    }

    /// Position on the last key <= `key`.
    pub fn seek_for_prev(&mut self, key: &K) {
        self.current = self.tree.upper_bound(key);
    }

    /// Step forward.
    pub fn next(&mut self) {
        self.current = self.current.and_then(|i| self.tree.successor(i));
    }

    /// Step backward.
    pub fn prev(&mut self) {
        self.current = self.current.and_then(|i| self.tree.predecessor(i));
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn key(&self) -> Option<&'a K> {
        self.entry().map(|(k, _)| k)
    }

    pub fn value(&self) -> Option<&'a V> {
        self.entry().map(|(_, v)| v)
    }

    pub fn entry(&self) -> Option<(&'a K, &'a V)> {
        let tree = self.tree;
        self.current.map(|i| tree.entry(i))
    }
}

/// Ascending iterator over every entry.
pub struct Iter<'a, K, V> {
    cursor: Cursor<'a, K, V>,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(super) fn new(cursor: Cursor<'a, K, V>) -> Self {
        Self { cursor }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.cursor.entry()?;
        self.cursor.next();
        Some(entry)
    }
}

/// Ascending iterator bounded above by an inclusive maximum.
pub struct Range<'a, K, V> {
    cursor: Cursor<'a, K, V>,
    max: &'a K,
}

impl<'a, K, V> Range<'a, K, V> {
    pub(super) fn new(cursor: Cursor<'a, K, V>, max: &'a K) -> Self {
        Self { cursor, max }
    }
}

impl<'a, K, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.cursor.entry()?;
        if (self.cursor.tree.compare)(key, self.max) == Ordering::Greater {
            self.cursor.current = None;
            return None;
        }
        self.cursor.next();
        Some((key, value))
    }
}

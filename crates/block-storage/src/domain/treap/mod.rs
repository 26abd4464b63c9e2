//! # Pending-Write Ordered Map
//!
//! A treap: binary search tree on keys, max-heap on random priorities.
//! Nodes live in an arena (`Vec<Node>`) and link to each other by index,
//! with an explicit `None` for empty children instead of a sentinel node.
//!
//! ## Invariants
//!
//! - In-order traversal yields keys ascending under the comparator
//! - A parent's priority is never lower than its children's
//! - `parent`, `left` and `right` links are mutually consistent
//!
//! Removal compacts the arena with `swap_remove`, so node indices are only
//! stable while the tree is borrowed immutably. Cursors borrow the tree for
//! exactly that reason; a caller that needs to iterate while mutating takes
//! a [`Treap::snapshot`] first.

mod cursor;
#[cfg(test)]
mod tests;

pub use cursor::{Cursor, Iter, Range};

use std::cmp::Ordering;

/// Key comparator.
pub type Comparator<K> = fn(&K, &K) -> Ordering;

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    priority: u32,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

/// Arena-backed treap.
#[derive(Debug, Clone)]
pub struct Treap<K, V> {
    nodes: Vec<Node<K, V>>,
    root: Option<usize>,
    compare: Comparator<K>,
    unique: bool,
}

impl<K: Ord, V> Treap<K, V> {
    /// Unique-key treap ordered by `K`'s natural order (bytewise for `Vec<u8>`).
    pub fn ordered() -> Self {
        Self::new(<K as Ord>::cmp, true)
    }
}

impl<K: Ord, V> Default for Treap<K, V> {
    fn default() -> Self {
        Self::ordered()
    }
}

impl<K, V> Treap<K, V> {
    /// Create an empty treap.
    ///
    /// With `unique` set, inserting an existing key overwrites its value in
    /// place; otherwise equal keys are kept side by side.
    pub fn new(compare: Comparator<K>, unique: bool) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            compare,
            unique,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every entry.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Look up the value stored under `key`.
    pub fn search(&self, key: &K) -> Option<&V> {
        self.find(key).map(|i| &self.nodes[i].value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Insert `key -> value`. Returns `true` if a new node was created,
    /// `false` if an existing value was overwritten.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.insert_with_priority(key, value, rand::random())
    }

    pub(crate) fn insert_with_priority(&mut self, key: K, value: V, priority: u32) -> bool {
        let mut parent = None;
        let mut went_left = false;
        let mut current = self.root;

        while let Some(i) = current {
            let ordering = (self.compare)(&key, &self.nodes[i].key);
            if ordering == Ordering::Equal && self.unique {
                self.nodes[i].value = value;
                return false;
            }
            parent = Some(i);
            went_left = ordering == Ordering::Less;
            current = if went_left {
                self.nodes[i].left
            } else {
                self.nodes[i].right
            };
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            key,
            value,
            priority,
            parent,
            left: None,
            right: None,
        });

        match parent {
            None => self.root = Some(index),
            Some(p) if went_left => self.nodes[p].left = Some(index),
            Some(p) => self.nodes[p].right = Some(index),
        }

        // Bubble up while the heap property is violated.
        while let Some(p) = self.nodes[index].parent {
            if self.nodes[p].priority >= self.nodes[index].priority {
                break;
            }
            if self.nodes[p].left == Some(index) {
                self.rotate_right(p);
            } else {
                self.rotate_left(p);
            }
        }

        true
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.find(key)?;

        // Rotate the node down until it has at most one child.
        loop {
            let node = &self.nodes[index];
            match (node.left, node.right) {
                (Some(l), Some(r)) => {
                    if self.nodes[l].priority > self.nodes[r].priority {
                        self.rotate_right(index);
                    } else {
                        self.rotate_left(index);
                    }
                }
                _ => break,
            }
        }

        let node = &self.nodes[index];
        let child = node.left.or(node.right);
        let parent = node.parent;
        if let Some(c) = child {
            self.nodes[c].parent = parent;
        }
        self.replace_child(parent, index, child);

        Some(self.release(index))
    }

    /// Entries with `min <= key <= max`, ascending.
    pub fn range<'a>(&'a self, min: &K, max: &'a K) -> Range<'a, K, V> {
        let mut cursor = self.cursor();
        cursor.seek(min);
        Range::new(cursor, max)
    }

    /// In-order iterator over all entries.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut cursor = self.cursor();
        cursor.seek_first();
        Iter::new(cursor)
    }

    /// Unpositioned cursor over the tree.
    pub fn cursor(&self) -> Cursor<'_, K, V> {
        Cursor::new(self)
    }

    pub fn comparator(&self) -> Comparator<K> {
        self.compare
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    fn find(&self, key: &K) -> Option<usize> {
        let mut current = self.root;
        while let Some(i) = current {
            current = match (self.compare)(key, &self.nodes[i].key) {
                Ordering::Less => self.nodes[i].left,
                Ordering::Greater => self.nodes[i].right,
                Ordering::Equal => return Some(i),
            };
        }
        None
    }

    /// First node with key >= `key`.
    fn lower_bound(&self, key: &K) -> Option<usize> {
        let mut best = None;
        let mut current = self.root;
        while let Some(i) = current {
            if (self.compare)(&self.nodes[i].key, key) == Ordering::Less {
                current = self.nodes[i].right;
            } else {
                best = Some(i);
                current = self.nodes[i].left;
            }
        }
        best
    }

    /// Last node with key <= `key`.
    fn upper_bound(&self, key: &K) -> Option<usize> {
        let mut best = None;
        let mut current = self.root;
        while let Some(i) = current {
            if (self.compare)(&self.nodes[i].key, key) == Ordering::Greater {
                current = self.nodes[i].left;
            } else {
                best = Some(i);
                current = self.nodes[i].right;
            }
        }
        best
    }

    fn min_from(&self, mut i: usize) -> usize {
        while let Some(l) = self.nodes[i].left {
            i = l;
        }
        i
    }

    fn max_from(&self, mut i: usize) -> usize {
        while let Some(r) = self.nodes[i].right {
            i = r;
        }
        i
    }

    fn first(&self) -> Option<usize> {
        self.root.map(|r| self.min_from(r))
    }

    fn last(&self) -> Option<usize> {
        self.root.map(|r| self.max_from(r))
    }

    fn successor(&self, i: usize) -> Option<usize> {
        if let Some(r) = self.nodes[i].right {
            return Some(self.min_from(r));
        }
        let mut child = i;
        let mut parent = self.nodes[i].parent;
        while let Some(p) = parent {
            if self.nodes[p].right != Some(child) {
                break;
            }
            child = p;
            parent = self.nodes[p].parent;
        }
        parent
    }

    fn predecessor(&self, i: usize) -> Option<usize> {
        if let Some(l) = self.nodes[i].left {
            return Some(self.max_from(l));
        }
        let mut child = i;
        let mut parent = self.nodes[i].parent;
        while let Some(p) = parent {
            if self.nodes[p].left != Some(child) {
                break;
            }
            child = p;
            parent = self.nodes[p].parent;
        }
        parent
    }

    fn entry(&self, i: usize) -> (&K, &V) {
        let node = &self.nodes[i];
        (&node.key, &node.value)
    }

    // =========================================================================
    // STRUCTURE
    // =========================================================================

    /// Point `parent`'s link to `old` at `new` (or the root, if no parent).
    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: Option<usize>) {
        match parent {
            None => self.root = new,
            Some(p) if self.nodes[p].left == Some(old) => self.nodes[p].left = new,
            Some(p) => self.nodes[p].right = new,
        }
    }

    ///   x            y
    ///  / \          / \
    /// a   y   =>   x   c
    ///    / \      / \
    ///   b   c    a   b
    fn rotate_left(&mut self, x: usize) {
        let Some(y) = self.nodes[x].right else {
            return;
        };
        let parent = self.nodes[x].parent;
        let b = self.nodes[y].left;

        self.nodes[x].right = b;
        if let Some(b) = b {
            self.nodes[b].parent = Some(x);
        }
        self.nodes[y].left = Some(x);
        self.nodes[x].parent = Some(y);
        self.nodes[y].parent = parent;
        self.replace_child(parent, x, Some(y));
    }

    /// ```text
    ///     x          y
    ///    / \        / \
    ///   y   c  =>  a   x
    ///  / \            / \
    /// a   b          b   c
    /// ```
    fn rotate_right(&mut self, x: usize) {
        let Some(y) = self.nodes[x].left else {
            return;
        };
        let parent = self.nodes[x].parent;
        let b = self.nodes[y].right;

        self.nodes[x].left = b;
        if let Some(b) = b {
            self.nodes[b].parent = Some(x);
        }
        self.nodes[y].right = Some(x);
        self.nodes[x].parent = Some(y);
        self.nodes[y].parent = parent;
        self.replace_child(parent, x, Some(y));
    }

    /// Remove an unlinked node from the arena, moving the last node into
    /// its slot and repointing that node's neighbours.
    fn release(&mut self, index: usize) -> V {
        let last = self.nodes.len() - 1;
        let removed = self.nodes.swap_remove(index);

        if index != last {
            let moved = &self.nodes[index];
            let (parent, left, right) = (moved.parent, moved.left, moved.right);
            match parent {
                None => self.root = Some(index),
                Some(p) if self.nodes[p].left == Some(last) => self.nodes[p].left = Some(index),
                Some(p) => self.nodes[p].right = Some(index),
            }
            if let Some(l) = left {
                self.nodes[l].parent = Some(index);
            }
            if let Some(r) = right {
                self.nodes[r].parent = Some(index);
            }
        }

        removed.value
    }
}

impl<K: Clone, V: Clone> Treap<K, V> {
    /// Structurally independent copy for iterating while the live tree
    /// keeps changing.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}

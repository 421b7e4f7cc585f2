//! Recursive sorted-array index nodes
//!
//! A node holds strictly increasing `keys` and a parallel `children` array.
//! Each child is either a leaf of records sharing the full key tuple, or a
//! nested node over the remaining key fields. Empty children are pruned.

use std::cmp::Ordering;

use super::key::IndexKey;
use super::range::RangeOptions;
use crate::record::Record;

/// A record stored in a leaf, with its tie-break key.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) hash: IndexKey,
    pub(crate) record: Record,
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.record.ptr_eq(&other.record)
    }
}

/// Child of a node at one key position
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Child {
    /// Records sharing the full key tuple, sorted by hash
    Leaf(Vec<Slot>),
    /// Nested node over the remaining fields
    Inner(Node),
}

impl Child {
    fn is_empty(&self) -> bool {
        match self {
            Child::Leaf(slots) => slots.is_empty(),
            Child::Inner(node) => node.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Node {
    keys: Vec<IndexKey>,
    children: Vec<Child>,
}

impl Node {
    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of distinct keys at this level
    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Inserts a slot at the given key path.
    ///
    /// Returns false if a slot with the same hash already sits at the path.
    pub(crate) fn set(&mut self, path: &[IndexKey], slot: Slot) -> bool {
        let Some((key, rest)) = path.split_first() else {
            return false;
        };

        match self.keys.binary_search(key) {
            Ok(i) => match &mut self.children[i] {
                Child::Leaf(slots) => match slots.binary_search_by(|s| s.hash.cmp(&slot.hash)) {
                    Ok(_) => false,
                    Err(pos) => {
                        slots.insert(pos, slot);
                        true
                    }
                },
                Child::Inner(node) => node.set(rest, slot),
            },
            Err(i) => {
                let child = if rest.is_empty() {
                    Child::Leaf(vec![slot])
                } else {
                    let mut node = Node::default();
                    node.set(rest, slot);
                    Child::Inner(node)
                };
                self.keys.insert(i, key.clone());
                self.children.insert(i, child);
                true
            }
        }
    }

    /// Removes the slot with `hash` stored under `path`, pruning empty nodes.
    pub(crate) fn remove(&mut self, path: &[IndexKey], hash: &IndexKey) -> Option<Record> {
        let (key, rest) = path.split_first()?;
        let i = self.keys.binary_search(key).ok()?;

        let removed = match &mut self.children[i] {
            Child::Leaf(slots) => {
                let pos = slots.binary_search_by(|s| s.hash.cmp(hash)).ok()?;
                slots.remove(pos).record
            }
            Child::Inner(node) => node.remove(rest, hash)?,
        };

        if self.children[i].is_empty() {
            self.keys.remove(i);
            self.children.remove(i);
        }
        Some(removed)
    }

    /// Exact or prefix lookup. An empty path returns every record.
    pub(crate) fn get(&self, path: &[IndexKey]) -> Vec<Record> {
        let Some((key, rest)) = path.split_first() else {
            return self.records().cloned().collect();
        };

        match self.keys.binary_search(key) {
            Ok(i) => match &self.children[i] {
                Child::Leaf(slots) => slots.iter().map(|s| s.record.clone()).collect(),
                Child::Inner(node) => node.get(rest),
            },
            Err(_) => Vec::new(),
        }
    }

    /// Collects records between two bound tuples.
    ///
    /// An empty bound is open. Collection stops once `cap` records are held.
    pub(crate) fn between(
        &self,
        left: &[IndexKey],
        right: &[IndexKey],
        opts: &RangeOptions,
        cap: Option<usize>,
        out: &mut Vec<Record>,
    ) {
        let open: &[IndexKey] = &[];
        let left_key = left.first();
        let right_key = right.first();

        let start = match left_key {
            Some(k) => match self.keys.binary_search(k) {
                Ok(i) | Err(i) => i,
            },
            None => 0,
        };

        for i in start..self.keys.len() {
            let key = &self.keys[i];

            let on_right = match right_key.map(|rk| key.cmp(rk)) {
                Some(Ordering::Greater) => break,
                Some(Ordering::Equal) => true,
                _ => false,
            };
            let on_left = left_key == Some(key);

            if on_right && right.len() == 1 && !opts.right_inclusive {
                break;
            }
            if on_left && left.len() == 1 && !opts.left_inclusive {
                continue;
            }

            let sub_left = if on_left { &left[1..] } else { open };
            let sub_right = if on_right { &right[1..] } else { open };

            match &self.children[i] {
                Child::Leaf(slots) => out.extend(slots.iter().map(|s| s.record.clone())),
                Child::Inner(node) if sub_left.is_empty() && sub_right.is_empty() => {
                    out.extend(node.records().cloned());
                }
                Child::Inner(node) => node.between(sub_left, sub_right, opts, cap, out),
            }

            if cap.is_some_and(|c| out.len() >= c) {
                break;
            }
        }
    }

    /// Records of the left-most leaf
    pub(crate) fn peek(&self) -> Vec<Record> {
        match self.children.first() {
            Some(Child::Leaf(slots)) => slots.iter().map(|s| s.record.clone()).collect(),
            Some(Child::Inner(node)) => node.peek(),
            None => Vec::new(),
        }
    }

    /// Lazy depth-first iterator over every record, in key order
    pub(crate) fn records(&self) -> Records<'_> {
        Records {
            stack: vec![self.children.iter()],
            leaf: <&[Slot]>::default().iter(),
        }
    }
}

/// Depth-first, left-to-right iterator over the records under a node.
pub struct Records<'a> {
    stack: Vec<std::slice::Iter<'a, Child>>,
    leaf: std::slice::Iter<'a, Slot>,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slot) = self.leaf.next() {
                return Some(&slot.record);
            }
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(Child::Leaf(slots)) => self.leaf = slots.iter(),
                Some(Child::Inner(node)) => self.stack.push(node.children.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

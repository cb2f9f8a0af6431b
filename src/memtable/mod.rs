//! # In-memory ordered map (C2)
//!
//! The mem-table is a self-balancing AVL tree holding at most one
//! record per key. Deletes never remove a node — they flip the
//! record's tombstone flag in place, so a delete-then-scan still sees
//! the key until the record is dropped by compaction.
//!
//! Grounded on `examples/original_source/anura/btree.py`'s `AVLTree`:
//! the same rotation rules and `|balance| <= 1` invariant, but without
//! `btree.py`'s explicit `parent` back-pointer. Rebalancing instead
//! happens on the way back up a recursive insert, which is the
//! idiomatic safe-Rust shape for an owned `Box<Node>` tree.

#[cfg(test)]
mod tests;

use std::cmp::Ordering;

use thiserror::Error;
use tracing::trace;

use crate::codec::{RecordSchema, Value};

#[derive(Debug, Error)]
pub enum MemtableError {
    #[error("codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),
}

type Result<T> = std::result::Result<T, MemtableError>;

/// One stored record: a value plus a tombstone flag. Tombstoned
/// entries still occupy their node — only a full compaction drops
/// them.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    tombstone: bool,
}

struct Node {
    key: Value,
    entry: Entry,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
    /// height(right subtree) - height(left subtree), per `btree.py`'s
    /// `Node.balance` field.
    balance: i8,
    height: i32,
}

impl Node {
    fn leaf(key: Value, entry: Entry) -> Box<Node> {
        Box::new(Node {
            key,
            entry,
            left: None,
            right: None,
            balance: 0,
            height: 1,
        })
    }

    fn height(node: &Option<Box<Node>>) -> i32 {
        node.as_ref().map_or(0, |n| n.height)
    }

    fn recompute(&mut self) {
        let lh = Node::height(&self.left);
        let rh = Node::height(&self.right);
        self.height = 1 + lh.max(rh);
        self.balance = (rh - lh) as i8;
    }
}

/// Rotates the subtree root left: `node.right` becomes the new root.
/// Mirrors `btree.py::rotate_left` without the parent-pointer fixups
/// (the caller holds the `Box` that used to point at `node`, and
/// simply replaces it with the return value).
fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let mut new_root = node.right.take().expect("rotate_left requires a right child");
    node.right = new_root.left.take();
    node.recompute();
    new_root.left = Some(node);
    new_root.recompute();
    new_root
}

fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let mut new_root = node.left.take().expect("rotate_right requires a left child");
    node.left = new_root.right.take();
    node.recompute();
    new_root.right = Some(node);
    new_root.recompute();
    new_root
}

/// Rebalances a subtree root whose children are already balanced,
/// applying the same four rotation cases as `btree.py::balance`
/// (left-left, left-right, right-right, right-left).
fn rebalance(mut node: Box<Node>) -> Box<Node> {
    node.recompute();
    if node.balance < -1 {
        let left = node.left.as_ref().unwrap();
        if left.balance > 0 {
            let left = node.left.take().unwrap();
            node.left = Some(rotate_left(left));
        }
        node = rotate_right(node);
    } else if node.balance > 1 {
        let right = node.right.as_ref().unwrap();
        if right.balance < 0 {
            let right = node.right.take().unwrap();
            node.right = Some(rotate_right(right));
        }
        node = rotate_left(node);
    }
    node
}

fn insert_into(node: Option<Box<Node>>, key: Value, value: Value, tombstone: bool) -> Box<Node> {
    let mut node = match node {
        None => return Node::leaf(key, Entry { value, tombstone }),
        Some(n) => n,
    };
    match key.cmp_typed(&node.key) {
        Ordering::Equal => {
            node.entry = Entry { value, tombstone };
            return node;
        }
        Ordering::Less => {
            node.left = Some(insert_into(node.left.take(), key, value, tombstone));
        }
        Ordering::Greater => {
            node.right = Some(insert_into(node.right.take(), key, value, tombstone));
        }
    }
    rebalance(node)
}

fn find<'a>(node: &'a Option<Box<Node>>, key: &Value) -> Option<&'a Entry> {
    let mut current = node.as_ref();
    while let Some(n) = current {
        match key.cmp_typed(&n.key) {
            Ordering::Equal => return Some(&n.entry),
            Ordering::Less => current = n.left.as_ref(),
            Ordering::Greater => current = n.right.as_ref(),
        }
    }
    None
}

fn inorder<'a>(node: &'a Option<Box<Node>>, out: &mut Vec<(&'a Value, &'a Entry)>) {
    if let Some(n) = node {
        inorder(&n.left, out);
        out.push((&n.key, &n.entry));
        inorder(&n.right, out);
    }
}

/// A self-balancing AVL tree, unaware of the codec schema — keys are
/// compared with [`crate::codec::Value::cmp_typed`].
pub struct AvlTree {
    root: Option<Box<Node>>,
    len: usize,
}

impl AvlTree {
    pub fn new() -> Self {
        AvlTree { root: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts or overwrites the record for `key`. Matches `btree.py`'s
    /// `AVLTree.insert`: update-in-place if the key exists, otherwise
    /// insert-and-rebalance.
    pub fn put(&mut self, key: Value, value: Value) {
        let existed = find(&self.root, &key).is_some();
        self.root = Some(insert_into(self.root.take(), key, value, false));
        if !existed {
            self.len += 1;
        }
    }

    /// Flips the tombstone flag for `key` in place. Inserts a
    /// tombstone node if the key was never written, so a `delete` on
    /// an absent key is still observable by a later `scan`.
    pub fn delete(&mut self, key: Value, placeholder_value: Value) {
        let existed = find(&self.root, &key).is_some();
        self.root = Some(insert_into(self.root.take(), key, placeholder_value, true));
        if !existed {
            self.len += 1;
        }
    }

    /// Returns `None` if the key was never written; `Some((value,
    /// tombstone))` otherwise — the caller distinguishes "absent" from
    /// "present but deleted".
    pub fn get(&self, key: &Value) -> Option<(&Value, bool)> {
        find(&self.root, key).map(|e| (&e.value, e.tombstone))
    }

    /// In-order traversal: `(key, value, tombstone)` triples, matching
    /// `btree.py::inorder_traversal`'s iterative shape translated to
    /// recursion (the tree depth here is bounded by `log2(n)` thanks
    /// to the AVL invariant, so recursion is safe).
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value, bool)> {
        let mut out = Vec::with_capacity(self.len);
        inorder(&self.root, &mut out);
        out.into_iter().map(|(k, e)| (k, &e.value, e.tombstone))
    }
}

impl Default for AvlTree {
    fn default() -> Self {
        AvlTree::new()
    }
}

/// The mem-table proper: an [`AvlTree`] plus an approximate byte-size
/// counter used by the engine to decide when to flush.
pub struct Memtable {
    tree: AvlTree,
    approximate_size: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Memtable {
            tree: AvlTree::new(),
            approximate_size: 0,
        }
    }

    pub fn approximate_size(&self) -> usize {
        self.approximate_size
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn record_size(schema: &RecordSchema, key: &Value, value: &Value) -> Result<usize> {
        let mut buf = Vec::new();
        key.encode(&schema.key_type, &mut buf)
            .map_err(MemtableError::Codec)?;
        value
            .encode(&schema.value_type, &mut buf)
            .map_err(MemtableError::Codec)?;
        Ok(buf.len() + 1) // + tombstone byte
    }

    pub fn put(&mut self, schema: &RecordSchema, key: Value, value: Value) -> Result<()> {
        trace!("memtable put");
        self.approximate_size += Self::record_size(schema, &key, &value)?;
        self.tree.put(key, value);
        Ok(())
    }

    pub fn delete(&mut self, schema: &RecordSchema, key: Value) -> Result<()> {
        trace!("memtable delete");
        let placeholder = default_value(&schema.value_type);
        self.approximate_size += Self::record_size(schema, &key, &placeholder)?;
        self.tree.delete(key, placeholder);
        Ok(())
    }

    pub fn get(&self, key: &Value) -> Option<(&Value, bool)> {
        self.tree.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value, bool)> {
        self.tree.iter()
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Memtable::new()
    }
}

/// A zero/empty value of the given type, used only to size and fill a
/// tombstone entry where no real value was supplied.
fn default_value(ty: &crate::codec::FieldType) -> Value {
    use crate::codec::FieldType;
    match ty {
        FieldType::Short => Value::Short(0),
        FieldType::Int => Value::Int(0),
        FieldType::Long => Value::Long(0),
        FieldType::Float => Value::Float(0.0),
        FieldType::Double => Value::Double(0.0),
        FieldType::Bool => Value::Bool(false),
        FieldType::UnsignedShort => Value::UnsignedShort(0),
        FieldType::UnsignedInt => Value::UnsignedInt(0),
        FieldType::UnsignedLong => Value::UnsignedLong(0),
        FieldType::Varchar { .. } => Value::Varchar(String::new()),
        FieldType::Array { .. } => Value::Array(Vec::new()),
        FieldType::Struct { fields } => {
            Value::Struct(fields.iter().map(|(n, t)| (n.clone(), default_value(t))).collect())
        }
    }
}

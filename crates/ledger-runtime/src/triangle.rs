//! Triangle Nodes - the recursive ternary ledger tree
//!
//! Every node is both a container of transactions and a commitment over its
//! children. A node is either a leaf or fully subdivided into exactly three
//! children; `Option<Box<[TriangleNode; 3]>>` makes partial subdivision
//! unrepresentable.

use crate::{error::SnapshotError, Transaction};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

const NODE_HASH_CONTEXT: &str = "fractal-ledger 2026-01-05 triangle node";

/// Number of children of a subdivided node
pub const FANOUT: usize = 3;

/// Deepest level whose indices fit in a `u64` (3^40 < 2^64)
pub const MAX_LEVEL: u32 = 40;

/// Position of a node: depth from the root and index among its level.
///
/// Children of `(l, i)` are `(l + 1, 3i)`, `(l + 1, 3i + 1)` and
/// `(l + 1, 3i + 2)`, so a coordinate names at most one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeCoord {
    pub level: u32,
    pub index: u64,
}

impl NodeCoord {
    pub const ROOT: NodeCoord = NodeCoord { level: 0, index: 0 };

    pub fn new(level: u32, index: u64) -> Self {
        Self { level, index }
    }

    /// Coordinate of child `slot` (0..3), or `None` past [`MAX_LEVEL`] or
    /// when the index does not fit.
    pub fn child(self, slot: usize) -> Option<Self> {
        if slot >= FANOUT || self.level >= MAX_LEVEL {
            return None;
        }
        let index = self
            .index
            .checked_mul(FANOUT as u64)?
            .checked_add(slot as u64)?;
        Some(Self {
            level: self.level + 1,
            index,
        })
    }

    /// Child slots leading from the root to this coordinate, or `None` if
    /// the index is out of range for the level.
    pub fn path(self) -> Option<Vec<usize>> {
        let width = (FANOUT as u64).checked_pow(self.level)?;
        if self.index >= width {
            return None;
        }
        let mut slots = Vec::with_capacity(self.level as usize);
        let mut index = self.index;
        for _ in 0..self.level {
            slots.push((index % FANOUT as u64) as usize);
            index /= FANOUT as u64;
        }
        slots.reverse();
        Some(slots)
    }
}

impl fmt::Display for NodeCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.level, self.index)
    }
}

/// Routing digest of a transaction.
///
/// At an internal node of level `l` the transaction descends into child
/// `digest[l mod 32] mod 3`. The digest depends only on the transaction id,
/// so placement is a pure function of the tree shape and the transaction.
#[derive(Debug, Clone, Copy)]
pub struct Route([u8; 32]);

impl Route {
    pub fn for_transaction(tx: &Transaction) -> Self {
        Self(*blake3::hash(tx.id.as_bytes()).as_bytes())
    }

    pub fn slot(&self, level: u32) -> usize {
        (self.0[level as usize % self.0.len()] % FANOUT as u8) as usize
    }
}

/// Where an insertion landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Node that now holds the transaction
    pub node: NodeCoord,
    /// Leaf that subdivided to make room, if any
    pub subdivided: Option<NodeCoord>,
}

/// A node of the ledger tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriangleNode {
    coord: NodeCoord,
    transactions: Vec<Arc<Transaction>>,
    hash: blake3::Hash,
    children: Option<Box<[TriangleNode; FANOUT]>>,
}

impl TriangleNode {
    /// Create an empty leaf with a correct hash
    pub fn new(coord: NodeCoord) -> Self {
        let mut node = Self {
            coord,
            transactions: Vec::new(),
            hash: blake3::Hash::from([0u8; 32]),
            children: None,
        };
        node.rehash();
        node
    }

    pub fn root() -> Self {
        Self::new(NodeCoord::ROOT)
    }

    /// Assemble a node from stored parts without recomputing its hash.
    /// Used by snapshot import so that verification can surface tampering.
    pub(crate) fn from_parts(
        coord: NodeCoord,
        transactions: Vec<Arc<Transaction>>,
        hash: blake3::Hash,
        children: Option<Box<[TriangleNode; FANOUT]>>,
    ) -> Self {
        Self {
            coord,
            transactions,
            hash,
            children,
        }
    }

    pub fn coord(&self) -> NodeCoord {
        self.coord
    }

    pub fn level(&self) -> u32 {
        self.coord.level
    }

    pub fn index(&self) -> u64 {
        self.coord.index
    }

    /// Stored hash
    pub fn hash(&self) -> blake3::Hash {
        self.hash
    }

    /// Transactions held directly by this node
    pub fn transactions(&self) -> &[Arc<Transaction>] {
        &self.transactions
    }

    /// Children (empty for a leaf)
    pub fn children(&self) -> &[TriangleNode] {
        match &self.children {
            Some(children) => children.as_slice(),
            None => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Digest of the node's current transactions and its children's stored
    /// hashes.
    pub fn compute_hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_derive_key(NODE_HASH_CONTEXT);
        hasher.update(&self.coord.level.to_le_bytes());
        hasher.update(&self.coord.index.to_le_bytes());

        hasher.update(&(self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            hasher.update(&tx.digest());
        }

        let children = self.children();
        hasher.update(&(children.len() as u64).to_le_bytes());
        for child in children {
            hasher.update(child.hash.as_bytes());
        }

        hasher.finalize()
    }

    fn rehash(&mut self) {
        self.hash = self.compute_hash();
    }

    /// Split a leaf into three empty children. The node keeps its own
    /// transactions. Returns false, leaving the node a leaf, at
    /// [`MAX_LEVEL`].
    pub(crate) fn subdivide(&mut self) -> bool {
        debug_assert!(self.is_leaf(), "subdivide called on internal node {}", self.coord);
        let coord = self.coord;
        let (Some(a), Some(b), Some(c)) = (coord.child(0), coord.child(1), coord.child(2)) else {
            return false;
        };
        self.children = Some(Box::new([a, b, c].map(TriangleNode::new)));
        self.rehash();
        true
    }

    /// Level of the node `tx` would land in, counting a subdivision of a
    /// full leaf.
    pub(crate) fn landing_level(&self, route: &Route, capacity: usize) -> u32 {
        match &self.children {
            Some(children) => children[route.slot(self.coord.level)].landing_level(route, capacity),
            None if self.transactions.len() < capacity => self.coord.level,
            None => self.coord.level + 1,
        }
    }

    /// Route `tx` down to a leaf and append it there, subdividing the leaf
    /// first if it is full. Every node on the path is rehashed after its
    /// child, so the root hash is current when this returns.
    ///
    /// A full leaf at [`MAX_LEVEL`] cannot split; the engine rejects any
    /// transaction whose [`landing_level`](Self::landing_level) is past it.
    pub(crate) fn insert(&mut self, tx: Arc<Transaction>, route: &Route, capacity: usize) -> Placement {
        let mut subdivided = None;
        if self.is_leaf() && self.transactions.len() >= capacity && self.subdivide() {
            subdivided = Some(self.coord);
        }

        let mut placement = match self.children.as_mut() {
            Some(children) => children[route.slot(self.coord.level)].insert(tx, route, capacity),
            None => {
                self.transactions.push(tx);
                Placement {
                    node: self.coord,
                    subdivided: None,
                }
            }
        };
        placement.subdivided = subdivided.or(placement.subdivided);
        self.rehash();
        placement
    }

    /// Take the stored hashes of `other`, which must have the same layout:
    /// same coordinates, same shape, same transaction ids in every node.
    pub(crate) fn adopt_stored_hashes(&mut self, other: &TriangleNode) -> Result<(), SnapshotError> {
        let same_transactions = self
            .transactions
            .iter()
            .map(|tx| &tx.id)
            .eq(other.transactions.iter().map(|tx| &tx.id));
        if self.coord != other.coord || !same_transactions || self.is_leaf() != other.is_leaf() {
            return Err(SnapshotError::Layout {
                level: other.coord.level,
                index: other.coord.index,
            });
        }
        if let (Some(mine), Some(theirs)) = (self.children.as_mut(), other.children.as_ref()) {
            for (child, stored) in mine.iter_mut().zip(theirs.iter()) {
                child.adopt_stored_hashes(stored)?;
            }
        }
        self.hash = other.hash;
        Ok(())
    }

    /// Post-order check of every stored hash. Returns the first node whose
    /// stored hash differs from its recomputation.
    pub fn first_mismatch(&self) -> Option<NodeCoord> {
        for child in self.children() {
            if let Some(coord) = child.first_mismatch() {
                return Some(coord);
            }
        }
        (self.compute_hash() != self.hash).then_some(self.coord)
    }

    /// Find a node by coordinate
    pub fn find(&self, coord: NodeCoord) -> Option<&TriangleNode> {
        if coord.level < self.coord.level {
            return None;
        }
        let depth = coord.level - self.coord.level;
        let offset = self
            .coord
            .index
            .checked_mul((FANOUT as u64).checked_pow(depth)?)?;
        let relative = NodeCoord::new(depth, coord.index.checked_sub(offset)?);
        let mut node = self;
        for slot in relative.path()? {
            node = node.children().get(slot)?;
        }
        (node.coord == coord).then_some(node)
    }

    /// Find a node by absolute coordinate; call on the root
    pub(crate) fn find_mut(&mut self, coord: NodeCoord) -> Option<&mut TriangleNode> {
        let mut node = self;
        for slot in coord.path()? {
            node = node.children.as_mut()?.get_mut(slot)?;
        }
        (node.coord == coord).then_some(node)
    }

    /// Replace the stored hash without recomputing it
    pub(crate) fn overwrite_hash(&mut self, hash: blake3::Hash) {
        self.hash = hash;
    }

    /// Visit every node in pre-order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TriangleNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Total number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(TriangleNode::node_count).sum::<usize>()
    }

    /// Total number of transactions in this subtree
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
            + self
                .children()
                .iter()
                .map(TriangleNode::transaction_count)
                .sum::<usize>()
    }

    /// Deepest level present in this subtree
    pub fn max_level(&self) -> u32 {
        self.children()
            .iter()
            .map(TriangleNode::max_level)
            .max()
            .unwrap_or(self.coord.level)
    }
}

//! Ledger snapshots
//!
//! The serializable form of the tree, used by the `ledger` endpoint and by
//! export/import. Import replays the history and keeps stored hashes
//! verbatim: a snapshot whose hashes were edited imports fine and then
//! fails verification at the edited node, while one whose transactions
//! were edited is rejected.

use crate::{
    error::SnapshotError,
    triangle::{NodeCoord, TriangleNode, FANOUT},
    Transaction,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Current snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// One node of a serialized tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub level: u32,
    pub index: u64,
    /// Hex-encoded stored hash
    pub hash: String,
    pub transactions: Vec<Transaction>,
    pub children: Vec<NodeSnapshot>,
}

impl From<&TriangleNode> for NodeSnapshot {
    fn from(node: &TriangleNode) -> Self {
        Self {
            level: node.level(),
            index: node.index(),
            hash: node.hash().to_hex().to_string(),
            transactions: node.transactions().iter().map(|tx| (**tx).clone()).collect(),
            children: node.children().iter().map(NodeSnapshot::from).collect(),
        }
    }
}

impl NodeSnapshot {
    pub fn coord(&self) -> NodeCoord {
        NodeCoord::new(self.level, self.index)
    }

    /// Rebuild the node expected at `expected`, checking shape and capacity
    pub fn into_node(self, expected: NodeCoord, capacity: usize) -> Result<TriangleNode, SnapshotError> {
        let coord = self.coord();
        if coord != expected {
            return Err(SnapshotError::Coordinate {
                level: coord.level,
                index: coord.index,
                expected_level: expected.level,
                expected_index: expected.index,
            });
        }
        if self.transactions.len() > capacity {
            return Err(SnapshotError::OverCapacity {
                level: coord.level,
                index: coord.index,
                count: self.transactions.len(),
                capacity,
            });
        }
        let hash = blake3::Hash::from_hex(&self.hash).map_err(|_| SnapshotError::MalformedHash {
            level: coord.level,
            index: coord.index,
        })?;

        let children = match self.children.len() {
            0 => None,
            FANOUT => {
                let mut nodes = Vec::with_capacity(FANOUT);
                for (slot, child) in self.children.into_iter().enumerate() {
                    let expected = coord.child(slot).ok_or(SnapshotError::TooDeep {
                        level: coord.level,
                        index: coord.index,
                    })?;
                    nodes.push(child.into_node(expected, capacity)?);
                }
                let nodes: [TriangleNode; FANOUT] = nodes
                    .try_into()
                    .map_err(|_| SnapshotError::ChildCount {
                        level: coord.level,
                        index: coord.index,
                        count: FANOUT,
                    })?;
                Some(Box::new(nodes))
            }
            count => {
                return Err(SnapshotError::ChildCount {
                    level: coord.level,
                    index: coord.index,
                    count,
                })
            }
        };

        let transactions = self.transactions.into_iter().map(Arc::new).collect();
        Ok(TriangleNode::from_parts(coord, transactions, hash, children))
    }
}

/// A whole ledger: tree plus the facts needed to keep using it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub capacity: usize,
    /// Base58 key that signs mint transactions
    pub mint_authority: String,
    pub foundational_wallet: Option<String>,
    pub root: NodeSnapshot,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

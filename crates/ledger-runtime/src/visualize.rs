//! ASCII rendering of the ledger tree

use crate::snapshot::NodeSnapshot;
use std::fmt::Write;

/// Hex characters of each hash to show
const SHORT_HASH_LEN: usize = 12;

/// Render one line per node, children indented under their parent:
///
/// ```text
/// ▲ (0, 0) 3f2a9c01b7de txs=0
/// ├── ▲ (1, 0) 9b1c22e0aa41 txs=2
/// ```
pub fn render_tree(root: &NodeSnapshot) -> String {
    let mut out = String::new();
    render_node(root, "", None, &mut out);
    out
}

fn render_node(node: &NodeSnapshot, prefix: &str, is_last: Option<bool>, out: &mut String) {
    let (branch, child_prefix) = match is_last {
        None => (String::new(), String::new()),
        Some(true) => (format!("{}└── ", prefix), format!("{}    ", prefix)),
        Some(false) => (format!("{}├── ", prefix), format!("{}│   ", prefix)),
    };
    let short_hash: String = node.hash.chars().take(SHORT_HASH_LEN).collect();
    let _ = writeln!(
        out,
        "{}▲ ({}, {}) {} txs={}",
        branch,
        node.level,
        node.index,
        short_hash,
        node.transactions.len()
    );

    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        render_node(child, &child_prefix, Some(i + 1 == count), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triangle::TriangleNode;

    #[test]
    fn test_render_subdivided_root() {
        let mut root = TriangleNode::root();
        root.subdivide();
        let rendered = render_tree(&NodeSnapshot::from(&root));

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("▲ (0, 0) "));
        assert!(lines[1].starts_with("├── ▲ (1, 0) "));
        assert!(lines[3].starts_with("└── ▲ (1, 2) "));
        assert!(lines[3].ends_with("txs=0"));
    }
}

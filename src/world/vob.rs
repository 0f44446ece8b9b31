//! Flattening of the placed-object tree.

use super::input::VobNode;

/// Every node of the tree in pre-order, children in declaration order.
pub fn flatten(roots: &[VobNode]) -> Vec<&VobNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&VobNode> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(node.children.iter().rev());
    }
    out
}

/// Nodes that place a visual, in `flatten` order
pub fn placed_visuals(roots: &[VobNode]) -> Vec<(&VobNode, &str)> {
    flatten(roots)
        .into_iter()
        .filter_map(|node| node.visual.as_deref().map(|visual| (node, visual)))
        .collect()
}

use std::borrow::Cow;

use crate::forest::Forest;
use crate::node::TreeNode;

/// Display-only view of the forest restricted to nodes matching `query`.
///
/// A blank query returns the forest itself, borrowed. Otherwise a node is
/// kept when its name contains the query (case-insensitive) or when any of
/// its descendants is kept. Nodes kept because of a descendant are forced
/// open; nodes kept only for their own name keep their `expanded` flag.
///
/// The result must never be written back as the canonical forest.
pub fn filter_forest<'a>(forest: &'a Forest, query: &str) -> Cow<'a, Forest> {
    let query = query.trim();
    if query.is_empty() {
        return Cow::Borrowed(forest);
    }

    let needle = query.to_lowercase();
    let roots = forest
        .roots()
        .iter()
        .filter_map(|node| filter_node(node, &needle))
        .collect();

    Cow::Owned(Forest::new(roots))
}

/// Number of nodes whose own name matches `query`.
pub fn match_count(forest: &Forest, query: &str) -> usize {
    let query = query.trim();
    if query.is_empty() {
        return 0;
    }

    let needle = query.to_lowercase();
    let mut count = 0;
    forest.walk(&mut |node| {
        if name_matches(node, &needle) {
            count += 1;
        }
    });
    count
}

fn name_matches(node: &TreeNode, needle: &str) -> bool {
    !node.kind().is_marker() && node.name.to_lowercase().contains(needle)
}

fn filter_node(node: &TreeNode, needle: &str) -> Option<TreeNode> {
    let self_match = name_matches(node, needle);

    let Some(children) = node.children() else {
        return self_match.then(|| node.with_children(None));
    };

    let kept: Vec<TreeNode> = children
        .iter()
        .filter_map(|child| filter_node(child, needle))
        .collect();

    let descendant_match = !kept.is_empty();
    if !self_match && !descendant_match {
        return None;
    }

    let mut filtered = node.with_children(Some(kept));
    if descendant_match {
        filtered.expanded = true;
    }
    Some(filtered)
}

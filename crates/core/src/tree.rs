//! Flat-row tree algorithms.
//!
//! Tree nodes are persisted one row per node, linked by a parent id and an
//! ordered list of child ids. This module rebuilds nested trees from those
//! rows and provides the id bookkeeping used by recursive delete, move,
//! and the two-phase id remap of version copies.

use std::collections::{HashMap, HashSet};

use crate::component::ComponentNode;
use crate::error::CoreError;
use crate::types::DbId;

/// Parent id stored on the summit row.
pub const SUMMIT_PARENT_ID: DbId = 0;

/// Read access to a persisted tree row.
pub trait FlatTreeNode {
    fn node_id(&self) -> DbId;
    fn parent_id(&self) -> DbId;
    fn children_ids(&self) -> &[DbId];
    fn node_name(&self) -> &str;
    fn content(&self) -> &str;
}

/// Errors raised while interpreting a set of tree rows.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("node {parent_id} references missing child {child_id}")]
    MissingChild { parent_id: DbId, child_id: DbId },

    #[error("node {node_id} is reachable more than once")]
    Cycle { node_id: DbId },

    #[error("no summit row (parent id 0) found")]
    MissingSummit,

    #[error("found {count} summit rows, expected exactly one")]
    MultipleSummits { count: usize },

    #[error("content of node {node_id} is not a valid component: {source}")]
    Content {
        node_id: DbId,
        #[source]
        source: serde_json::Error,
    },
}

impl From<TreeError> for CoreError {
    fn from(err: TreeError) -> Self {
        CoreError::BrokenTree(err.to_string())
    }
}

/// Index rows by id for the builder and traversal helpers.
pub fn index_by_id<N: FlatTreeNode>(rows: &[N]) -> HashMap<DbId, &N> {
    rows.iter().map(|row| (row.node_id(), row)).collect()
}

/// Find the single summit row.
pub fn find_summit<N: FlatTreeNode>(rows: &[N]) -> Result<&N, TreeError> {
    let mut summits = rows.iter().filter(|r| r.parent_id() == SUMMIT_PARENT_ID);
    let first = summits.next().ok_or(TreeError::MissingSummit)?;
    let extra = summits.count();
    if extra > 0 {
        return Err(TreeError::MultipleSummits { count: extra + 1 });
    }
    Ok(first)
}

/// Rebuild the nested component tree rooted at `root`.
///
/// Children appear in the order of the row's `children_ids`, and each child's
/// `parent_node` is set to its parent's display name. Fails if a child id is
/// missing from `index` or a node is reached twice.
pub fn build_component_tree<N: FlatTreeNode>(
    root: &N,
    index: &HashMap<DbId, &N>,
) -> Result<ComponentNode, TreeError> {
    let mut visited = HashSet::new();
    build_node(root, "", index, &mut visited)
}

fn build_node<N: FlatTreeNode>(
    row: &N,
    parent_name: &str,
    index: &HashMap<DbId, &N>,
    visited: &mut HashSet<DbId>,
) -> Result<ComponentNode, TreeError> {
    if !visited.insert(row.node_id()) {
        return Err(TreeError::Cycle {
            node_id: row.node_id(),
        });
    }

    let mut node = ComponentNode::from_content(row.content()).map_err(|source| {
        TreeError::Content {
            node_id: row.node_id(),
            source,
        }
    })?;
    node.parent_node = parent_name.to_string();
    node.children_node = Vec::with_capacity(row.children_ids().len());

    for child_id in row.children_ids() {
        let child = index.get(child_id).ok_or(TreeError::MissingChild {
            parent_id: row.node_id(),
            child_id: *child_id,
        })?;
        let built = build_node(*child, &node.display_name, index, visited)?;
        node.children_node.push(built);
    }

    Ok(node)
}

/// Collect the ids of `root_id` and every descendant, depth-first.
///
/// Used by recursive delete. Children missing from `index` are an error so a
/// delete never silently leaves orphans behind.
pub fn collect_subtree_ids<N: FlatTreeNode>(
    root_id: DbId,
    index: &HashMap<DbId, &N>,
) -> Result<Vec<DbId>, TreeError> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![(SUMMIT_PARENT_ID, root_id)];

    while let Some((parent_id, id)) = stack.pop() {
        let row = index.get(&id).ok_or(TreeError::MissingChild {
            parent_id,
            child_id: id,
        })?;
        if !seen.insert(id) {
            return Err(TreeError::Cycle { node_id: id });
        }
        ids.push(id);
        for child in row.children_ids().iter().rev() {
            stack.push((id, *child));
        }
    }

    Ok(ids)
}

/// Returns `true` if `candidate` is `ancestor` itself or lies below it.
pub fn is_in_subtree<N: FlatTreeNode>(
    ancestor: DbId,
    candidate: DbId,
    index: &HashMap<DbId, &N>,
) -> bool {
    let mut current = candidate;
    let mut steps = 0usize;
    while current != SUMMIT_PARENT_ID && steps <= index.len() {
        if current == ancestor {
            return true;
        }
        current = match index.get(&current) {
            Some(row) => row.parent_id(),
            None => return false,
        };
        steps += 1;
    }
    false
}

/// Remove `child_id` from a children list. Returns `true` if it was present.
pub fn detach_child(children: &mut Vec<DbId>, child_id: DbId) -> bool {
    let before = children.len();
    children.retain(|id| *id != child_id);
    children.len() != before
}

/// Append `child_id` unless it is already listed.
pub fn attach_child(children: &mut Vec<DbId>, child_id: DbId) {
    if !children.contains(&child_id) {
        children.push(child_id);
    }
}

/// Insert `child_id` at `position`, clamped to the list length.
pub fn attach_child_at(children: &mut Vec<DbId>, child_id: DbId, position: usize) {
    detach_child(children, child_id);
    let position = position.min(children.len());
    children.insert(position, child_id);
}

/// Rewrite parent and children ids through an `old -> new` id map.
///
/// This is the second pass of a version copy: rows were inserted with their
/// original links, and now every link is pointed at the fresh ids. The
/// summit parent id `0` is preserved. Ids without a mapping are an error.
pub fn remap_links(
    parent_id: DbId,
    children_ids: &[DbId],
    id_map: &HashMap<DbId, DbId>,
) -> Result<(DbId, Vec<DbId>), TreeError> {
    let new_parent = if parent_id == SUMMIT_PARENT_ID {
        SUMMIT_PARENT_ID
    } else {
        *id_map.get(&parent_id).ok_or(TreeError::MissingChild {
            parent_id,
            child_id: parent_id,
        })?
    };

    let new_children = children_ids
        .iter()
        .map(|child| {
            id_map.get(child).copied().ok_or(TreeError::MissingChild {
                parent_id,
                child_id: *child,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((new_parent, new_children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[derive(Debug, Clone)]
    struct Row {
        id: DbId,
        parent: DbId,
        children: Vec<DbId>,
        name: String,
        content: String,
    }

    impl FlatTreeNode for Row {
        fn node_id(&self) -> DbId {
            self.id
        }
        fn parent_id(&self) -> DbId {
            self.parent
        }
        fn children_ids(&self) -> &[DbId] {
            &self.children
        }
        fn node_name(&self) -> &str {
            &self.name
        }
        fn content(&self) -> &str {
            &self.content
        }
    }

    fn row(id: DbId, parent: DbId, children: &[DbId], name: &str) -> Row {
        let content = ComponentNode::new(name, "", "CONTAINER_WIDGET")
            .to_content()
            .unwrap();
        Row {
            id,
            parent,
            children: children.to_vec(),
            name: name.to_string(),
            content,
        }
    }

    /// root(1) -> [a(2) -> [c(4)], b(3)]
    fn sample() -> Vec<Row> {
        vec![
            row(1, 0, &[2, 3], "root"),
            row(2, 1, &[4], "a"),
            row(3, 1, &[], "b"),
            row(4, 2, &[], "c"),
        ]
    }

    /// A straight chain of `depth` nodes, ids 1..=depth.
    fn chain(depth: DbId) -> Vec<Row> {
        (1..=depth)
            .map(|id| {
                let children = if id < depth { vec![id + 1] } else { vec![] };
                row(id, id - 1, &children, &format!("n{id}"))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // build_component_tree
    // -----------------------------------------------------------------------

    #[test]
    fn builds_nested_tree_in_child_order() {
        let rows = sample();
        let index = index_by_id(&rows);
        let summit = find_summit(&rows).unwrap();
        let tree = build_component_tree(summit, &index).unwrap();

        assert_eq!(tree.display_name, "root");
        assert!(tree.parent_node.is_empty());
        let names: Vec<_> = tree.children_node.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(tree.children_node[0].parent_node, "root");
        assert_eq!(tree.children_node[0].children_node[0].display_name, "c");
        assert_eq!(tree.children_node[0].children_node[0].parent_node, "a");
    }

    #[test]
    fn child_order_follows_children_ids() {
        let mut rows = sample();
        rows[0].children = vec![3, 2];
        let index = index_by_id(&rows);
        let tree = build_component_tree(&rows[0], &index).unwrap();
        assert_eq!(tree.children_node[0].display_name, "b");
        assert_eq!(tree.children_node[1].display_name, "a");
    }

    #[test]
    fn repeated_builds_are_identical() {
        let rows = sample();
        let index = index_by_id(&rows);
        let first = build_component_tree(&rows[0], &index).unwrap();
        let second = build_component_tree(&rows[0], &index).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_child_is_a_broken_tree() {
        let mut rows = sample();
        rows[1].children.push(99);
        let index = index_by_id(&rows);
        let err = build_component_tree(&rows[0], &index).unwrap_err();
        assert_matches!(
            err,
            TreeError::MissingChild {
                parent_id: 2,
                child_id: 99
            }
        );
        assert_matches!(CoreError::from(err), CoreError::BrokenTree(_));
    }

    #[test]
    fn cycle_is_detected() {
        let mut rows = sample();
        rows[3].children.push(1);
        let index = index_by_id(&rows);
        assert_matches!(
            build_component_tree(&rows[0], &index),
            Err(TreeError::Cycle { node_id: 1 })
        );
    }

    #[test]
    fn invalid_content_is_reported() {
        let mut rows = sample();
        rows[2].content = "not json".to_string();
        let index = index_by_id(&rows);
        assert_matches!(
            build_component_tree(&rows[0], &index),
            Err(TreeError::Content { node_id: 3, .. })
        );
    }

    // -----------------------------------------------------------------------
    // find_summit
    // -----------------------------------------------------------------------

    #[test]
    fn summit_must_be_unique() {
        let rows = sample();
        assert_eq!(find_summit(&rows).unwrap().node_name(), "root");

        let empty: Vec<Row> = Vec::new();
        assert_matches!(find_summit(&empty), Err(TreeError::MissingSummit));

        let mut two = sample();
        two.push(row(5, 0, &[], "other"));
        assert_matches!(find_summit(&two), Err(TreeError::MultipleSummits { count: 2 }));
    }

    // -----------------------------------------------------------------------
    // collect_subtree_ids / is_in_subtree
    // -----------------------------------------------------------------------

    #[test]
    fn collects_subtree_depth_first() {
        let rows = sample();
        let index = index_by_id(&rows);
        assert_eq!(collect_subtree_ids(1, &index).unwrap(), vec![1, 2, 4, 3]);
        assert_eq!(collect_subtree_ids(2, &index).unwrap(), vec![2, 4]);
        assert_eq!(collect_subtree_ids(3, &index).unwrap(), vec![3]);
    }

    #[test]
    fn collects_all_levels_of_a_deep_chain() {
        let rows = chain(20);
        let index = index_by_id(&rows);
        let ids = collect_subtree_ids(1, &index).unwrap();
        assert_eq!(ids.len(), 20);
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn subtree_collection_fails_on_missing_child() {
        let mut rows = sample();
        rows[1].children.push(42);
        let index = index_by_id(&rows);
        assert_matches!(
            collect_subtree_ids(1, &index),
            Err(TreeError::MissingChild { child_id: 42, .. })
        );
    }

    #[test]
    fn subtree_membership() {
        let rows = sample();
        let index = index_by_id(&rows);
        assert!(is_in_subtree(2, 4, &index));
        assert!(is_in_subtree(2, 2, &index));
        assert!(is_in_subtree(1, 3, &index));
        assert!(!is_in_subtree(2, 3, &index));
        assert!(!is_in_subtree(4, 2, &index));
    }

    // -----------------------------------------------------------------------
    // children list helpers
    // -----------------------------------------------------------------------

    #[test]
    fn detach_and_attach_children() {
        let mut children = vec![1, 2, 3];
        assert!(detach_child(&mut children, 2));
        assert!(!detach_child(&mut children, 2));
        assert_eq!(children, vec![1, 3]);

        attach_child(&mut children, 4);
        attach_child(&mut children, 4);
        assert_eq!(children, vec![1, 3, 4]);

        attach_child_at(&mut children, 9, 1);
        assert_eq!(children, vec![1, 9, 3, 4]);
        attach_child_at(&mut children, 1, 100);
        assert_eq!(children, vec![9, 3, 4, 1]);
    }

    // -----------------------------------------------------------------------
    // remap_links
    // -----------------------------------------------------------------------

    #[test]
    fn remap_preserves_structure() {
        let rows = sample();
        let id_map: HashMap<DbId, DbId> = rows.iter().map(|r| (r.id, r.id + 100)).collect();

        let remapped: Vec<Row> = rows
            .iter()
            .map(|r| {
                let (parent, children) = remap_links(r.parent, &r.children, &id_map).unwrap();
                Row {
                    id: id_map[&r.id],
                    parent,
                    children,
                    ..r.clone()
                }
            })
            .collect();

        assert_eq!(remapped[0].parent, 0);
        assert_eq!(remapped[0].children, vec![102, 103]);
        assert_eq!(remapped[3].parent, 102);

        let old_index = index_by_id(&rows);
        let new_index = index_by_id(&remapped);
        let old_tree = build_component_tree(&rows[0], &old_index).unwrap();
        let new_tree = build_component_tree(&remapped[0], &new_index).unwrap();
        assert_eq!(old_tree, new_tree);
    }

    #[test]
    fn remap_rejects_unmapped_ids() {
        let id_map = HashMap::from([(1, 101)]);
        assert!(remap_links(1, &[2], &id_map).is_err());
        assert!(remap_links(7, &[], &id_map).is_err());
        assert_eq!(remap_links(0, &[1], &id_map).unwrap(), (0, vec![101]));
    }
}

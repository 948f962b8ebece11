//! Arena view of a record's comment forest.
//!
//! Nodes are owned by a map keyed by id. A node refers to its parent by id
//! and children are looked up through an index built at construction, so
//! there are no back-references to keep in sync.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use walwal_common::types::CommentNode;

#[derive(Debug, Default, Clone)]
pub struct CommentTree {
    nodes: HashMap<Uuid, CommentNode>,
    /// parent id → child ids, oldest first
    children: HashMap<Uuid, Vec<Uuid>>,
    roots: Vec<Uuid>,
}

impl CommentTree {
    /// Build the arena. Input order does not matter; children end up ordered
    /// by creation time (ties broken by id). Duplicate ids keep the last node.
    pub fn from_nodes(nodes: impl IntoIterator<Item = CommentNode>) -> Self {
        let mut by_id: HashMap<Uuid, CommentNode> = HashMap::new();
        for node in nodes {
            by_id.insert(node.id, node);
        }

        let mut ordered: Vec<&CommentNode> = by_id.values().collect();
        ordered.sort_by_key(|n| (n.created_at, n.id));

        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut roots = Vec::new();
        for node in ordered {
            match node.parent_id {
                Some(parent_id) => children.entry(parent_id).or_default().push(node.id),
                None => roots.push(node.id),
            }
        }

        Self {
            nodes: by_id,
            children,
            roots,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&CommentNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level comments, oldest first.
    pub fn roots(&self) -> impl Iterator<Item = &CommentNode> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Direct replies to `id`, oldest first.
    pub fn children(&self, id: Uuid) -> impl Iterator<Item = &CommentNode> {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.nodes.get(child))
    }

    /// `id` itself followed by its ancestors up to the root.
    ///
    /// Stops at a parent that is not in the arena, and at the first repeated
    /// id should the stored data ever contain a cycle.
    pub fn path_to_root(&self, id: Uuid) -> Vec<&CommentNode> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.nodes.get(&id);

        while let Some(node) = current {
            if !seen.insert(node.id) {
                tracing::warn!(comment_id = %node.id, "Cycle detected in comment parents");
                break;
            }
            path.push(node);
            current = node.parent_id.and_then(|parent| self.nodes.get(&parent));
        }

        path
    }
}

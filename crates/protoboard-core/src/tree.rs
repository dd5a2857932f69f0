//! Project tree document and mutation logic.

use crate::intent::MutationIntent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a placed component node.
pub type NodeId = Uuid;

/// Whether a node instance came from the built-in HTML palette or from a
/// user-defined component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    HtmlElement,
    Custom,
}

/// A component instance placed in the project tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    /// Unique node identifier.
    pub id: NodeId,
    /// Catalog id of the element type this node instantiates.
    pub type_id: u32,
    /// Built-in element or custom component.
    pub kind: NodeKind,
    /// Ordinal among siblings, assigned at insertion time.
    pub child_id: u32,
    /// Element properties (attributes, display name overrides, etc.).
    #[serde(default)]
    pub props: BTreeMap<String, String>,
    /// Context values inherited from ancestors at creation time.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Child nodes, in render order.
    #[serde(default)]
    pub children: Vec<NodeId>,
}

impl ComponentNode {
    /// Create a new leaf node with a fresh id.
    pub fn new(type_id: u32, kind: NodeKind, child_id: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_id,
            kind,
            child_id,
            props: BTreeMap::new(),
            context: BTreeMap::new(),
            children: Vec::new(),
        }
    }
}

/// A multi-field patch against a single node.
///
/// For both maps, `Some(value)` sets the entry and `None` removes it.
/// A patch is validated in full before any field is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default)]
    pub props: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub context: BTreeMap<String, Option<String>>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self.props.is_empty() && self.context.is_empty()
    }

    /// Convenience constructor for a single-prop patch.
    pub fn set_prop(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut patch = Self::default();
        patch.props.insert(key.into(), Some(value.into()));
        patch
    }
}

/// Tree mutation errors.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("parent not found: {0}")]
    ParentNotFound(NodeId),
    #[error("node already exists: {0}")]
    DuplicateNode(NodeId),
    #[error("new nodes must be inserted without children")]
    ChildrenOnInsert,
    #[error("patch contains no fields")]
    EmptyPatch,
    #[error("patch key must not be empty")]
    EmptyPatchKey,
    #[error("cannot move a node into its own subtree")]
    MoveIntoSelf,
}

/// Result type for tree mutations.
pub type TreeResult<T> = Result<T, TreeError>;

/// The component hierarchy of a single project.
///
/// All mutations go through [`ProjectTree::apply`] (or the typed methods it
/// delegates to), so that the same intent replayed on any two trees with
/// identical prior state yields identical resulting state. Each mutation is
/// all-or-nothing: on error the tree is left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTree {
    /// Unique document identifier.
    pub id: String,
    /// Project name.
    pub name: String,
    /// All nodes in the tree, keyed by id.
    nodes: HashMap<NodeId, ComponentNode>,
    /// Top-level nodes, in render order.
    roots: Vec<NodeId>,
}

impl Default for ProjectTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectTree {
    /// Create a new empty project tree.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Untitled".to_string(),
            nodes: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Apply a mutation intent.
    ///
    /// This is the single entry point used for both locally dispatched and
    /// remotely received intents.
    pub fn apply(&mut self, intent: &MutationIntent) -> TreeResult<()> {
        match intent {
            MutationIntent::AddChild { parent, node } => {
                self.add_child(*parent, node.clone()).map(|_| ())
            }
            MutationIntent::UpdateNode { node, patch } => self.update(*node, patch),
            MutationIntent::MoveNode {
                node,
                new_parent,
                index,
            } => self.move_node(*node, *new_parent, *index),
            MutationIntent::DeleteType { type_id } => {
                self.delete_all(*type_id);
                Ok(())
            }
        }
    }

    /// Insert a node under the given parent (`None` for the tree root).
    ///
    /// The node must be a leaf; children are attached by later intents.
    pub fn add_child(&mut self, parent: Option<NodeId>, node: ComponentNode) -> TreeResult<NodeId> {
        if self.nodes.contains_key(&node.id) {
            return Err(TreeError::DuplicateNode(node.id));
        }
        if !node.children.is_empty() {
            return Err(TreeError::ChildrenOnInsert);
        }
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(&parent_id) {
                return Err(TreeError::ParentNotFound(parent_id));
            }
        }

        let id = node.id;
        self.nodes.insert(id, node);
        match parent {
            Some(parent_id) => {
                // Existence checked above.
                if let Some(p) = self.nodes.get_mut(&parent_id) {
                    p.children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Apply a multi-field patch to a node.
    ///
    /// The patch is validated in full first; a malformed patch changes
    /// nothing.
    pub fn update(&mut self, node: NodeId, patch: &NodePatch) -> TreeResult<()> {
        if patch.is_empty() {
            return Err(TreeError::EmptyPatch);
        }
        if patch.props.keys().chain(patch.context.keys()).any(|k| k.is_empty()) {
            return Err(TreeError::EmptyPatchKey);
        }
        let target = self.nodes.get_mut(&node).ok_or(TreeError::NodeNotFound(node))?;

        for (key, value) in &patch.props {
            match value {
                Some(v) => {
                    target.props.insert(key.clone(), v.clone());
                }
                None => {
                    target.props.remove(key);
                }
            }
        }
        for (key, value) in &patch.context {
            match value {
                Some(v) => {
                    target.context.insert(key.clone(), v.clone());
                }
                None => {
                    target.context.remove(key);
                }
            }
        }
        Ok(())
    }

    /// Move a node to a new parent (`None` for the root) at the given
    /// sibling index. Indices past the end clamp to the end.
    pub fn move_node(
        &mut self,
        node: NodeId,
        new_parent: Option<NodeId>,
        index: usize,
    ) -> TreeResult<()> {
        if !self.nodes.contains_key(&node) {
            return Err(TreeError::NodeNotFound(node));
        }
        if let Some(parent_id) = new_parent {
            if !self.nodes.contains_key(&parent_id) {
                return Err(TreeError::ParentNotFound(parent_id));
            }
            if parent_id == node || self.subtree_contains(node, parent_id) {
                return Err(TreeError::MoveIntoSelf);
            }
        }

        self.detach(node);
        match new_parent {
            Some(parent_id) => {
                if let Some(p) = self.nodes.get_mut(&parent_id) {
                    let at = index.min(p.children.len());
                    p.children.insert(at, node);
                }
            }
            None => {
                let at = index.min(self.roots.len());
                self.roots.insert(at, node);
            }
        }
        Ok(())
    }

    /// Remove every node of the given type, wherever it sits in the tree,
    /// and no others: each removed node's children are spliced into its
    /// place. Returns how many nodes were removed.
    pub fn delete_all(&mut self, type_id: u32) -> usize {
        let doomed: HashSet<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.type_id == type_id)
            .map(|n| n.id)
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let roots = std::mem::take(&mut self.roots);
        self.roots = self.splice_out(roots, &doomed);
        let survivors: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !doomed.contains(id))
            .copied()
            .collect();
        for id in survivors {
            let children = match self.nodes.get_mut(&id) {
                Some(node) => std::mem::take(&mut node.children),
                None => continue,
            };
            let spliced = self.splice_out(children, &doomed);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children = spliced;
            }
        }

        self.nodes.retain(|id, _| !doomed.contains(id));
        doomed.len()
    }

    /// Rewrite a child list with every doomed id replaced by its own
    /// children, expanding through chains of doomed nodes in order.
    fn splice_out(&self, ids: Vec<NodeId>, doomed: &HashSet<NodeId>) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(ids.len());
        let mut stack: Vec<NodeId> = ids.into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if doomed.contains(&id) {
                if let Some(node) = self.nodes.get(&id) {
                    for &child in node.children.iter().rev() {
                        stack.push(child);
                    }
                }
            } else {
                out.push(id);
            }
        }
        out
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&ComponentNode> {
        self.nodes.get(&id)
    }

    /// Child ids under the given parent (`None` for the root level).
    pub fn children_of(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(id) => self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[]),
            None => &self.roots,
        }
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentNode> {
        self.nodes.values()
    }

    /// Whether `target` sits anywhere inside the subtree rooted at `root`.
    fn subtree_contains(&self, root: NodeId, target: NodeId) -> bool {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                for &child in &node.children {
                    if child == target {
                        return true;
                    }
                    stack.push(child);
                }
            }
        }
        false
    }

    /// Remove a node id from whatever child list currently holds it.
    fn detach(&mut self, node: NodeId) {
        self.roots.retain(|&id| id != node);
        for n in self.nodes.values_mut() {
            n.children.retain(|&id| id != node);
        }
    }

    /// Serialize the tree to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a tree from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

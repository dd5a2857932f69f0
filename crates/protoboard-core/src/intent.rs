//! Mutation intents: self-contained, replayable tree edits.

use crate::tree::{ComponentNode, NodeId, NodePatch};
use serde::{Deserialize, Serialize};

/// A single tree edit, carrying everything a peer needs to reapply it.
///
/// Intents are produced by the action dispatcher, applied to the local tree
/// first, and then relayed verbatim to every other client in the room. No
/// field is resolved lazily; replaying the same intent against identical
/// prior state yields identical resulting state on every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationIntent {
    /// Insert a new node under `parent` (`None` for the root level).
    AddChild {
        parent: Option<NodeId>,
        node: ComponentNode,
    },
    /// Patch the props/context of an existing node.
    UpdateNode { node: NodeId, patch: NodePatch },
    /// Reparent a node to a new sibling position.
    MoveNode {
        node: NodeId,
        new_parent: Option<NodeId>,
        index: usize,
    },
    /// Remove every node of a type, anywhere in the tree.
    DeleteType { type_id: u32 },
}

impl MutationIntent {
    /// Wire-level event name for this intent.
    pub fn name(&self) -> &'static str {
        match self {
            MutationIntent::AddChild { .. } => "add_child",
            MutationIntent::UpdateNode { .. } => "update_node",
            MutationIntent::MoveNode { .. } => "move_node",
            MutationIntent::DeleteType { .. } => "delete_type",
        }
    }
}

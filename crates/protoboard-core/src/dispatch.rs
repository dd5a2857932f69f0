//! Action dispatcher: turns UI gestures into mutation intents.
//!
//! Each gesture produces exactly one fully-resolved intent. The intent is
//! applied to the local tree before it is queued for relay, so local
//! responsiveness never waits on the network.

use crate::catalog::ElementCatalog;
use crate::intent::MutationIntent;
use crate::session::CollabSession;
use crate::tree::{ComponentNode, NodeId, NodePatch, ProjectTree, TreeError};
use thiserror::Error;

/// A user gesture on the canvas or palette.
#[derive(Debug, Clone)]
pub enum Gesture {
    /// Drop a palette entry onto a node (`None` for the canvas root).
    DropNew {
        type_id: u32,
        parent: Option<NodeId>,
    },
    /// Drag an existing node to a new parent and sibling position.
    Move {
        node: NodeId,
        new_parent: Option<NodeId>,
        index: usize,
    },
    /// Edit a node's props/context.
    Edit { node: NodeId, patch: NodePatch },
    /// Confirmed deletion of every instance of a type.
    ConfirmDeleteType { type_id: u32 },
}

/// Dispatch errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown element type {0}")]
    UnknownType(u32),
    #[error("built-in element type {0} cannot be deleted")]
    BuiltinDelete(u32),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Builds intents from gestures and runs the local-first apply path.
pub struct ActionDispatcher {
    catalog: ElementCatalog,
}

impl ActionDispatcher {
    pub fn new(catalog: ElementCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ElementCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut ElementCatalog {
        &mut self.catalog
    }

    /// Handle a gesture: build one intent, apply it locally, then queue it
    /// for relay (a no-op while no room is joined).
    ///
    /// Returns the intent that was applied, e.g. for logging or undo
    /// bookkeeping in the caller.
    pub fn dispatch(
        &self,
        gesture: Gesture,
        tree: &mut ProjectTree,
        session: &mut CollabSession,
    ) -> Result<MutationIntent, DispatchError> {
        let intent = self.build_intent(gesture, tree)?;
        tree.apply(&intent)?;
        session.queue_intent(&intent);
        Ok(intent)
    }

    /// Construct a self-contained intent for a gesture, resolving catalog
    /// lookups, sibling ordinals, and inherited context up front.
    fn build_intent(
        &self,
        gesture: Gesture,
        tree: &ProjectTree,
    ) -> Result<MutationIntent, DispatchError> {
        match gesture {
            Gesture::DropNew { type_id, parent } => {
                if self.catalog.get(type_id).is_none() {
                    return Err(DispatchError::UnknownType(type_id));
                }
                let child_id = tree.children_of(parent).len() as u32 + 1;
                let mut node =
                    ComponentNode::new(type_id, ElementCatalog::kind_of(type_id), child_id);
                // Context flows down from the drop target.
                if let Some(parent_id) = parent {
                    if let Some(p) = tree.get(parent_id) {
                        node.context = p.context.clone();
                    }
                }
                Ok(MutationIntent::AddChild { parent, node })
            }
            Gesture::Move {
                node,
                new_parent,
                index,
            } => Ok(MutationIntent::MoveNode {
                node,
                new_parent,
                index,
            }),
            Gesture::Edit { node, patch } => Ok(MutationIntent::UpdateNode { node, patch }),
            Gesture::ConfirmDeleteType { type_id } => {
                if !ElementCatalog::is_custom(type_id) {
                    return Err(DispatchError::BuiltinDelete(type_id));
                }
                Ok(MutationIntent::DeleteType { type_id })
            }
        }
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(ElementCatalog::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RoomCode;
    use crate::sync::ServerMessage;
    use crate::tree::NodeKind;

    fn in_room() -> (CollabSession, ProjectTree) {
        let mut session = CollabSession::new();
        let mut tree = ProjectTree::new();
        session.handle_message(
            ServerMessage::Joined {
                room: RoomCode::new("attic-42"),
                peer_count: 1,
                snapshot: None,
            },
            &mut tree,
        );
        (session, tree)
    }

    #[test]
    fn test_drop_new_applies_locally() {
        let dispatcher = ActionDispatcher::default();
        let mut session = CollabSession::new();
        let mut tree = ProjectTree::new();

        let intent = dispatcher
            .dispatch(
                Gesture::DropNew {
                    type_id: 4,
                    parent: None,
                },
                &mut tree,
                &mut session,
            )
            .unwrap();

        assert_eq!(tree.len(), 1);
        match intent {
            MutationIntent::AddChild { node, .. } => {
                assert_eq!(node.type_id, 4);
                assert_eq!(node.kind, NodeKind::HtmlElement);
                assert_eq!(node.child_id, 1);
            }
            _ => panic!("wrong intent"),
        }
    }

    #[test]
    fn test_solo_edits_stay_private() {
        let dispatcher = ActionDispatcher::default();
        let mut session = CollabSession::new();
        let mut tree = ProjectTree::new();

        dispatcher
            .dispatch(
                Gesture::DropNew {
                    type_id: 1,
                    parent: None,
                },
                &mut tree,
                &mut session,
            )
            .unwrap();

        // Local tree updated, nothing relayed.
        assert_eq!(tree.len(), 1);
        assert!(session.take_outgoing().is_empty());
    }

    #[test]
    fn test_room_edits_are_relayed() {
        let dispatcher = ActionDispatcher::default();
        let (mut session, mut tree) = in_room();

        dispatcher
            .dispatch(
                Gesture::DropNew {
                    type_id: 1,
                    parent: None,
                },
                &mut tree,
                &mut session,
            )
            .unwrap();

        let outgoing = session.take_outgoing();
        assert_eq!(outgoing.len(), 1);
        assert!(outgoing[0].contains("add_child"));
    }

    #[test]
    fn test_context_inherited_from_parent() {
        let dispatcher = ActionDispatcher::default();
        let mut session = CollabSession::new();
        let mut tree = ProjectTree::new();

        let intent = dispatcher
            .dispatch(
                Gesture::DropNew {
                    type_id: 3,
                    parent: None,
                },
                &mut tree,
                &mut session,
            )
            .unwrap();
        let parent_id = match intent {
            MutationIntent::AddChild { node, .. } => node.id,
            _ => panic!("wrong intent"),
        };
        tree.update(parent_id, &{
            let mut patch = NodePatch::default();
            patch
                .context
                .insert("theme".to_string(), Some("dark".to_string()));
            patch
        })
        .unwrap();

        let intent = dispatcher
            .dispatch(
                Gesture::DropNew {
                    type_id: 4,
                    parent: Some(parent_id),
                },
                &mut tree,
                &mut session,
            )
            .unwrap();
        match intent {
            MutationIntent::AddChild { node, .. } => {
                assert_eq!(node.context.get("theme"), Some(&"dark".to_string()));
            }
            _ => panic!("wrong intent"),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let dispatcher = ActionDispatcher::default();
        let mut session = CollabSession::new();
        let mut tree = ProjectTree::new();

        let err = dispatcher
            .dispatch(
                Gesture::DropNew {
                    type_id: 9999,
                    parent: None,
                },
                &mut tree,
                &mut session,
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownType(9999)));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_builtin_delete_rejected() {
        let dispatcher = ActionDispatcher::default();
        let (mut session, mut tree) = in_room();
        session.take_outgoing();

        let err = dispatcher
            .dispatch(
                Gesture::ConfirmDeleteType { type_id: 4 },
                &mut tree,
                &mut session,
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::BuiltinDelete(4)));
        // Nothing applied, nothing relayed.
        assert!(!session.has_outgoing());
    }

    #[test]
    fn test_custom_delete_dispatches() {
        let mut catalog = ElementCatalog::builtin();
        let custom = catalog.register_custom("Card");
        let dispatcher = ActionDispatcher::new(catalog);
        let (mut session, mut tree) = in_room();
        session.take_outgoing();

        dispatcher
            .dispatch(
                Gesture::DropNew {
                    type_id: custom,
                    parent: None,
                },
                &mut tree,
                &mut session,
            )
            .unwrap();
        dispatcher
            .dispatch(
                Gesture::ConfirmDeleteType { type_id: custom },
                &mut tree,
                &mut session,
            )
            .unwrap();

        assert!(tree.is_empty());
        assert_eq!(session.take_outgoing().len(), 2);
    }

    #[test]
    fn test_failed_apply_is_not_relayed() {
        let dispatcher = ActionDispatcher::default();
        let (mut session, mut tree) = in_room();
        session.take_outgoing();

        let err = dispatcher
            .dispatch(
                Gesture::Edit {
                    node: uuid::Uuid::new_v4(),
                    patch: NodePatch::set_prop("class", "hero"),
                },
                &mut tree,
                &mut session,
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::Tree(TreeError::NodeNotFound(_))));
        assert!(!session.has_outgoing());
    }
}

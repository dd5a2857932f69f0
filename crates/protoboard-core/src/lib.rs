//! Protoboard Core Library
//!
//! Data structures and collaboration logic for the Protoboard visual app
//! builder: the project tree, mutation intents, room sessions, the relay
//! transport, and the marketplace service with its storage backends.

pub mod catalog;
pub mod dispatch;
pub mod intent;
pub mod marketplace;
pub mod session;
pub mod storage;
pub mod sync;
pub mod tree;

pub use catalog::{ElementCatalog, ElementType, Icon};
pub use dispatch::{ActionDispatcher, Gesture};
pub use intent::MutationIntent;
pub use marketplace::{MarketplaceService, Project, ProjectDraft};
pub use session::{CollabSession, RoomCode, SessionEvent};
pub use sync::{ClientMessage, ConnectionState, RelaySocket, ServerMessage, TransportEvent};
pub use tree::{ComponentNode, NodeId, NodeKind, NodePatch, ProjectTree};

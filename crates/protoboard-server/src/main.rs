//! Protoboard Relay & Marketplace Server
//!
//! Rebroadcasts mutation intents between clients in the same room and
//! serves the marketplace CRUD endpoints over the project store.
//!
//! ## Relay protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "room": "room-id" }
//! { "type": "intent", "payload": { "action": "add_child", ... } }
//! { "type": "snapshot", "tree": { ... } }
//! ```

mod marketplace;
mod relay;

use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use protoboard_core::MarketplaceService;
use protoboard_core::storage::{FileStore, MemoryStore};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use relay::RelayState;

/// Server configuration.
#[derive(Parser, Debug)]
#[command(name = "protoboard-server", about, version)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 3030)]
    port: u16,

    /// Directory for persisted projects. Omit to keep projects in memory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

/// Shared application state.
pub struct ServerState {
    /// Active rooms.
    pub relay: RelayState,
    /// Marketplace service over the project store.
    pub marketplace: MarketplaceService,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "protoboard_server=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let marketplace = match args.data_dir {
        Some(dir) => {
            info!("persisting projects under {}", dir.display());
            let store = FileStore::new(dir).expect("failed to open project store");
            MarketplaceService::new(store)
        }
        None => {
            info!("no --data-dir given, projects are kept in memory");
            MarketplaceService::new(MemoryStore::new())
        }
    };

    let state = Arc::new(ServerState {
        relay: RelayState::new(),
        marketplace,
    });

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(relay::ws_handler))
        .route("/health", get(health))
        .route(
            "/projects",
            get(marketplace::list_projects).post(marketplace::save_project),
        )
        .route("/projects/publish", post(marketplace::publish_project))
        .route(
            "/projects/{id}",
            get(marketplace::get_project).delete(marketplace::delete_project),
        )
        .route(
            "/projects/{id}/unpublish",
            post(marketplace::unpublish_project),
        )
        .route("/projects/{id}/clone", post(marketplace::clone_project))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Protoboard server listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:{}/ws", args.port);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Index page.
async fn index() -> &'static str {
    "Protoboard Server - Connect via WebSocket at /ws"
}

/// Health check.
async fn health() -> &'static str {
    "ok"
}

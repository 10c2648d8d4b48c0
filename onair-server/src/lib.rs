mod claim;
mod context;
mod docs;
mod errors;
mod rooms;
mod schemas;
mod serialized;
mod sse;
mod token;
mod user;

use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    thread,
};

use axum::routing::get;
use log::info;
use onair_collab::Collab;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::ServerContext;
pub use sse::{ServerEvent, ServerSentEvents};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Builds the full application router around a shared context
pub fn router(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .nest("/rooms", rooms::router())
        .nest("/user", user::router())
        .nest("/zego-token", token::router())
        .nest("/claim", claim::router())
        .nest("/events", sse::router());

    Router::new()
        .nest("/api", api_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the onair server
pub async fn run_server(collab: Collab, port: u16) -> std::io::Result<()> {
    let context = ServerContext {
        collab: Arc::new(collab),
        sse: ServerSentEvents::new(),
    };

    forward_events(&context);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);
    axum::serve(listener, router(context).into_make_service()).await
}

/// Pushes every collab event to the server sent event connections
fn forward_events(context: &ServerContext) {
    let collab = context.collab.clone();
    let sse = context.sse.clone();

    thread::spawn(move || {
        while let Some(event) = collab.wait_for_event() {
            sse.broadcast(event.into())
        }
    });
}

use std::sync::Arc;

use axum::extract::FromRef;
use onair_collab::Collab;

use crate::sse::ServerSentEvents;

/// Shared state handed to every handler
#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
    pub sse: Arc<ServerSentEvents>,
}

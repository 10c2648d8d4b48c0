use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::{EngineUser, Viewer};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// The engine rejected a call
    #[error("Engine error {code}: {message}")]
    Rejected { code: i32, message: String },
    /// A played stream had none of the shapes the adapter understands
    #[error("Could not find a media stream in the engine payload")]
    UnrecognizedStream,
    #[error("Engine is not available: {0}")]
    Unavailable(String),
}

/// A local capture stream created by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStream {
    pub id: String,
}

/// The real-time media engine a room session drives.
///
/// Implementations wrap the vendor SDK and forward its callbacks into the
/// session as [crate::EngineEvent]s.
#[async_trait]
pub trait StreamingEngine: Send + Sync {
    async fn login_room(&self, room_id: &str, token: &str, user: &EngineUser) -> EngineResult<()>;
    async fn logout_room(&self, room_id: &str) -> EngineResult<()>;

    async fn create_stream(&self) -> EngineResult<LocalStream>;
    async fn destroy_stream(&self, stream: &LocalStream) -> EngineResult<()>;
    async fn start_publishing(&self, stream_id: &str, stream: &LocalStream) -> EngineResult<()>;
    async fn stop_publishing(&self, stream_id: &str) -> EngineResult<()>;
    async fn mute_publish_audio(&self, stream: &LocalStream, mute: bool) -> EngineResult<()>;

    /// Starts playing a remote stream, returning the vendor's stream object as is
    async fn start_playing(&self, stream_id: &str) -> EngineResult<Value>;
    async fn stop_playing(&self, stream_id: &str) -> EngineResult<()>;
    async fn mute_play_audio(&self, stream_id: &str, mute: bool) -> EngineResult<()>;

    async fn send_barrage(&self, room_id: &str, message: &str) -> EngineResult<()>;
}

/// Issues access tokens for the engine
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn engine_token(&self, user_id: &str, room_id: &str) -> Result<String, String>;
}

/// Lists the active participants of a room
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn active_viewers(&self, room_id: &str) -> Result<Vec<Viewer>, String>;
}

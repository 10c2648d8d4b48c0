mod bullets;
mod engine;
mod media;
mod room_session;

pub use bullets::*;
pub use engine::*;
pub use media::*;
pub use room_session::*;

use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Failed to generate token: {0}")]
    Token(String),
    #[error("Not logged in to the room")]
    NotLoggedIn,
    #[error("Only the host can publish a stream")]
    NotHost,
    #[error("Stream already started")]
    AlreadyStreaming,
    #[error("Not streaming")]
    NotStreaming,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Session has shut down")]
    Closed,
}

/// Where a room session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// The host is publishing
    Streaming,
    /// A viewer is playing the host's stream
    Watching,
    Disconnected,
}

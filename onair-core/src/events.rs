use serde::{Deserialize, Serialize};

use crate::Viewer;

/// The connection state the engine reports for a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Whether an update adds or removes entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateKind {
    Add,
    Delete,
}

/// A user as the engine knows them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineUser {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub user_name: Option<String>,
}

/// A remote stream announced by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(rename = "streamID")]
    pub stream_id: String,
    pub user: Option<EngineUser>,
}

/// An inbound broadcast chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarrageMessage {
    pub message: String,
    pub from_user: EngineUser,
}

/// Engine callbacks, converted into messages for a room session
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RoomStateUpdate {
        room_id: String,
        state: ConnectionState,
        error_code: i32,
    },
    UserUpdate {
        room_id: String,
        kind: UpdateKind,
        users: Vec<EngineUser>,
    },
    StreamUpdate {
        room_id: String,
        kind: UpdateKind,
        streams: Vec<StreamInfo>,
    },
    BarrageReceived {
        room_id: String,
        messages: Vec<BarrageMessage>,
    },
}

/// Notifications a room session pushes to whoever drives the page
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    /// The viewer list was refreshed from the roster
    ViewersUpdated(Vec<Viewer>),
    /// The stream being watched went away, the host most likely ended it
    HostEndedStream,
}

impl From<EngineUser> for Viewer {
    fn from(user: EngineUser) -> Self {
        Self {
            user_id: user.user_id,
            user_name: user.user_name,
        }
    }
}

use chrono::{DateTime, Utc};
use onair_core::{ParticipantRole, RoomStatus, Viewer};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A live streaming room
#[derive(Debug, Clone, PartialEq)]
pub struct RoomData {
    pub id: PrimaryKey,
    /// The caller-generated identifier used in urls
    pub room_id: String,
    pub host_user_id: String,
    pub host_username: String,
    pub host_pfp_url: Option<String>,
    pub status: RoomStatus,
    /// Active participants, the host included
    pub current_viewers: i32,
    /// Every viewer that ever joined
    pub total_viewers: i32,
    pub created_at: DateTime<Utc>,
    pub stream_started_at: Option<DateTime<Utc>>,
    pub stream_ended_at: Option<DateTime<Utc>>,
    /// Seconds between start and end, set when the stream ends
    pub stream_duration: Option<i32>,
}

/// Someone who hosted or watched a room
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantData {
    pub id: PrimaryKey,
    /// The internal id of the room
    pub room_id: PrimaryKey,
    pub user_id: String,
    pub username: String,
    pub pfp_url: Option<String>,
    pub role: ParticipantRole,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

/// A persisted chat message
#[derive(Debug, Clone, PartialEq)]
pub struct MessageData {
    pub id: PrimaryKey,
    pub room_id: PrimaryKey,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A participation that has ended, joined with its room
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSessionData {
    /// The public id of the room
    pub room_id: String,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
    pub left_at: DateTime<Utc>,
}

impl From<ParticipantData> for Viewer {
    fn from(participant: ParticipantData) -> Self {
        Self {
            user_id: participant.user_id,
            user_name: Some(participant.username),
        }
    }
}

//! All schemas that are exposed from endpoints are defined here
//! along with the From<T> impls

use chrono::{DateTime, Utc};
use onair_collab::{
    ClaimOutcome, LatestSession as CollabLatestSession, MessageData, ParticipantData, RoomData,
    StreamingStatsData,
};
use serde::Serialize;
use utoipa::ToSchema;

/// A room record, with the datastore's column names
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Room {
    id: i32,
    room_id: String,
    host_user_id: String,
    host_username: String,
    host_pfp_url: Option<String>,
    /// created, live or ended
    status: String,
    current_viewers: i32,
    total_viewers: i32,
    created_at: DateTime<Utc>,
    stream_started_at: Option<DateTime<Utc>>,
    stream_ended_at: Option<DateTime<Utc>>,
    stream_duration: Option<i32>,
}

/// A live room as listed on the landing page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveRoom {
    room_id: String,
    host_username: String,
    current_viewers: i32,
    total_viewers: i32,
    created_at: DateTime<Utc>,
    stream_started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Participant {
    user_id: String,
    username: String,
    pfp_url: Option<String>,
    /// host or viewer
    role: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Message {
    id: i32,
    message: String,
    user_id: String,
    username: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomResponse {
    pub room: Room,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomsResponse {
    pub rooms: Vec<LiveRoom>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantsResponse {
    pub participants: Vec<Participant>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: Message,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClaimResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamingStats {
    eligible: bool,
    latest_session: Option<LatestSession>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LatestSession {
    room_id: String,
    role: String,
    /// In seconds
    duration: i64,
    completed_at: DateTime<Utc>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            room_id: self.room_id.clone(),
            host_user_id: self.host_user_id.clone(),
            host_username: self.host_username.clone(),
            host_pfp_url: self.host_pfp_url.clone(),
            status: self.status.to_string(),
            current_viewers: self.current_viewers,
            total_viewers: self.total_viewers,
            created_at: self.created_at,
            stream_started_at: self.stream_started_at,
            stream_ended_at: self.stream_ended_at,
            stream_duration: self.stream_duration,
        }
    }
}

impl ToSerialized<LiveRoom> for RoomData {
    fn to_serialized(&self) -> LiveRoom {
        LiveRoom {
            room_id: self.room_id.clone(),
            host_username: self.host_username.clone(),
            current_viewers: self.current_viewers,
            total_viewers: self.total_viewers,
            created_at: self.created_at,
            stream_started_at: self.stream_started_at,
        }
    }
}

impl ToSerialized<Participant> for ParticipantData {
    fn to_serialized(&self) -> Participant {
        Participant {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            pfp_url: self.pfp_url.clone(),
            role: self.role.to_string(),
        }
    }
}

impl ToSerialized<Message> for MessageData {
    fn to_serialized(&self) -> Message {
        Message {
            id: self.id,
            message: self.message.clone(),
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<StreamingStats> for StreamingStatsData {
    fn to_serialized(&self) -> StreamingStats {
        StreamingStats {
            eligible: self.eligible,
            latest_session: self.latest_session.to_serialized(),
        }
    }
}

impl ToSerialized<LatestSession> for CollabLatestSession {
    fn to_serialized(&self) -> LatestSession {
        LatestSession {
            room_id: self.room_id.clone(),
            role: self.role.to_string(),
            duration: self.duration,
            completed_at: self.completed_at,
        }
    }
}

impl ToSerialized<ClaimResponse> for ClaimOutcome {
    fn to_serialized(&self) -> ClaimResponse {
        ClaimResponse {
            success: self.success,
            message: self.message.clone(),
            error: self.error.clone(),
        }
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onair_core::{ParticipantRole, RoomStatus};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult<T> {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;

    /// Turns a not found error into None
    fn optional(self) -> Result<Option<T>>;
}

impl<T> DatabaseResult<T> for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound {
                    resource: _,
                    identifier: _,
                } => Ok(()),
                e => Err(e),
            },
        }
    }

    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(DatabaseError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can store onair rooms, participants and messages
#[async_trait]
pub trait Database: Send + Sync {
    async fn room_by_id(&self, id: PrimaryKey) -> Result<RoomData>;
    async fn room_by_room_id(&self, room_id: &str) -> Result<RoomData>;
    /// Rooms with status live, most recently started first
    async fn list_live_rooms(&self) -> Result<Vec<RoomData>>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    /// Applies a status change if the room is still in one of the `from` statuses.
    /// Returns [DatabaseError::NotFound] if it isn't.
    async fn update_room_status(&self, update: RoomStatusUpdate) -> Result<RoomData>;
    /// Recomputes `current_viewers` from the active participants in one statement
    async fn refresh_viewer_count(&self, id: PrimaryKey) -> Result<i32>;
    async fn increment_total_viewers(&self, id: PrimaryKey) -> Result<i32>;

    async fn active_participant(
        &self,
        room_id: PrimaryKey,
        user_id: &str,
    ) -> Result<ParticipantData>;
    async fn active_participants(&self, room_id: PrimaryKey) -> Result<Vec<ParticipantData>>;
    async fn create_participant(&self, new_participant: NewParticipant)
        -> Result<ParticipantData>;
    /// Marks active participants as left, all of them if `user_id` is None.
    /// Returns how many rows changed.
    async fn deactivate_participants(
        &self,
        room_id: PrimaryKey,
        user_id: Option<&str>,
        left_at: DateTime<Utc>,
    ) -> Result<u64>;

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData>;
    /// The newest messages of a room, newest first
    async fn recent_messages(&self, room_id: PrimaryKey, limit: i64) -> Result<Vec<MessageData>>;

    /// The most recently completed participation of a user lasting at least `min_seconds`
    async fn latest_completed_session(
        &self,
        user_id: &str,
        min_seconds: i64,
    ) -> Result<CompletedSessionData>;
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub room_id: String,
    pub host_user_id: String,
    pub host_username: String,
    pub host_pfp_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RoomStatusUpdate {
    pub id: PrimaryKey,
    /// The statuses the room may be in for the update to apply
    pub from: Vec<RoomStatus>,
    pub to: RoomStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub room_id: PrimaryKey,
    pub user_id: String,
    pub username: String,
    pub pfp_url: Option<String>,
    pub role: ParticipantRole,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: PrimaryKey,
    pub user_id: String,
    pub username: String,
    pub message: String,
}

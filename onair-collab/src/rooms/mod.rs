mod messages;
mod roster;

use chrono::Utc;
use log::{error, info};
use onair_core::{ParticipantRole, RoomStatus};
use thiserror::Error;

pub use roster::*;

use crate::{
    CollabContext, CollabEvent, DatabaseError, NewRoom, RoomData, RoomStatusUpdate,
};

pub type RoomResult<T> = Result<T, RoomError>;

/// Creates rooms and moves them through their lifecycle
pub struct RoomManager {
    context: CollabContext,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,
    #[error("Room not found or not live")]
    NotLive,
    #[error("Room {room_id} can't go from {from} to {to}")]
    InvalidTransition {
        room_id: String,
        from: RoomStatus,
        to: RoomStatus,
    },
    #[error("Message must be between 1 and {max} characters")]
    InvalidMessage { max: usize },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl RoomManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new room in the created status
    pub async fn create_room(&self, new_room: NewRoom) -> RoomResult<RoomData> {
        let room = self.context.database.create_room(new_room).await?;

        info!("Room {} created by {}", room.room_id, room.host_username);
        self.context
            .emit(CollabEvent::RoomCreated { room: room.clone() });

        Ok(room)
    }

    /// Gets a room by its public id
    pub async fn room(&self, room_id: &str) -> RoomResult<RoomData> {
        self.context
            .database
            .room_by_room_id(room_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => RoomError::NotFound,
                e => e.into(),
            })
    }

    /// All rooms currently live, most recently started first
    pub async fn live_rooms(&self) -> RoomResult<Vec<RoomData>> {
        Ok(self.context.database.list_live_rooms().await?)
    }

    /// Puts a room live and adds the host as its first participant
    pub async fn start_stream(&self, room_id: &str, host: Identity) -> RoomResult<RoomData> {
        let room = self.transition(room_id, RoomStatus::Live).await?;

        self.activate_participant(&room, host, ParticipantRole::Host)
            .await
            .map_err(|e| log_step_failure(&room, "adding host", e))?;

        self.refresh_viewer_count(&room)
            .await
            .map_err(|e| log_step_failure(&room, "counting viewers", e))?;

        info!("Room {} is live", room.room_id);
        Ok(self.context.database.room_by_id(room.id).await?)
    }

    /// Ends a room's stream and deactivates everyone in it
    pub async fn end_stream(&self, room_id: &str) -> RoomResult<RoomData> {
        let room = self.transition(room_id, RoomStatus::Ended).await?;

        self.deactivate_participants(&room, None)
            .await
            .map_err(|e| log_step_failure(&room, "deactivating participants", e))?;

        self.refresh_viewer_count(&room)
            .await
            .map_err(|e| log_step_failure(&room, "counting viewers", e))?;

        info!(
            "Room {} ended after {} seconds",
            room.room_id,
            room.stream_duration.unwrap_or_default()
        );
        Ok(self.context.database.room_by_id(room.id).await?)
    }

    /// Moves a room to `to` if its current status allows it.
    /// The status is checked again by the update itself, so a concurrent change is a conflict.
    async fn transition(&self, room_id: &str, to: RoomStatus) -> RoomResult<RoomData> {
        let room = self.room(room_id).await?;

        let invalid = || RoomError::InvalidTransition {
            room_id: room.room_id.clone(),
            from: room.status,
            to,
        };

        if !room.status.can_transition_to(to) {
            return Err(invalid());
        }

        let from = [RoomStatus::Created, RoomStatus::Live]
            .into_iter()
            .filter(|s| s.can_transition_to(to))
            .collect();

        let updated = self
            .context
            .database
            .update_room_status(RoomStatusUpdate {
                id: room.id,
                from,
                to,
                at: Utc::now(),
            })
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => invalid(),
                e => e.into(),
            })?;

        self.context.emit(CollabEvent::RoomStatusChanged {
            room_id: updated.room_id.clone(),
            status: updated.status,
        });

        Ok(updated)
    }
}

/// Later steps of an action don't undo earlier ones, so failures are logged with context
fn log_step_failure(room: &RoomData, step: &str, e: DatabaseError) -> RoomError {
    error!("Failed {} in room {}: {}", step, room.room_id, e);
    e.into()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{collab, identity, new_room};

    #[tokio::test]
    async fn test_create_room_conflicts_on_duplicate_id() {
        let collab = collab();

        let room = collab.rooms.create_room(new_room("abc")).await.unwrap();
        assert_eq!(room.status, RoomStatus::Created);
        assert_eq!(room.current_viewers, 0);

        let duplicate = collab.rooms.create_room(new_room("abc")).await;
        assert!(matches!(
            duplicate,
            Err(RoomError::Database(DatabaseError::Conflict { .. }))
        ));

        assert!(matches!(
            collab.rooms.room("missing").await,
            Err(RoomError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let collab = collab();
        collab.rooms.create_room(new_room("abc")).await.unwrap();

        let live = collab
            .rooms
            .start_stream("abc", identity("host_1"))
            .await
            .unwrap();

        assert_eq!(live.status, RoomStatus::Live);
        assert!(live.stream_started_at.is_some());
        assert_eq!(live.current_viewers, 1);
        assert_eq!(collab.rooms.live_rooms().await.unwrap().len(), 1);

        let restart = collab.rooms.start_stream("abc", identity("host_1")).await;
        assert!(matches!(restart, Err(RoomError::InvalidTransition { .. })));

        let ended = collab.rooms.end_stream("abc").await.unwrap();
        assert_eq!(ended.status, RoomStatus::Ended);
        assert_eq!(ended.current_viewers, 0);
        assert!(ended.stream_ended_at.is_some());
        assert!(ended.stream_duration.is_some());
        assert!(collab.rooms.live_rooms().await.unwrap().is_empty());
        assert!(collab.rooms.participants("abc").await.unwrap().is_empty());

        let revived = collab.rooms.start_stream("abc", identity("host_1")).await;
        assert!(matches!(revived, Err(RoomError::InvalidTransition { .. })));
        assert!(matches!(
            collab.rooms.end_stream("abc").await,
            Err(RoomError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_created_room_can_end_without_going_live() {
        let collab = collab();
        collab.rooms.create_room(new_room("abc")).await.unwrap();

        let ended = collab.rooms.end_stream("abc").await.unwrap();
        assert_eq!(ended.status, RoomStatus::Ended);
        assert_eq!(ended.stream_duration, None);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let collab = collab();
        collab.rooms.create_room(new_room("abc")).await.unwrap();
        collab
            .rooms
            .start_stream("abc", identity("host_1"))
            .await
            .unwrap();

        let events: Vec<_> = std::iter::from_fn(|| collab.try_next_event()).collect();

        assert!(matches!(events[0], CollabEvent::RoomCreated { .. }));
        assert!(matches!(
            events[1],
            CollabEvent::RoomStatusChanged {
                status: RoomStatus::Live,
                ..
            }
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, CollabEvent::ParticipantJoined { .. })));
        assert!(events.iter().all(|e| e.room_id() == "abc"));
    }
}

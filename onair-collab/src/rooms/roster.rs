use chrono::Utc;
use log::info;
use onair_core::{ParticipantRole, RoomStatus};

use crate::{
    CollabEvent, DatabaseError, DatabaseResult, NewParticipant, ParticipantData, RoomData,
};

use super::{RoomError, RoomManager, RoomResult};

/// Who is joining a room
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub pfp_url: Option<String>,
}

impl RoomManager {
    /// Adds a viewer to a live room. Joining again returns the existing participant.
    pub async fn join_viewer(
        &self,
        room_id: &str,
        viewer: Identity,
    ) -> RoomResult<ParticipantData> {
        let room = match self.room(room_id).await {
            Ok(room) if room.status == RoomStatus::Live => room,
            Ok(_) | Err(RoomError::NotFound) => return Err(RoomError::NotLive),
            Err(e) => return Err(e),
        };

        let (participant, is_new) = self
            .activate_participant(&room, viewer, ParticipantRole::Viewer)
            .await?;

        if is_new {
            self.context
                .database
                .increment_total_viewers(room.id)
                .await
                .map_err(|e| super::log_step_failure(&room, "counting total viewers", e))?;
        }

        self.refresh_viewer_count(&room)
            .await
            .map_err(|e| super::log_step_failure(&room, "counting viewers", e))?;

        Ok(participant)
    }

    /// Marks a user as having left a room
    pub async fn leave_viewer(&self, room_id: &str, user_id: &str) -> RoomResult<()> {
        let room = self.room(room_id).await?;

        self.deactivate_participants(&room, Some(user_id)).await?;

        self.refresh_viewer_count(&room)
            .await
            .map_err(|e| super::log_step_failure(&room, "counting viewers", e))?;

        Ok(())
    }

    /// The active participants of a room, in join order
    pub async fn participants(&self, room_id: &str) -> RoomResult<Vec<ParticipantData>> {
        let room = self.room(room_id).await?;

        Ok(self.context.database.active_participants(room.id).await?)
    }

    /// Returns the user's active participant row, creating it if needed.
    /// The boolean is true if the row is new.
    pub(super) async fn activate_participant(
        &self,
        room: &RoomData,
        identity: Identity,
        role: ParticipantRole,
    ) -> Result<(ParticipantData, bool), DatabaseError> {
        let database = &self.context.database;

        let existing = database
            .active_participant(room.id, &identity.user_id)
            .await
            .optional()?;

        if let Some(participant) = existing {
            return Ok((participant, false));
        }

        let new_participant = NewParticipant {
            room_id: room.id,
            user_id: identity.user_id,
            username: identity.username,
            pfp_url: identity.pfp_url,
            role,
        };

        let participant = match database.create_participant(new_participant.clone()).await {
            Ok(participant) => participant,
            // Someone else inserted the same user in between
            Err(DatabaseError::Conflict { .. }) => {
                let participant = database
                    .active_participant(room.id, &new_participant.user_id)
                    .await?;

                return Ok((participant, false));
            }
            Err(e) => return Err(e),
        };

        info!(
            "{} joined room {} as {}",
            participant.username, room.room_id, participant.role
        );

        self.context.emit(CollabEvent::ParticipantJoined {
            room_id: room.room_id.clone(),
            participant: participant.clone(),
        });

        Ok((participant, true))
    }

    pub(super) async fn deactivate_participants(
        &self,
        room: &RoomData,
        user_id: Option<&str>,
    ) -> Result<u64, DatabaseError> {
        let changed = self
            .context
            .database
            .deactivate_participants(room.id, user_id, Utc::now())
            .await?;

        if changed > 0 {
            self.context.emit(CollabEvent::ParticipantLeft {
                room_id: room.room_id.clone(),
                user_id: user_id.map(ToString::to_string),
            });
        }

        Ok(changed)
    }

    /// Recomputes the room's current viewers from its active participants
    pub(super) async fn refresh_viewer_count(&self, room: &RoomData) -> Result<i32, DatabaseError> {
        let database = &self.context.database;

        let current_viewers = database.refresh_viewer_count(room.id).await?;
        let total_viewers = database.room_by_id(room.id).await?.total_viewers;

        self.context.emit(CollabEvent::ViewerCountChanged {
            room_id: room.room_id.clone(),
            current_viewers,
            total_viewers,
        });

        Ok(current_viewers)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{collab, identity, new_room};

    #[tokio::test]
    async fn test_join_requires_live_room() {
        let collab = collab();
        collab.rooms.create_room(new_room("abc")).await.unwrap();

        let early = collab.rooms.join_viewer("abc", identity("v1")).await;
        assert!(matches!(early, Err(RoomError::NotLive)));

        let missing = collab.rooms.join_viewer("nope", identity("v1")).await;
        assert!(matches!(missing, Err(RoomError::NotLive)));
    }

    #[tokio::test]
    async fn test_viewer_counts() {
        let collab = collab();
        collab.rooms.create_room(new_room("abc")).await.unwrap();
        collab
            .rooms
            .start_stream("abc", identity("host_1"))
            .await
            .unwrap();

        let first = collab.rooms.join_viewer("abc", identity("v1")).await.unwrap();
        let again = collab.rooms.join_viewer("abc", identity("v1")).await.unwrap();
        collab.rooms.join_viewer("abc", identity("v2")).await.unwrap();

        // A repeated join returns the same row
        assert_eq!(first.id, again.id);
        assert_eq!(first.role, ParticipantRole::Viewer);

        let room = collab.rooms.room("abc").await.unwrap();
        assert_eq!(room.current_viewers, 3);
        assert_eq!(room.total_viewers, 2);

        let participants = collab.rooms.participants("abc").await.unwrap();
        let ids: Vec<_> = participants.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["host_1", "v1", "v2"]);

        collab.rooms.leave_viewer("abc", "v1").await.unwrap();
        let room = collab.rooms.room("abc").await.unwrap();
        assert_eq!(room.current_viewers, 2);
        assert_eq!(room.total_viewers, 2);

        // Leaving twice is harmless
        collab.rooms.leave_viewer("abc", "v1").await.unwrap();
        assert_eq!(collab.rooms.participants("abc").await.unwrap().len(), 2);

        // Rejoining after leaving counts as a new viewer
        collab.rooms.join_viewer("abc", identity("v1")).await.unwrap();
        let room = collab.rooms.room("abc").await.unwrap();
        assert_eq!(room.current_viewers, 3);
        assert_eq!(room.total_viewers, 3);
    }

    #[tokio::test]
    async fn test_leave_unknown_room() {
        let collab = collab();

        let result = collab.rooms.leave_viewer("nope", "v1").await;
        assert!(matches!(result, Err(RoomError::NotFound)));
    }
}

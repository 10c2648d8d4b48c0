use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onair_core::{is_eligible_session, RoomStatus};
use parking_lot::Mutex;

use crate::{
    CompletedSessionData, Database, DatabaseError, MessageData, NewMessage, NewParticipant,
    NewRoom, ParticipantData, PrimaryKey, Result, RoomData, RoomStatusUpdate,
};

/// A database kept in process memory. Used for tests and when no postgres url is configured.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    last_id: PrimaryKey,
    rooms: Vec<RoomData>,
    participants: Vec<ParticipantData>,
    messages: Vec<MessageData>,
}

impl Tables {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn room_mut(&mut self, id: PrimaryKey) -> Result<&mut RoomData> {
        self.rooms
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            })
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn room_by_id(&self, id: PrimaryKey) -> Result<RoomData> {
        self.tables.lock().room_mut(id).map(|r| r.clone())
    }

    async fn room_by_room_id(&self, room_id: &str) -> Result<RoomData> {
        self.tables
            .lock()
            .rooms
            .iter()
            .find(|r| r.room_id == room_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "room_id",
            })
    }

    async fn list_live_rooms(&self) -> Result<Vec<RoomData>> {
        let mut rooms: Vec<_> = self
            .tables
            .lock()
            .rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Live)
            .cloned()
            .collect();

        rooms.sort_by(|a, b| b.stream_started_at.cmp(&a.stream_started_at));
        Ok(rooms)
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let mut tables = self.tables.lock();

        if tables.rooms.iter().any(|r| r.room_id == new_room.room_id) {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "room_id",
                value: new_room.room_id,
            });
        }

        let room = RoomData {
            id: tables.next_id(),
            room_id: new_room.room_id,
            host_user_id: new_room.host_user_id,
            host_username: new_room.host_username,
            host_pfp_url: new_room.host_pfp_url,
            status: RoomStatus::Created,
            current_viewers: 0,
            total_viewers: 0,
            created_at: Utc::now(),
            stream_started_at: None,
            stream_ended_at: None,
            stream_duration: None,
        };

        tables.rooms.push(room.clone());
        Ok(room)
    }

    async fn update_room_status(&self, update: RoomStatusUpdate) -> Result<RoomData> {
        let mut tables = self.tables.lock();
        let room = tables.room_mut(update.id)?;

        if !update.from.contains(&room.status) {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id:status",
            });
        }

        match update.to {
            RoomStatus::Live => room.stream_started_at = Some(update.at),
            RoomStatus::Ended => {
                room.stream_ended_at = Some(update.at);
                room.stream_duration = room
                    .stream_started_at
                    .map(|started| (update.at - started).num_seconds() as i32);
            }
            RoomStatus::Created => {
                return Err(DatabaseError::Internal(
                    "rooms never move back to created".into(),
                ))
            }
        }

        room.status = update.to;
        Ok(room.clone())
    }

    async fn refresh_viewer_count(&self, id: PrimaryKey) -> Result<i32> {
        let mut tables = self.tables.lock();

        let count = tables
            .participants
            .iter()
            .filter(|p| p.room_id == id && p.is_active)
            .count() as i32;

        let room = tables.room_mut(id)?;
        room.current_viewers = count;

        Ok(count)
    }

    async fn increment_total_viewers(&self, id: PrimaryKey) -> Result<i32> {
        let mut tables = self.tables.lock();
        let room = tables.room_mut(id)?;

        room.total_viewers += 1;
        Ok(room.total_viewers)
    }

    async fn active_participant(
        &self,
        room_id: PrimaryKey,
        user_id: &str,
    ) -> Result<ParticipantData> {
        self.tables
            .lock()
            .participants
            .iter()
            .find(|p| p.room_id == room_id && p.user_id == user_id && p.is_active)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "participant",
                identifier: "room_id:user_id",
            })
    }

    async fn active_participants(&self, room_id: PrimaryKey) -> Result<Vec<ParticipantData>> {
        Ok(self
            .tables
            .lock()
            .participants
            .iter()
            .filter(|p| p.room_id == room_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn create_participant(
        &self,
        new_participant: NewParticipant,
    ) -> Result<ParticipantData> {
        let mut tables = self.tables.lock();
        tables.room_mut(new_participant.room_id)?;

        let is_duplicate = tables.participants.iter().any(|p| {
            p.room_id == new_participant.room_id
                && p.user_id == new_participant.user_id
                && p.is_active
        });

        if is_duplicate {
            return Err(DatabaseError::Conflict {
                resource: "participant",
                field: "room_id:user_id",
                value: format!("{}:{}", new_participant.room_id, new_participant.user_id),
            });
        }

        let participant = ParticipantData {
            id: tables.next_id(),
            room_id: new_participant.room_id,
            user_id: new_participant.user_id,
            username: new_participant.username,
            pfp_url: new_participant.pfp_url,
            role: new_participant.role,
            is_active: true,
            joined_at: Utc::now(),
            left_at: None,
        };

        tables.participants.push(participant.clone());
        Ok(participant)
    }

    async fn deactivate_participants(
        &self,
        room_id: PrimaryKey,
        user_id: Option<&str>,
        left_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut changed = 0;

        let mut tables = self.tables.lock();
        let matching = tables.participants.iter_mut().filter(|p| {
            p.room_id == room_id && p.is_active && user_id.map_or(true, |u| p.user_id == u)
        });

        for participant in matching {
            participant.is_active = false;
            participant.left_at = Some(left_at);
            changed += 1;
        }

        Ok(changed)
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        let mut tables = self.tables.lock();
        tables.room_mut(new_message.room_id)?;

        let message = MessageData {
            id: tables.next_id(),
            room_id: new_message.room_id,
            user_id: new_message.user_id,
            username: new_message.username,
            message: new_message.message,
            created_at: Utc::now(),
        };

        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn recent_messages(&self, room_id: PrimaryKey, limit: i64) -> Result<Vec<MessageData>> {
        // Messages are appended in creation order
        Ok(self
            .tables
            .lock()
            .messages
            .iter()
            .rev()
            .filter(|m| m.room_id == room_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn latest_completed_session(
        &self,
        user_id: &str,
        min_seconds: i64,
    ) -> Result<CompletedSessionData> {
        let tables = self.tables.lock();

        tables
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| {
                let left_at = p.left_at?;
                let long_enough = is_eligible_session(p.joined_at, left_at, min_seconds);
                let room = tables.rooms.iter().find(|r| r.id == p.room_id)?;

                long_enough.then(|| CompletedSessionData {
                    room_id: room.room_id.clone(),
                    role: p.role,
                    joined_at: p.joined_at,
                    left_at,
                })
            })
            .max_by_key(|s| s.left_at)
            .ok_or(DatabaseError::NotFound {
                resource: "completed session",
                identifier: "user_id",
            })
    }
}

#[cfg(test)]
impl MemoryDatabase {
    /// Moves a participant's join time, so session lengths can be tested without waiting
    pub fn backdate_participant(&self, id: PrimaryKey, seconds: i64) {
        let mut tables = self.tables.lock();

        if let Some(p) = tables.participants.iter_mut().find(|p| p.id == id) {
            p.joined_at -= chrono::Duration::seconds(seconds);
        }
    }
}

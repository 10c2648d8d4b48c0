use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onair_core::RoomStatus;
use sqlx::{
    postgres::PgPoolOptions, query, query_as, query_scalar, Error as SqlxError, FromRow, PgPool,
};

use crate::{
    CompletedSessionData, Database, DatabaseError, DatabaseResult, IntoDatabaseError,
    MessageData, NewMessage, NewParticipant, NewRoom, ParticipantData, PrimaryKey, Result,
    RoomData, RoomStatusUpdate,
};

/// A postgres database implementation for onair
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(FromRow)]
struct RoomRow {
    id: i32,
    room_id: String,
    host_user_id: String,
    host_username: String,
    host_pfp_url: Option<String>,
    status: String,
    current_viewers: i32,
    total_viewers: i32,
    created_at: DateTime<Utc>,
    stream_started_at: Option<DateTime<Utc>>,
    stream_ended_at: Option<DateTime<Utc>>,
    stream_duration: Option<i32>,
}

#[derive(FromRow)]
struct ParticipantRow {
    id: i32,
    room_id: i32,
    user_id: String,
    username: String,
    pfp_url: Option<String>,
    role: String,
    is_active: bool,
    joined_at: DateTime<Utc>,
    left_at: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct MessageRow {
    id: i32,
    room_id: i32,
    user_id: String,
    username: String,
    message: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CompletedSessionRow {
    room_id: String,
    role: String,
    joined_at: DateTime<Utc>,
    left_at: DateTime<Utc>,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        Ok(Self { pool })
    }

    /// Brings the schema up to date
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn room_by_id(&self, id: PrimaryKey) -> Result<RoomData> {
        query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))?
            .try_into()
    }

    async fn room_by_room_id(&self, room_id: &str) -> Result<RoomData> {
        query_as::<_, RoomRow>("SELECT * FROM rooms WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "room_id"))?
            .try_into()
    }

    async fn list_live_rooms(&self) -> Result<Vec<RoomData>> {
        query_as::<_, RoomRow>(
            "SELECT * FROM rooms WHERE status = 'live' ORDER BY stream_started_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?
        .into_iter()
        .map(RoomData::try_from)
        .collect()
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        self.room_by_room_id(&new_room.room_id)
            .await
            .conflict_or_ok("room", "room_id", &new_room.room_id)?;

        query_as::<_, RoomRow>(
            "
            INSERT INTO rooms (room_id, host_user_id, host_username, host_pfp_url, status)
            VALUES ($1, $2, $3, $4, 'created')
            RETURNING *",
        )
        .bind(&new_room.room_id)
        .bind(&new_room.host_user_id)
        .bind(&new_room.host_username)
        .bind(&new_room.host_pfp_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or("room", "room_id", &new_room.room_id))?
        .try_into()
    }

    async fn update_room_status(&self, update: RoomStatusUpdate) -> Result<RoomData> {
        let from: Vec<String> = update.from.iter().map(|s| s.to_string()).collect();

        // The timestamp column and duration depend on the target status
        let statement = match update.to {
            RoomStatus::Live => {
                "
                UPDATE rooms SET status = 'live', stream_started_at = $3
                WHERE id = $1 AND status = ANY($2)
                RETURNING *"
            }
            RoomStatus::Ended => {
                "
                UPDATE rooms SET
                    status = 'ended',
                    stream_ended_at = $3,
                    stream_duration = EXTRACT(EPOCH FROM ($3 - stream_started_at))::INTEGER
                WHERE id = $1 AND status = ANY($2)
                RETURNING *"
            }
            RoomStatus::Created => {
                return Err(DatabaseError::Internal(
                    "rooms never move back to created".into(),
                ))
            }
        };

        query_as::<_, RoomRow>(statement)
            .bind(update.id)
            .bind(from)
            .bind(update.at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id:status"))?
            .try_into()
    }

    async fn refresh_viewer_count(&self, id: PrimaryKey) -> Result<i32> {
        query_scalar::<_, i32>(
            "
            UPDATE rooms SET current_viewers = (
                SELECT COUNT(*) FROM room_participants
                WHERE room_id = $1 AND is_active = true
            )
            WHERE id = $1
            RETURNING current_viewers",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn increment_total_viewers(&self, id: PrimaryKey) -> Result<i32> {
        query_scalar::<_, i32>(
            "UPDATE rooms SET total_viewers = total_viewers + 1 WHERE id = $1 RETURNING total_viewers",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn active_participant(
        &self,
        room_id: PrimaryKey,
        user_id: &str,
    ) -> Result<ParticipantData> {
        query_as::<_, ParticipantRow>(
            "SELECT * FROM room_participants WHERE room_id = $1 AND user_id = $2 AND is_active = true",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("participant", "room_id:user_id"))?
        .try_into()
    }

    async fn active_participants(&self, room_id: PrimaryKey) -> Result<Vec<ParticipantData>> {
        query_as::<_, ParticipantRow>(
            "SELECT * FROM room_participants WHERE room_id = $1 AND is_active = true ORDER BY joined_at",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?
        .into_iter()
        .map(ParticipantData::try_from)
        .collect()
    }

    async fn create_participant(
        &self,
        new_participant: NewParticipant,
    ) -> Result<ParticipantData> {
        let NewParticipant {
            room_id,
            user_id,
            username,
            pfp_url,
            role,
        } = new_participant;

        query_as::<_, ParticipantRow>(
            "
            INSERT INTO room_participants (room_id, user_id, username, pfp_url, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(room_id)
        .bind(&user_id)
        .bind(&username)
        .bind(&pfp_url)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let value = format!("{}:{}", room_id, user_id);
            e.conflict_or("participant", "room_id:user_id", &value)
        })?
        .try_into()
    }

    async fn deactivate_participants(
        &self,
        room_id: PrimaryKey,
        user_id: Option<&str>,
        left_at: DateTime<Utc>,
    ) -> Result<u64> {
        query(
            "
            UPDATE room_participants SET is_active = false, left_at = $2
            WHERE room_id = $1 AND is_active = true AND ($3::TEXT IS NULL OR user_id = $3)",
        )
        .bind(room_id)
        .bind(left_at)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|r| r.rows_affected())
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        query_as::<_, MessageRow>(
            "
            INSERT INTO stream_messages (room_id, user_id, username, message)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(new_message.room_id)
        .bind(&new_message.user_id)
        .bind(&new_message.username)
        .bind(&new_message.message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(Into::into)
    }

    async fn recent_messages(&self, room_id: PrimaryKey, limit: i64) -> Result<Vec<MessageData>> {
        let rows = query_as::<_, MessageRow>(
            "SELECT * FROM stream_messages WHERE room_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn latest_completed_session(
        &self,
        user_id: &str,
        min_seconds: i64,
    ) -> Result<CompletedSessionData> {
        query_as::<_, CompletedSessionRow>(
            "
            SELECT rooms.room_id, participants.role, participants.joined_at, participants.left_at
            FROM room_participants AS participants
                INNER JOIN rooms ON participants.room_id = rooms.id
            WHERE participants.user_id = $1
                AND participants.left_at IS NOT NULL
                AND participants.left_at - participants.joined_at >= make_interval(secs => $2)
            ORDER BY participants.left_at DESC
            LIMIT 1",
        )
        .bind(user_id)
        .bind(min_seconds as f64)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("completed session", "user_id"))?
        .try_into()
    }
}

impl TryFrom<RoomRow> for RoomData {
    type Error = DatabaseError;

    fn try_from(row: RoomRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            room_id: row.room_id,
            host_user_id: row.host_user_id,
            host_username: row.host_username,
            host_pfp_url: row.host_pfp_url,
            status: row.status.parse().map_err(|e| DatabaseError::Internal(Box::new(e)))?,
            current_viewers: row.current_viewers,
            total_viewers: row.total_viewers,
            created_at: row.created_at,
            stream_started_at: row.stream_started_at,
            stream_ended_at: row.stream_ended_at,
            stream_duration: row.stream_duration,
        })
    }
}

impl TryFrom<ParticipantRow> for ParticipantData {
    type Error = DatabaseError;

    fn try_from(row: ParticipantRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            room_id: row.room_id,
            user_id: row.user_id,
            username: row.username,
            pfp_url: row.pfp_url,
            role: row.role.parse().map_err(|e| DatabaseError::Internal(Box::new(e)))?,
            is_active: row.is_active,
            joined_at: row.joined_at,
            left_at: row.left_at,
        })
    }
}

impl TryFrom<CompletedSessionRow> for CompletedSessionData {
    type Error = DatabaseError;

    fn try_from(row: CompletedSessionRow) -> Result<Self> {
        Ok(Self {
            room_id: row.room_id,
            role: row.role.parse().map_err(|e| DatabaseError::Internal(Box::new(e)))?,
            joined_at: row.joined_at,
            left_at: row.left_at,
        })
    }
}

impl From<MessageRow> for MessageData {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            room_id: row.room_id,
            user_id: row.user_id,
            username: row.username,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }

    fn conflict_or(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        match &self {
            SqlxError::Database(e) if e.is_unique_violation() => DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            },
            _ => self.any(),
        }
    }
}

use chrono::{DateTime, Utc};
use onair_core::{session_duration, ParticipantRole};

use crate::{CollabContext, DatabaseResult, Result};

/// Answers whether a user has streamed or watched long enough to claim
pub struct StreamingStats {
    context: CollabContext,
}

/// A user's claim eligibility
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingStatsData {
    pub eligible: bool,
    pub latest_session: Option<LatestSession>,
}

/// The latest participation that qualifies for a claim
#[derive(Debug, Clone, PartialEq)]
pub struct LatestSession {
    pub room_id: String,
    pub role: ParticipantRole,
    /// In seconds
    pub duration: i64,
    pub completed_at: DateTime<Utc>,
}

impl StreamingStats {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn for_user(&self, user_id: &str) -> Result<StreamingStatsData> {
        let threshold = self.context.config.eligibility_threshold_in_seconds();

        let latest_session = self
            .context
            .database
            .latest_completed_session(user_id, threshold)
            .await
            .optional()?
            .map(|session| LatestSession {
                room_id: session.room_id,
                role: session.role,
                duration: session_duration(session.joined_at, session.left_at),
                completed_at: session.left_at,
            });

        Ok(StreamingStatsData {
            eligible: latest_session.is_some(),
            latest_session,
        })
    }
}

#[cfg(test)]
mod test {
    use crate::test_util::{collab_with_database, identity, new_room};

    #[tokio::test]
    async fn test_short_and_active_sessions_do_not_count() {
        let (collab, database) = collab_with_database();
        collab.rooms.create_room(new_room("abc")).await.unwrap();
        collab
            .rooms
            .start_stream("abc", identity("host_1"))
            .await
            .unwrap();

        let viewer = collab.rooms.join_viewer("abc", identity("v1")).await.unwrap();
        database.backdate_participant(viewer.id, 300);

        // Still watching
        let stats = collab.stats.for_user("v1").await.unwrap();
        assert!(!stats.eligible);
        assert!(stats.latest_session.is_none());

        collab.rooms.join_viewer("abc", identity("v2")).await.unwrap();
        collab.rooms.leave_viewer("abc", "v2").await.unwrap();

        // Left right away
        assert!(!collab.stats.for_user("v2").await.unwrap().eligible);
    }

    #[tokio::test]
    async fn test_long_session_is_eligible() {
        let (collab, database) = collab_with_database();
        collab.rooms.create_room(new_room("abc")).await.unwrap();
        let room = collab
            .rooms
            .start_stream("abc", identity("host_1"))
            .await
            .unwrap();

        let host = collab.rooms.participants("abc").await.unwrap().remove(0);
        database.backdate_participant(host.id, 120);
        collab.rooms.end_stream(&room.room_id).await.unwrap();

        let stats = collab.stats.for_user("host_1").await.unwrap();
        let session = stats.latest_session.unwrap();

        assert!(stats.eligible);
        assert_eq!(session.room_id, "abc");
        assert_eq!(session.role, onair_core::ParticipantRole::Host);
        assert!(session.duration >= 120);
    }
}

use crate::{CollabEvent, MessageData, NewMessage};

use super::{RoomError, RoomManager, RoomResult};

impl RoomManager {
    /// The latest messages of a room, oldest first
    pub async fn messages(&self, room_id: &str) -> RoomResult<Vec<MessageData>> {
        let room = self.room(room_id).await?;
        let limit = self.context.config.message_history_limit as i64;

        let mut messages = self
            .context
            .database
            .recent_messages(room.id, limit)
            .await?;

        messages.reverse();
        Ok(messages)
    }

    /// Persists a chat message
    pub async fn post_message(
        &self,
        room_id: &str,
        user_id: String,
        username: String,
        message: String,
    ) -> RoomResult<MessageData> {
        let max = self.context.config.max_message_length;
        let length = message.trim().chars().count();

        if length == 0 || length > max {
            return Err(RoomError::InvalidMessage { max });
        }

        let room = self.room(room_id).await?;

        let message = self
            .context
            .database
            .create_message(NewMessage {
                room_id: room.id,
                user_id,
                username,
                message: message.trim().to_string(),
            })
            .await?;

        self.context.emit(CollabEvent::MessagePosted {
            room_id: room.room_id,
            message: message.clone(),
        });

        Ok(message)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{collab, new_room};

    #[tokio::test]
    async fn test_history_keeps_the_latest_oldest_first() {
        let collab = collab();
        collab.rooms.create_room(new_room("abc")).await.unwrap();

        for i in 0..55 {
            collab
                .rooms
                .post_message("abc", "u1".into(), "Ann".into(), format!("message {}", i))
                .await
                .unwrap();
        }

        let messages = collab.rooms.messages("abc").await.unwrap();

        assert_eq!(messages.len(), 50);
        assert_eq!(messages[0].message, "message 5");
        assert_eq!(messages[49].message, "message 54");
    }

    #[tokio::test]
    async fn test_message_length() {
        let collab = collab();
        collab.rooms.create_room(new_room("abc")).await.unwrap();

        let post = |text: String| {
            collab
                .rooms
                .post_message("abc", "u1".into(), "Ann".into(), text)
        };

        assert!(matches!(
            post("   ".into()).await,
            Err(RoomError::InvalidMessage { max: 100 })
        ));
        assert!(post("x".repeat(101)).await.is_err());
        assert_eq!(post(" hi ".into()).await.unwrap().message, "hi");

        let missing = collab
            .rooms
            .post_message("nope", "u1".into(), "Ann".into(), "hi".into())
            .await;
        assert!(matches!(missing, Err(RoomError::NotFound)));
    }
}

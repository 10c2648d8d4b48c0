use crossbeam::channel::{Receiver, Sender};
use onair_core::RoomStatus;

use crate::{MessageData, ParticipantData, RoomData};

pub type EventSender = Sender<CollabEvent>;
pub type EventReceiver = Receiver<CollabEvent>;

/// Events emitted when rooms change
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// A room was created
    RoomCreated { room: RoomData },
    /// A room went live or ended
    RoomStatusChanged {
        room_id: String,
        status: RoomStatus,
    },
    /// A host or viewer became active in a room
    ParticipantJoined {
        room_id: String,
        participant: ParticipantData,
    },
    /// A user left a room, or everyone did if `user_id` is None
    ParticipantLeft {
        room_id: String,
        user_id: Option<String>,
    },
    /// A room's viewer counts were recomputed
    ViewerCountChanged {
        room_id: String,
        current_viewers: i32,
        total_viewers: i32,
    },
    /// A chat message was persisted
    MessagePosted {
        room_id: String,
        message: MessageData,
    },
}

impl CollabEvent {
    /// The public id of the room the event is about
    pub fn room_id(&self) -> &str {
        match self {
            Self::RoomCreated { room } => &room.room_id,
            Self::RoomStatusChanged { room_id, .. }
            | Self::ParticipantJoined { room_id, .. }
            | Self::ParticipantLeft { room_id, .. }
            | Self::ViewerCountChanged { room_id, .. }
            | Self::MessagePosted { room_id, .. } => room_id,
        }
    }
}

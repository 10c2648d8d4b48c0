use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use futures_util::Stream;
use log::{debug, error};
use onair_collab::CollabEvent;
use onair_core::Id;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::VecDeque,
    convert::Infallible,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};
use utoipa::ToSchema;

use crate::{
    context::ServerContext,
    schemas::EventsQuery,
    serialized::{Message, Participant, Room, ToSerialized},
    Router,
};

type ConnectionId = Id<Connection>;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// A room was created
    RoomCreated { room_id: String, room: Room },
    /// A room went live or ended
    RoomStatusChanged { room_id: String, status: String },
    /// A host or viewer became active in a room
    ParticipantJoined {
        room_id: String,
        participant: Participant,
    },
    /// A user left a room. Everyone left if `user_id` is null.
    ParticipantLeft {
        room_id: String,
        user_id: Option<String>,
    },
    /// A room's viewer counts changed
    ViewerCountChanged {
        room_id: String,
        current_viewers: i32,
        total_viewers: i32,
    },
    /// A chat message was posted
    MessagePosted { room_id: String, message: Message },
}

impl ServerEvent {
    pub fn room_id(&self) -> &str {
        match self {
            Self::RoomCreated { room_id, .. }
            | Self::RoomStatusChanged { room_id, .. }
            | Self::ParticipantJoined { room_id, .. }
            | Self::ParticipantLeft { room_id, .. }
            | Self::ViewerCountChanged { room_id, .. }
            | Self::MessagePosted { room_id, .. } => room_id,
        }
    }
}

impl From<CollabEvent> for ServerEvent {
    fn from(value: CollabEvent) -> Self {
        match value {
            CollabEvent::RoomCreated { room } => Self::RoomCreated {
                room_id: room.room_id.clone(),
                room: room.to_serialized(),
            },
            CollabEvent::RoomStatusChanged { room_id, status } => Self::RoomStatusChanged {
                room_id,
                status: status.to_string(),
            },
            CollabEvent::ParticipantJoined {
                room_id,
                participant,
            } => Self::ParticipantJoined {
                room_id,
                participant: participant.to_serialized(),
            },
            CollabEvent::ParticipantLeft { room_id, user_id } => {
                Self::ParticipantLeft { room_id, user_id }
            }
            CollabEvent::ViewerCountChanged {
                room_id,
                current_viewers,
                total_viewers,
            } => Self::ViewerCountChanged {
                room_id,
                current_viewers,
                total_viewers,
            },
            CollabEvent::MessagePosted { room_id, message } => Self::MessagePosted {
                room_id,
                message: message.to_serialized(),
            },
        }
    }
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    /// Only events of this room are sent, if set
    room_id: Option<String>,
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    pub fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.lock();

        for connection in connections.iter().filter(|c| c.wants(&event)) {
            connection.send(event.clone())
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    fn connect(&self, room_id: Option<String>) -> ConnectionHandle {
        let connection = Connection::new(room_id);
        let handle = connection.handle(self.me.clone());

        debug!("SSE connection {} opened", connection.id);
        self.connections.lock().push(connection);
        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        debug!("SSE connection {} closed", id);
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl Connection {
    fn new(room_id: Option<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            room_id,
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn wants(&self, event: &ServerEvent) -> bool {
        self.room_id
            .as_deref()
            .map_or(true, |room_id| room_id == event.room_id())
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push_back(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        while let Some(message) = pending_messages.pop_front() {
            match serde_json::to_string(&message) {
                Ok(data) => return Poll::Ready(Some(Ok(Event::default().data(data)))),
                Err(e) => error!("Could not serialize event: {}", e),
            }
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/events",
    tag = "events",
    params(EventsQuery),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of room events",
            body = ServerEvent
        )
    )
)]
pub(crate) async fn event_stream(
    State(context): State<ServerContext>,
    Query(query): Query<EventsQuery>,
) -> Sse<ConnectionHandle> {
    Sse::new(context.sse.connect(query.room_id)).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}

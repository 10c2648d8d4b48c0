use std::sync::Arc;

use log::{error, info, warn};
use onair_core::{
    generated_user_id, random_string,
    session::{
        RoomSession, SessionError, SessionHandle, SessionOptions, SessionResult, SessionSnapshot,
        StreamingEngine,
    },
    Config, EngineUser, RoomAction, RoomStatus, SessionNotification,
};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{ApiSessionSource, NewRoomRequest, RoomActionRequest, RoomApi, RoomRecord};

/// Sent as a bullet when the heart button is pressed
pub const HEART: &str = "💖";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Viewer,
}

/// The person opening a room page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visitor {
    pub user_id: String,
    pub username: String,
    pub pfp_url: Option<String>,
}

/// Drives one visit to a room: deciding the role, keeping the registry in
/// step with the session, and leaving again.
///
/// Registry updates and engine calls are not atomic together. A failed
/// registry update is logged and the flow carries on.
pub struct RoomPage {
    room_id: String,
    role: Role,
    visitor: Visitor,
    api: Arc<dyn RoomApi>,
    session: SessionHandle,
    notifications: broadcast::Receiver<SessionNotification>,
    has_started_streaming: bool,
}

impl RoomPage {
    /// Opens a room, joining it as a viewer when it is live and hosting it otherwise
    pub async fn open(
        api: Arc<dyn RoomApi>,
        engine: Arc<dyn StreamingEngine>,
        room_id: &str,
        visitor: Visitor,
        config: Config,
    ) -> Self {
        let (role, visitor) = decide_role(api.as_ref(), room_id, visitor).await;

        info!(
            "Opening room {} as {:?} ({})",
            room_id, role, visitor.user_id
        );

        let source = Arc::new(ApiSessionSource::new(api.clone()));
        let session = RoomSession::spawn(
            engine,
            source.clone(),
            source,
            SessionOptions {
                room_id: room_id.to_string(),
                is_host: role == Role::Host,
                user: EngineUser {
                    user_id: visitor.user_id.clone(),
                    user_name: Some(visitor.username.clone()),
                },
                config,
            },
        );

        // Failures are recorded in the snapshot
        if let Err(e) = session.initialize().await {
            warn!("Room {} opened without a session: {}", room_id, e);
        }

        Self {
            room_id: room_id.to_string(),
            role,
            visitor,
            notifications: session.notifications(),
            api,
            session,
            has_started_streaming: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Who this page acts as. Viewers get a generated identity.
    pub fn visitor(&self) -> &Visitor {
        &self.visitor
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Publishes the host's stream, then marks the room live
    pub async fn start_streaming(&mut self) -> SessionResult<()> {
        if self.role != Role::Host {
            return Err(SessionError::NotHost);
        }

        if self.has_started_streaming {
            return Err(SessionError::AlreadyStreaming);
        }

        let stream_id = self.session.start_streaming().await?;
        self.has_started_streaming = true;

        info!("Room {} is streaming {}", self.room_id, stream_id);
        self.update_room(RoomAction::StartStream).await;

        Ok(())
    }

    /// Ends or leaves the room, whichever applies, and logs out.
    /// Every step is attempted even if an earlier one failed.
    pub async fn leave(self) {
        match self.role {
            Role::Host if self.has_started_streaming => {
                self.update_room(RoomAction::EndStream).await
            }
            Role::Host => {}
            Role::Viewer => self.update_room(RoomAction::LeaveViewer).await,
        }

        if self.session.snapshot().is_streaming {
            if let Err(e) = self.session.stop_streaming().await {
                error!("Could not stop streaming in {}: {}", self.room_id, e);
            }
        }

        if let Err(e) = self.session.logout().await {
            error!("Could not log out of {}: {}", self.room_id, e);
        }

        info!("Left room {}", self.room_id);
    }

    pub async fn send_chat(&self, text: &str) -> SessionResult<()> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        self.session.send_bullet(text).await
    }

    pub async fn send_heart(&self) -> SessionResult<()> {
        self.session.send_bullet(HEART).await
    }

    /// Returns whether the mic is now on
    pub async fn toggle_mic(&self) -> SessionResult<bool> {
        self.session.toggle_mic().await
    }

    /// Returns whether the camera is now on
    pub async fn toggle_camera(&self) -> SessionResult<bool> {
        self.session.toggle_camera().await
    }

    /// Waits until the stream being watched ends.
    /// Returns false if the session shut down first.
    pub async fn host_ended(&mut self) -> bool {
        loop {
            match self.notifications.recv().await {
                Ok(SessionNotification::HostEndedStream) => return true,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return false,
            }
        }
    }

    async fn update_room(&self, action: RoomAction) {
        let request = RoomActionRequest {
            action,
            user_id: self.visitor.user_id.clone(),
            username: self.visitor.username.clone(),
            pfp_url: self.visitor.pfp_url.clone(),
        };

        if let Err(e) = self.api.update_room(&self.room_id, &request).await {
            error!("Could not {} in room {}: {}", action, self.room_id, e);
        }
    }
}

/// Live rooms are watched, everything else is hosted.
/// Returns the identity the page acts as.
async fn decide_role(api: &dyn RoomApi, room_id: &str, visitor: Visitor) -> (Role, Visitor) {
    match api.room(room_id).await {
        Ok(room) => match room.status {
            RoomStatus::Live => (Role::Viewer, join_as_viewer(api, room_id).await),
            RoomStatus::Created => (Role::Host, host_identity(&room, visitor)),
            // Nothing to watch or host, the page only shows what is left
            RoomStatus::Ended => (Role::Viewer, visitor),
        },
        Err(e) => {
            if !e.is_not_found() {
                warn!("Could not look up room {}, hosting it: {}", room_id, e);
            }

            create_room(api, room_id, &visitor).await;
            (Role::Host, visitor)
        }
    }
}

async fn join_as_viewer(api: &dyn RoomApi, room_id: &str) -> Visitor {
    let viewer = Visitor {
        user_id: generated_user_id("viewer"),
        username: format!("Viewer_{}", random_string(4)),
        pfp_url: None,
    };

    let request = RoomActionRequest {
        action: RoomAction::JoinViewer,
        user_id: viewer.user_id.clone(),
        username: viewer.username.clone(),
        pfp_url: None,
    };

    if let Err(e) = api.update_room(room_id, &request).await {
        error!("Could not join room {} as a viewer: {}", room_id, e);
    }

    viewer
}

/// The host keeps the name the room was created with
fn host_identity(room: &RoomRecord, visitor: Visitor) -> Visitor {
    Visitor {
        username: room.host_username.clone(),
        ..visitor
    }
}

async fn create_room(api: &dyn RoomApi, room_id: &str, host: &Visitor) {
    let request = NewRoomRequest {
        room_id: room_id.to_string(),
        host_user_id: host.user_id.clone(),
        host_username: host.username.clone(),
        host_pfp_url: host.pfp_url.clone(),
    };

    if let Err(e) = api.create_room(&request).await {
        error!("Could not create room {}: {}", room_id, e);
    }
}

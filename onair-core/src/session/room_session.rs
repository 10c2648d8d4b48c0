use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    util::now_millis, Config, ConnectionState, EngineEvent, EngineUser, SessionNotification,
    UpdateKind, Viewer,
};

use super::{
    Bullet, BulletScreen, LocalStream, MediaStream, RosterSource, SessionError, SessionResult,
    SessionState, StreamingEngine, TokenSource,
};

type Reply<T> = oneshot::Sender<SessionResult<T>>;

/// What a room session needs to know about who it is
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub room_id: String,
    pub is_host: bool,
    pub user: EngineUser,
    pub config: Config,
}

/// The state a room session publishes after every change
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub is_logged_in: bool,
    pub is_initializing: bool,
    /// Why initialization failed, if it did
    pub error: Option<String>,
    pub viewer_count: usize,
    pub viewers: Vec<Viewer>,
    pub bullets: Vec<Bullet>,
    pub is_watching: bool,
    pub is_streaming: bool,
    pub is_mic_on: bool,
    pub is_camera_on: bool,
    /// The remote media being watched
    pub media: Option<MediaStream>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            is_logged_in: false,
            is_initializing: true,
            error: None,
            viewer_count: 0,
            viewers: vec![],
            bullets: vec![],
            is_watching: false,
            is_streaming: false,
            is_mic_on: true,
            is_camera_on: true,
            media: None,
        }
    }
}

enum Command {
    Initialize(Reply<()>),
    StartStreaming(Reply<String>),
    StopStreaming(Reply<()>),
    SendBullet { text: String, reply: Reply<()> },
    ToggleMic(Reply<bool>),
    ToggleCamera(Reply<bool>),
    Logout(Reply<()>),
    Engine(EngineEvent),
}

struct Publishing {
    stream_id: String,
    stream: LocalStream,
}

/// An actor owning one user's connection to one room.
///
/// Commands and engine callbacks are processed one at a time, so a login
/// can never run twice and state is never mutated from two places.
pub struct RoomSession {
    options: SessionOptions,
    engine: Arc<dyn StreamingEngine>,
    tokens: Arc<dyn TokenSource>,
    roster: Arc<dyn RosterSource>,

    snapshot: SessionSnapshot,
    snapshot_sender: watch::Sender<SessionSnapshot>,
    notifications: broadcast::Sender<SessionNotification>,

    bullets: BulletScreen,
    login_outcome: Option<SessionResult<()>>,
    publishing: Option<Publishing>,
}

/// A cloneable handle to a running [RoomSession]
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    notifications: broadcast::Sender<SessionNotification>,
}

/// Lets engine glue post callbacks into a session without holding the full handle
#[derive(Clone)]
pub struct EngineEventSink {
    commands: mpsc::UnboundedSender<Command>,
}

impl RoomSession {
    /// Spawns the session on the current runtime
    pub fn spawn(
        engine: Arc<dyn StreamingEngine>,
        tokens: Arc<dyn TokenSource>,
        roster: Arc<dyn RosterSource>,
        options: SessionOptions,
    ) -> SessionHandle {
        let (commands, mailbox) = mpsc::unbounded_channel();
        let (snapshot_sender, snapshots) = watch::channel(SessionSnapshot::default());
        let (notifications, _) = broadcast::channel(16);

        let session = Self {
            bullets: BulletScreen::new(options.config.bullet_lifetime),
            options,
            engine,
            tokens,
            roster,
            snapshot: SessionSnapshot::default(),
            snapshot_sender,
            notifications: notifications.clone(),
            login_outcome: None,
            publishing: None,
        };

        tokio::spawn(session.run(mailbox));

        SessionHandle {
            commands,
            snapshots,
            notifications,
        }
    }

    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<Command>) {
        let mut roster_poll = time::interval(self.options.config.roster_poll_interval);
        roster_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let next_expiry = self.bullets.next_expiry();

            tokio::select! {
                command = mailbox.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = roster_poll.tick(), if self.snapshot.is_logged_in => {
                    self.refresh_roster().await
                },
                _ = time::sleep_until(next_expiry.unwrap_or_else(Instant::now)), if next_expiry.is_some() => {
                    if self.bullets.prune(Instant::now()) {
                        self.publish()
                    }
                }
            }
        }

        debug!("Session for room {} stopped", self.options.room_id);
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Initialize(reply) => {
                let outcome = self.initialize().await;
                let _ = reply.send(outcome);
            }
            Command::StartStreaming(reply) => {
                let result = self.start_streaming().await;
                let _ = reply.send(result);
            }
            Command::StopStreaming(reply) => {
                let result = self.stop_streaming().await;
                let _ = reply.send(result);
            }
            Command::SendBullet { text, reply } => {
                let result = self.send_bullet(text).await;
                let _ = reply.send(result);
            }
            Command::ToggleMic(reply) => {
                let result = self.toggle_mic().await;
                let _ = reply.send(result);
            }
            Command::ToggleCamera(reply) => {
                self.snapshot.is_camera_on = !self.snapshot.is_camera_on;
                let _ = reply.send(Ok(self.snapshot.is_camera_on));
            }
            Command::Logout(reply) => {
                let result = self.logout().await;
                let _ = reply.send(result);
            }
            Command::Engine(event) => self.handle_engine_event(event).await,
        }

        self.publish()
    }

    /// Logs in on the first call, later calls get the first call's outcome
    async fn initialize(&mut self) -> SessionResult<()> {
        if let Some(outcome) = &self.login_outcome {
            return outcome.clone();
        }

        let outcome = self.login().await;

        match &outcome {
            Ok(_) => {
                info!(
                    "Logged in to room {} as {}",
                    self.options.room_id, self.options.user.user_id
                );
                self.snapshot.state = SessionState::Connected;
                self.snapshot.is_logged_in = true;

                if self.options.is_host {
                    self.set_viewers(vec![self.options.user.clone().into()]);
                }
            }
            Err(e) => {
                error!("Could not join room {}: {}", self.options.room_id, e);
                self.snapshot.state = SessionState::Disconnected;
                self.snapshot.error = Some(e.to_string());
            }
        }

        self.snapshot.is_initializing = false;
        self.login_outcome = Some(outcome.clone());

        outcome
    }

    async fn login(&mut self) -> SessionResult<()> {
        self.snapshot.state = SessionState::Connecting;
        self.publish();

        let SessionOptions { room_id, user, .. } = &self.options;

        let token = self
            .tokens
            .engine_token(&user.user_id, room_id)
            .await
            .map_err(SessionError::Token)?;

        self.engine.login_room(room_id, &token, user).await?;

        Ok(())
    }

    async fn start_streaming(&mut self) -> SessionResult<String> {
        if !self.options.is_host {
            return Err(SessionError::NotHost);
        }

        if !self.snapshot.is_logged_in {
            return Err(SessionError::NotLoggedIn);
        }

        if self.publishing.is_some() {
            return Err(SessionError::AlreadyStreaming);
        }

        let stream = self.engine.create_stream().await?;
        let stream_id = format!("stream_{}_{}", self.options.room_id, now_millis());

        if let Err(e) = self.engine.start_publishing(&stream_id, &stream).await {
            if let Err(cleanup) = self.engine.destroy_stream(&stream).await {
                warn!("Could not clean up stream {}: {}", stream.id, cleanup);
            }

            return Err(e.into());
        }

        info!("Publishing {} in room {}", stream_id, self.options.room_id);

        // The mic may have been switched off before anything was published
        if !self.snapshot.is_mic_on {
            if let Err(e) = self.engine.mute_publish_audio(&stream, true).await {
                warn!("Could not mute the new stream, turning the mic back on: {}", e);
                self.snapshot.is_mic_on = true;
            }
        }

        self.publishing = Some(Publishing {
            stream_id: stream_id.clone(),
            stream,
        });
        self.snapshot.is_streaming = true;
        self.snapshot.state = SessionState::Streaming;

        Ok(stream_id)
    }

    async fn stop_streaming(&mut self) -> SessionResult<()> {
        let publishing = self.publishing.take().ok_or(SessionError::NotStreaming)?;

        let stopped = self.engine.stop_publishing(&publishing.stream_id).await;
        let destroyed = self.engine.destroy_stream(&publishing.stream).await;

        self.snapshot.is_streaming = false;
        if self.snapshot.is_logged_in {
            self.snapshot.state = SessionState::Connected;
        }

        stopped?;
        destroyed?;

        info!("Stopped publishing {}", publishing.stream_id);
        Ok(())
    }

    async fn send_bullet(&mut self, text: String) -> SessionResult<()> {
        let text = text.trim();

        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        if !self.snapshot.is_logged_in {
            return Err(SessionError::NotLoggedIn);
        }

        self.engine.send_barrage(&self.options.room_id, text).await?;

        // Our own messages are not echoed back by the engine
        self.bullets.show(Bullet::new(
            text.to_string(),
            self.options.user.user_id.clone(),
            Some("You".to_string()),
        ));

        Ok(())
    }

    async fn toggle_mic(&mut self) -> SessionResult<bool> {
        let is_mic_on = !self.snapshot.is_mic_on;

        if let Some(publishing) = &self.publishing {
            self.engine
                .mute_publish_audio(&publishing.stream, !is_mic_on)
                .await?;
        }

        self.snapshot.is_mic_on = is_mic_on;
        Ok(is_mic_on)
    }

    async fn logout(&mut self) -> SessionResult<()> {
        if self.publishing.is_some() {
            if let Err(e) = self.stop_streaming().await {
                warn!("Could not stop publishing before logout: {}", e);
            }
        }

        let result = self.engine.logout_room(&self.options.room_id).await;

        self.snapshot.is_logged_in = false;
        self.snapshot.is_watching = false;
        self.snapshot.media = None;
        self.snapshot.state = SessionState::Disconnected;

        info!("Logged out of room {}", self.options.room_id);
        result.map_err(Into::into)
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::RoomStateUpdate {
                room_id,
                state,
                error_code,
            } if room_id == self.options.room_id => {
                debug!("Room {} is {:?} ({})", room_id, state, error_code);

                match state {
                    ConnectionState::Connected => {
                        self.snapshot.is_logged_in = true;
                        if matches!(
                            self.snapshot.state,
                            SessionState::Connecting | SessionState::Disconnected
                        ) {
                            self.snapshot.state = SessionState::Connected;
                        }
                    }
                    ConnectionState::Disconnected => {
                        self.snapshot.is_logged_in = false;
                        self.snapshot.state = SessionState::Disconnected;
                    }
                    ConnectionState::Connecting => {}
                }
            }
            EngineEvent::UserUpdate { room_id, .. } if room_id == self.options.room_id => {
                self.refresh_roster().await
            }
            EngineEvent::StreamUpdate {
                room_id,
                kind,
                streams,
            } if room_id == self.options.room_id => {
                self.refresh_roster().await;

                // A host only sees its own stream
                if self.options.is_host {
                    return;
                }

                for stream in streams {
                    match kind {
                        UpdateKind::Add => {
                            if let Err(e) = self.play_stream(&stream.stream_id).await {
                                error!("Could not play stream {}: {}", stream.stream_id, e);
                            }
                        }
                        UpdateKind::Delete => self.stream_ended(&stream.stream_id).await,
                    }
                }
            }
            EngineEvent::BarrageReceived { room_id, messages } if room_id == self.options.room_id => {
                for message in messages {
                    self.bullets.show(Bullet::new(
                        message.message,
                        message.from_user.user_id,
                        message.from_user.user_name,
                    ));
                }
            }
            other => debug!("Ignoring event for another room: {:?}", other),
        }
    }

    async fn play_stream(&mut self, stream_id: &str) -> SessionResult<()> {
        let payload = self.engine.start_playing(stream_id).await?;
        let media = MediaStream::from_vendor(payload)?;

        if let Err(e) = self.engine.mute_play_audio(stream_id, false).await {
            warn!("Could not enable audio for {}: {}", stream_id, e);
        }

        info!("Watching {} in room {}", stream_id, self.options.room_id);

        self.snapshot.media = Some(media);
        self.snapshot.is_watching = true;
        self.snapshot.state = SessionState::Watching;

        Ok(())
    }

    async fn stream_ended(&mut self, stream_id: &str) {
        if let Err(e) = self.engine.stop_playing(stream_id).await {
            warn!("Could not stop playing {}: {}", stream_id, e);
        }

        self.snapshot.media = None;
        self.snapshot.is_watching = false;
        if self.snapshot.is_logged_in {
            self.snapshot.state = SessionState::Connected;
        }

        info!("Stream {} ended in room {}", stream_id, self.options.room_id);
        let _ = self.notifications.send(SessionNotification::HostEndedStream);
    }

    async fn refresh_roster(&mut self) {
        match self.roster.active_viewers(&self.options.room_id).await {
            Ok(mut viewers) => {
                let user = &self.options.user;

                // The host counts as present even before its participant row exists
                if self.options.is_host && !viewers.iter().any(|v| v.user_id == user.user_id) {
                    viewers.insert(0, user.clone().into());
                }

                self.set_viewers(viewers.clone());
                let _ = self
                    .notifications
                    .send(SessionNotification::ViewersUpdated(viewers));
            }
            Err(e) => warn!(
                "Could not refresh viewers of room {}: {}",
                self.options.room_id, e
            ),
        }
    }

    fn set_viewers(&mut self, viewers: Vec<Viewer>) {
        self.snapshot.viewer_count = viewers.len();
        self.snapshot.viewers = viewers;
    }

    fn publish(&mut self) {
        self.snapshot.bullets = self.bullets.bullets();
        self.snapshot_sender.send_replace(self.snapshot.clone());
    }
}

impl SessionHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> SessionResult<T> {
        let (reply, response) = oneshot::channel();

        self.commands
            .send(command(reply))
            .map_err(|_| SessionError::Closed)?;

        response.await.map_err(|_| SessionError::Closed)?
    }

    /// Fetches a token and logs in. Safe to call any number of times.
    pub async fn initialize(&self) -> SessionResult<()> {
        self.request(Command::Initialize).await
    }

    /// Creates and publishes a local stream, returning its stream id
    pub async fn start_streaming(&self) -> SessionResult<String> {
        self.request(Command::StartStreaming).await
    }

    pub async fn stop_streaming(&self) -> SessionResult<()> {
        self.request(Command::StopStreaming).await
    }

    /// Broadcasts a chat message and shows it locally
    pub async fn send_bullet(&self, text: impl Into<String>) -> SessionResult<()> {
        let text = text.into();
        self.request(|reply| Command::SendBullet { text, reply })
            .await
    }

    /// Returns whether the mic is now on
    pub async fn toggle_mic(&self) -> SessionResult<bool> {
        self.request(Command::ToggleMic).await
    }

    /// Returns whether the camera is now on
    pub async fn toggle_camera(&self) -> SessionResult<bool> {
        self.request(Command::ToggleCamera).await
    }

    pub async fn logout(&self) -> SessionResult<()> {
        self.request(Command::Logout).await
    }

    pub fn post_engine_event(&self, event: EngineEvent) -> SessionResult<()> {
        self.commands
            .send(Command::Engine(event))
            .map_err(|_| SessionError::Closed)
    }

    pub fn engine_sink(&self) -> EngineEventSink {
        EngineEventSink {
            commands: self.commands.clone(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn notifications(&self) -> broadcast::Receiver<SessionNotification> {
        self.notifications.subscribe()
    }
}

impl EngineEventSink {
    /// Returns false if the session is gone
    pub fn post(&self, event: EngineEvent) -> bool {
        self.commands.send(Command::Engine(event)).is_ok()
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::{session::EngineResult, BarrageMessage, StreamInfo};

    #[derive(Default)]
    struct FakeEngine {
        logins: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl FakeEngine {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StreamingEngine for FakeEngine {
        async fn login_room(&self, room_id: &str, token: &str, _: &EngineUser) -> EngineResult<()> {
            // Give concurrent initializers a chance to pile up
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.logins.fetch_add(1, Ordering::SeqCst);
            self.record(format!("login {} {}", room_id, token));
            Ok(())
        }

        async fn logout_room(&self, room_id: &str) -> EngineResult<()> {
            self.record(format!("logout {}", room_id));
            Ok(())
        }

        async fn create_stream(&self) -> EngineResult<LocalStream> {
            Ok(LocalStream {
                id: "local".to_string(),
            })
        }

        async fn destroy_stream(&self, stream: &LocalStream) -> EngineResult<()> {
            self.record(format!("destroy {}", stream.id));
            Ok(())
        }

        async fn start_publishing(&self, stream_id: &str, _: &LocalStream) -> EngineResult<()> {
            self.record(format!("publish {}", stream_id));
            Ok(())
        }

        async fn stop_publishing(&self, stream_id: &str) -> EngineResult<()> {
            self.record(format!("unpublish {}", stream_id));
            Ok(())
        }

        async fn mute_publish_audio(&self, _: &LocalStream, mute: bool) -> EngineResult<()> {
            self.record(format!("mute publish {}", mute));
            Ok(())
        }

        async fn start_playing(&self, stream_id: &str) -> EngineResult<Value> {
            self.record(format!("play {}", stream_id));
            Ok(json!({ "zegoStream": { "stream": { "id": stream_id } } }))
        }

        async fn stop_playing(&self, stream_id: &str) -> EngineResult<()> {
            self.record(format!("stop {}", stream_id));
            Ok(())
        }

        async fn mute_play_audio(&self, stream_id: &str, mute: bool) -> EngineResult<()> {
            self.record(format!("mute play {} {}", stream_id, mute));
            Ok(())
        }

        async fn send_barrage(&self, _: &str, message: &str) -> EngineResult<()> {
            self.record(format!("barrage {}", message));
            Ok(())
        }
    }

    struct FakeTokens {
        fail: bool,
    }

    #[async_trait]
    impl TokenSource for FakeTokens {
        async fn engine_token(&self, user_id: &str, _: &str) -> Result<String, String> {
            if self.fail {
                return Err("Zego configuration missing".to_string());
            }

            Ok(format!("token-{}", user_id))
        }
    }

    struct FakeRoster(Vec<Viewer>);

    #[async_trait]
    impl RosterSource for FakeRoster {
        async fn active_viewers(&self, _: &str) -> Result<Vec<Viewer>, String> {
            Ok(self.0.clone())
        }
    }

    fn viewer(id: &str) -> Viewer {
        Viewer {
            user_id: id.to_string(),
            user_name: None,
        }
    }

    fn spawn(engine: &Arc<FakeEngine>, is_host: bool, fail_token: bool) -> SessionHandle {
        RoomSession::spawn(
            engine.clone(),
            Arc::new(FakeTokens { fail: fail_token }),
            Arc::new(FakeRoster(vec![viewer("viewer_1")])),
            SessionOptions {
                room_id: "room1".to_string(),
                is_host,
                user: EngineUser {
                    user_id: if is_host { "host_1" } else { "viewer_1" }.to_string(),
                    user_name: Some("Ann".to_string()),
                },
                config: Config::default(),
            },
        )
    }

    #[tokio::test]
    async fn test_concurrent_initialize_logs_in_once() {
        let engine = Arc::new(FakeEngine::default());
        let session = spawn(&engine, true, false);

        let (first, second, third) = tokio::join!(
            session.initialize(),
            session.initialize(),
            session.initialize()
        );

        assert!(first.is_ok() && second.is_ok() && third.is_ok());
        assert_eq!(engine.logins.load(Ordering::SeqCst), 1);
        assert_eq!(engine.calls()[0], "login room1 token-host_1");

        let snapshot = session.snapshot();
        assert!(snapshot.is_logged_in);
        assert!(!snapshot.is_initializing);
        assert_eq!(snapshot.state, SessionState::Connected);
        assert!(snapshot.viewers.iter().any(|v| v.user_id == "host_1"));
    }

    #[tokio::test]
    async fn test_token_failure_is_reported() {
        let engine = Arc::new(FakeEngine::default());
        let session = spawn(&engine, false, true);

        let result = session.initialize().await;
        assert!(matches!(result, Err(SessionError::Token(_))));

        let snapshot = session.snapshot();
        assert!(!snapshot.is_initializing);
        assert!(!snapshot.is_logged_in);
        assert_eq!(snapshot.state, SessionState::Disconnected);
        assert!(snapshot.error.is_some());
        assert_eq!(engine.logins.load(Ordering::SeqCst), 0);

        // A second call gets the same outcome without retrying
        assert!(session.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_viewer_watches_until_host_ends() {
        let engine = Arc::new(FakeEngine::default());
        let session = spawn(&engine, false, false);
        let mut notifications = session.notifications();
        let mut snapshots = session.subscribe();

        session.initialize().await.unwrap();

        let stream = StreamInfo {
            stream_id: "stream_room1_1".to_string(),
            user: None,
        };

        session
            .post_engine_event(EngineEvent::StreamUpdate {
                room_id: "room1".to_string(),
                kind: UpdateKind::Add,
                streams: vec![stream.clone()],
            })
            .unwrap();

        let watching = snapshots.wait_for(|s| s.is_watching).await.unwrap().clone();
        assert_eq!(watching.state, SessionState::Watching);
        assert_eq!(watching.media.unwrap().id, "stream_room1_1");
        assert!(engine
            .calls()
            .contains(&"mute play stream_room1_1 false".to_string()));

        session
            .post_engine_event(EngineEvent::StreamUpdate {
                room_id: "room1".to_string(),
                kind: UpdateKind::Delete,
                streams: vec![stream],
            })
            .unwrap();

        loop {
            match notifications.recv().await.unwrap() {
                SessionNotification::HostEndedStream => break,
                SessionNotification::ViewersUpdated(_) => continue,
            }
        }

        let snapshot = session.snapshot();
        assert!(!snapshot.is_watching);
        assert!(snapshot.media.is_none());
        assert!(engine.calls().contains(&"stop stream_room1_1".to_string()));
    }

    #[tokio::test]
    async fn test_host_streaming_rules() {
        let engine = Arc::new(FakeEngine::default());
        let host = spawn(&engine, true, false);

        assert_eq!(host.start_streaming().await, Err(SessionError::NotLoggedIn));

        host.initialize().await.unwrap();

        let stream_id = host.start_streaming().await.unwrap();
        assert!(stream_id.starts_with("stream_room1_"));
        assert_eq!(
            host.start_streaming().await,
            Err(SessionError::AlreadyStreaming)
        );
        assert!(host.snapshot().is_streaming);

        assert_eq!(host.toggle_mic().await, Ok(false));
        assert!(engine.calls().contains(&"mute publish true".to_string()));

        host.logout().await.unwrap();

        let calls = engine.calls();
        assert!(calls.contains(&format!("unpublish {}", stream_id)));
        assert!(calls.contains(&"destroy local".to_string()));
        assert_eq!(calls.last().unwrap(), "logout room1");
        assert_eq!(host.snapshot().state, SessionState::Disconnected);

        let viewer = spawn(&engine, false, false);
        viewer.initialize().await.unwrap();
        assert_eq!(viewer.start_streaming().await, Err(SessionError::NotHost));
    }

    #[tokio::test]
    async fn test_mic_switched_off_before_streaming_stays_off() {
        let engine = Arc::new(FakeEngine::default());
        let host = spawn(&engine, true, false);
        host.initialize().await.unwrap();

        assert_eq!(host.toggle_mic().await, Ok(false));
        assert!(!engine.calls().iter().any(|c| c.starts_with("mute publish")));

        let stream_id = host.start_streaming().await.unwrap();
        let calls = engine.calls();

        let published = calls
            .iter()
            .position(|c| *c == format!("publish {}", stream_id))
            .unwrap();
        let muted = calls
            .iter()
            .position(|c| c == "mute publish true")
            .unwrap();

        assert!(muted > published);
        assert!(!host.snapshot().is_mic_on);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bullets_come_and_go() {
        let engine = Arc::new(FakeEngine::default());
        let session = spawn(&engine, false, false);
        let mut snapshots = session.subscribe();

        session.initialize().await.unwrap();

        assert_eq!(
            session.send_bullet("   ").await,
            Err(SessionError::EmptyMessage)
        );
        session.send_bullet(" hello ").await.unwrap();
        assert!(engine.calls().contains(&"barrage hello".to_string()));

        session
            .post_engine_event(EngineEvent::BarrageReceived {
                room_id: "room1".to_string(),
                messages: vec![BarrageMessage {
                    message: "💖".to_string(),
                    from_user: EngineUser {
                        user_id: "viewer_2".to_string(),
                        user_name: Some("Bo".to_string()),
                    },
                }],
            })
            .unwrap();

        let shown = snapshots
            .wait_for(|s| s.bullets.len() == 2)
            .await
            .unwrap()
            .bullets
            .clone();
        assert_eq!(shown[0].user_name.as_deref(), Some("You"));
        assert_eq!(shown[1].display_name(), "Bo");

        let started = Instant::now();
        snapshots.wait_for(|s| s.bullets.is_empty()).await.unwrap();
        assert!(started.elapsed() <= Duration::from_secs(4));
    }
}

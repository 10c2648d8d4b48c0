use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use onair_core::{
    session::{RosterSource, TokenSource},
    ParticipantRole, RoomAction, RoomStatus, Viewer,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("{message} ({status})")]
    Status { status: u16, message: String },
    #[error("Could not parse response: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// A room as returned by the registry
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RoomRecord {
    pub room_id: String,
    pub host_user_id: String,
    pub host_username: String,
    pub host_pfp_url: Option<String>,
    pub status: RoomStatus,
    pub current_viewers: i32,
    pub total_viewers: i32,
    pub stream_started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ParticipantRecord {
    pub user_id: String,
    pub username: String,
    pub pfp_url: Option<String>,
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamingStatsRecord {
    pub eligible: bool,
    pub latest_session: Option<LatestSessionRecord>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatestSessionRecord {
    pub room_id: String,
    pub role: ParticipantRole,
    pub duration: i64,
    pub completed_at: DateTime<Utc>,
}

/// The server's answer to a claim request
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClaimStub {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoomRequest {
    pub room_id: String,
    pub host_user_id: String,
    pub host_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_pfp_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomActionRequest {
    pub action: RoomAction,
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pfp_url: Option<String>,
}

#[derive(Deserialize)]
struct RoomEnvelope {
    room: RoomRecord,
}

#[derive(Deserialize)]
struct ParticipantsEnvelope {
    participants: Vec<ParticipantRecord>,
}

#[derive(Deserialize)]
struct TokenEnvelope {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// The endpoints the client pages talk to
#[async_trait]
pub trait RoomApi: Send + Sync {
    async fn room(&self, room_id: &str) -> ApiResult<RoomRecord>;
    async fn create_room(&self, new_room: &NewRoomRequest) -> ApiResult<RoomRecord>;
    async fn update_room(&self, room_id: &str, action: &RoomActionRequest) -> ApiResult<()>;
    async fn participants(&self, room_id: &str) -> ApiResult<Vec<ParticipantRecord>>;
    async fn streaming_stats(&self, user_id: &str) -> ApiResult<StreamingStatsRecord>;
    async fn engine_token(&self, user_id: &str, room_id: &str) -> ApiResult<String>;
    async fn request_claim(&self, user_id: &str) -> ApiResult<ClaimStub>;
}

/// Talks to an onair server over HTTP
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new<S>(base_url: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T>(&self, request: RequestBuilder) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// Builds an error from a failed response, using the server's message when there is one
fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl RoomApi for ApiClient {
    async fn room(&self, room_id: &str) -> ApiResult<RoomRecord> {
        let request = self.client.get(self.url(&format!("/api/rooms/{}", room_id)));
        let envelope: RoomEnvelope = self.send(request).await?;

        Ok(envelope.room)
    }

    async fn create_room(&self, new_room: &NewRoomRequest) -> ApiResult<RoomRecord> {
        let request = self.client.post(self.url("/api/rooms")).json(new_room);
        let envelope: RoomEnvelope = self.send(request).await?;

        Ok(envelope.room)
    }

    async fn update_room(&self, room_id: &str, action: &RoomActionRequest) -> ApiResult<()> {
        debug!("{} in room {} as {}", action.action, room_id, action.user_id);

        let request = self
            .client
            .patch(self.url(&format!("/api/rooms/{}", room_id)))
            .json(action);

        // The body is either the room or a success flag, neither is needed
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }

    async fn participants(&self, room_id: &str) -> ApiResult<Vec<ParticipantRecord>> {
        let request = self
            .client
            .get(self.url(&format!("/api/rooms/{}", room_id)))
            .query(&[("action", "get_participants")]);
        let envelope: ParticipantsEnvelope = self.send(request).await?;

        Ok(envelope.participants)
    }

    async fn streaming_stats(&self, user_id: &str) -> ApiResult<StreamingStatsRecord> {
        let request = self
            .client
            .get(self.url("/api/user/streaming-stats"))
            .query(&[("userId", user_id)]);

        self.send(request).await
    }

    async fn engine_token(&self, user_id: &str, room_id: &str) -> ApiResult<String> {
        let request = self
            .client
            .post(self.url("/api/zego-token"))
            .json(&serde_json::json!({ "userID": user_id, "roomID": room_id }));
        let envelope: TokenEnvelope = self.send(request).await?;

        Ok(envelope.token)
    }

    async fn request_claim(&self, user_id: &str) -> ApiResult<ClaimStub> {
        let request = self
            .client
            .post(self.url("/api/claim"))
            .json(&serde_json::json!({ "userId": user_id }));

        self.send(request).await
    }
}

/// Feeds a room session with tokens and viewer lists from a [RoomApi]
#[derive(Clone)]
pub struct ApiSessionSource {
    api: Arc<dyn RoomApi>,
}

impl ApiSessionSource {
    pub fn new(api: Arc<dyn RoomApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl TokenSource for ApiSessionSource {
    async fn engine_token(&self, user_id: &str, room_id: &str) -> Result<String, String> {
        self.api
            .engine_token(user_id, room_id)
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl RosterSource for ApiSessionSource {
    async fn active_viewers(&self, room_id: &str) -> Result<Vec<Viewer>, String> {
        let participants = self.api.participants(room_id).await.map_err(|e| {
            warn!("Could not fetch participants of {}: {}", room_id, e);
            e.to_string()
        })?;

        Ok(participants.into_iter().map(Into::into).collect())
    }
}

impl From<ParticipantRecord> for Viewer {
    fn from(value: ParticipantRecord) -> Self {
        Self {
            user_id: value.user_id,
            user_name: Some(value.username),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::FakeApi;

    #[test]
    fn test_error_from_body() {
        let error = error_from_body(StatusCode::NOT_FOUND, r#"{ "error": "Room not found" }"#);

        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "Room not found (404)");

        let error = error_from_body(StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(
            error,
            ApiError::Status {
                status: 502,
                message: "Bad Gateway".to_string()
            }
        );
    }

    #[test]
    fn test_records_parse() {
        let room: RoomEnvelope = serde_json::from_str(
            r#"{ "room": {
                "id": 1,
                "room_id": "r1",
                "host_user_id": "h",
                "host_username": "Host",
                "host_pfp_url": null,
                "status": "live",
                "current_viewers": 2,
                "total_viewers": 5,
                "created_at": "2024-06-01T10:00:00Z",
                "stream_started_at": "2024-06-01T10:01:00Z",
                "stream_ended_at": null,
                "stream_duration": null
            } }"#,
        )
        .unwrap();

        assert_eq!(room.room.status, RoomStatus::Live);
        assert_eq!(room.room.total_viewers, 5);

        let stats: StreamingStatsRecord =
            serde_json::from_str(r#"{ "eligible": false, "latestSession": null }"#).unwrap();
        assert!(!stats.eligible);
    }

    #[test]
    fn test_action_request_shape() {
        let request = RoomActionRequest {
            action: RoomAction::JoinViewer,
            user_id: "u1".to_string(),
            username: "U1".to_string(),
            pfp_url: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["action"], "join_viewer");
        assert_eq!(json["userId"], "u1");
        assert!(json.get("pfpUrl").is_none());
    }

    #[tokio::test]
    async fn test_session_source() {
        let api = Arc::new(FakeApi::default());
        api.add_participant("r1", "host_1", ParticipantRole::Host);
        api.add_participant("r1", "viewer_1", ParticipantRole::Viewer);

        let source = ApiSessionSource::new(api.clone());

        let viewers = source.active_viewers("r1").await.unwrap();
        assert_eq!(viewers.len(), 2);
        assert_eq!(viewers[1].user_name.as_deref(), Some("VIEWER_1"));

        assert_eq!(
            source.engine_token("u1", "r1").await,
            Ok("04token_u1_r1".to_string())
        );
    }
}

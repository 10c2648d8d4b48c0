use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use onair_collab::{Identity, NewRoom};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::ServerError;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoomSchema {
    #[validate(length(min = 1, max = 128))]
    pub room_id: String,
    #[validate(length(min = 1, max = 128))]
    pub host_user_id: String,
    #[validate(length(min = 1, max = 128))]
    pub host_username: String,
    #[validate(length(max = 2048))]
    pub host_pfp_url: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomActionSchema {
    /// One of start_stream, end_stream, join_viewer, leave_viewer
    pub action: String,
    #[validate(length(min = 1, max = 128))]
    pub user_id: Option<String>,
    #[validate(length(max = 128))]
    pub username: Option<String>,
    #[validate(length(max = 2048))]
    pub pfp_url: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageSchema {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(length(min = 1, max = 128))]
    pub username: String,
    pub message: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct TokenSchema {
    #[serde(rename = "userID", default)]
    #[validate(length(max = 128))]
    pub user_id: String,
    #[serde(rename = "roomID", default)]
    #[validate(length(max = 128))]
    pub room_id: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSchema {
    #[serde(default)]
    #[validate(length(max = 128))]
    pub user_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoomQuery {
    /// get_participants or get_messages, the room itself otherwise
    pub action: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Only receive events of this room
    pub room_id: Option<String>,
}

impl From<NewRoomSchema> for NewRoom {
    fn from(value: NewRoomSchema) -> Self {
        Self {
            room_id: value.room_id,
            host_user_id: value.host_user_id,
            host_username: value.host_username,
            host_pfp_url: value.host_pfp_url,
        }
    }
}

impl RoomActionSchema {
    /// The acting user, required by every action that adds a participant
    pub fn identity(&self) -> Result<Identity, ServerError> {
        let user_id = self
            .user_id
            .clone()
            .ok_or_else(|| ServerError::bad_request("userId is required"))?;

        Ok(Identity {
            username: self.username.clone().unwrap_or_else(|| user_id.clone()),
            pfp_url: self.pfp_url.clone(),
            user_id,
        })
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| ServerError::bad_request("JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| ServerError::bad_request("Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}

use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::{claim, rooms, schemas, serialized, sse, token, user};

#[derive(OpenApi)]
#[openapi(
    info(description = "onair-server exposes the room registry, streaming stats and engine tokens"),
    paths(
        rooms::list_rooms,
        rooms::create_room,
        rooms::room,
        rooms::perform_room_action,
        rooms::post_message,
        user::streaming_stats,
        token::create_token,
        claim::request_claim,
        sse::event_stream,
    ),
    components(schemas(
        schemas::NewRoomSchema,
        schemas::RoomActionSchema,
        schemas::NewMessageSchema,
        schemas::TokenSchema,
        schemas::ClaimSchema,
        serialized::Room,
        serialized::LiveRoom,
        serialized::Participant,
        serialized::Message,
        serialized::RoomResponse,
        serialized::RoomsResponse,
        serialized::ParticipantsResponse,
        serialized::MessagesResponse,
        serialized::MessageResponse,
        serialized::SuccessResponse,
        serialized::TokenResponse,
        serialized::ClaimResponse,
        serialized::StreamingStats,
        serialized::LatestSession,
        sse::ServerEvent,
    ))
)]
pub struct ApiDoc;

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

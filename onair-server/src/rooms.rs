use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json,
};
use onair_core::RoomAction;

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{NewMessageSchema, NewRoomSchema, RoomActionSchema, RoomQuery, ValidatedJson},
    serialized::{
        LiveRoom, MessageResponse, MessagesResponse, ParticipantsResponse, Room, RoomResponse,
        RoomsResponse, SuccessResponse, ToSerialized,
    },
    Router,
};

#[utoipa::path(
    get,
    path = "/api/rooms",
    tag = "rooms",
    responses(
        (status = 200, description = "Live rooms, most recently started first", body = RoomsResponse)
    )
)]
pub(crate) async fn list_rooms(
    State(context): State<ServerContext>,
) -> ServerResult<Json<RoomsResponse>> {
    let rooms = context.collab.rooms.live_rooms().await?;
    let rooms: Vec<LiveRoom> = rooms.to_serialized();

    Ok(Json(RoomsResponse { rooms }))
}

#[utoipa::path(
    post,
    path = "/api/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    responses(
        (status = 200, body = RoomResponse),
        (status = 409, description = "A room with this id already exists")
    )
)]
pub(crate) async fn create_room(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<RoomResponse>> {
    let room = context.collab.rooms.create_room(body.into()).await?;

    Ok(Json(RoomResponse {
        room: room.to_serialized(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/rooms/{room_id}",
    tag = "rooms",
    params(
        ("room_id" = String, Path, description = "The caller chosen room id"),
        RoomQuery
    ),
    responses(
        (status = 200, description = "The room, its active participants or its recent messages"),
        (status = 404, description = "Room not found")
    )
)]
pub(crate) async fn room(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    Query(query): Query<RoomQuery>,
) -> ServerResult<Response> {
    let rooms = &context.collab.rooms;

    let response = match query.action.as_deref() {
        Some("get_participants") => {
            let participants = rooms.participants(&room_id).await?;

            Json(ParticipantsResponse {
                participants: participants.to_serialized(),
            })
            .into_response()
        }
        Some("get_messages") => {
            let messages = rooms.messages(&room_id).await?;

            Json(MessagesResponse {
                messages: messages.to_serialized(),
            })
            .into_response()
        }
        _ => {
            let room: Room = rooms.room(&room_id).await?.to_serialized();

            Json(RoomResponse { room }).into_response()
        }
    };

    Ok(response)
}

#[utoipa::path(
    patch,
    path = "/api/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = String, Path, description = "The caller chosen room id")),
    request_body = RoomActionSchema,
    responses(
        (status = 200, description = "The room for start_stream and end_stream, success otherwise"),
        (status = 400, description = "Invalid action"),
        (status = 404, description = "Room not found, or not live when joining"),
        (status = 409, description = "The room cannot move to the requested status")
    )
)]
pub(crate) async fn perform_room_action(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<RoomActionSchema>,
) -> ServerResult<Response> {
    let action: RoomAction = body
        .action
        .parse()
        .map_err(|_| ServerError::bad_request("Invalid action"))?;

    let rooms = &context.collab.rooms;

    let response = match action {
        RoomAction::StartStream => {
            let room = rooms.start_stream(&room_id, body.identity()?).await?;

            Json(RoomResponse {
                room: room.to_serialized(),
            })
            .into_response()
        }
        RoomAction::EndStream => {
            let room = rooms.end_stream(&room_id).await?;

            Json(RoomResponse {
                room: room.to_serialized(),
            })
            .into_response()
        }
        RoomAction::JoinViewer => {
            rooms.join_viewer(&room_id, body.identity()?).await?;

            Json(SuccessResponse { success: true }).into_response()
        }
        RoomAction::LeaveViewer => {
            let identity = body.identity()?;
            rooms.leave_viewer(&room_id, &identity.user_id).await?;

            Json(SuccessResponse { success: true }).into_response()
        }
    };

    Ok(response)
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/messages",
    tag = "rooms",
    params(("room_id" = String, Path, description = "The caller chosen room id")),
    request_body = NewMessageSchema,
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, description = "The message is empty or too long"),
        (status = 404, description = "Room not found")
    )
)]
pub(crate) async fn post_message(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<NewMessageSchema>,
) -> ServerResult<Json<MessageResponse>> {
    let message = context
        .collab
        .rooms
        .post_message(&room_id, body.user_id, body.username, body.message)
        .await?;

    Ok(Json(MessageResponse {
        message: message.to_serialized(),
    }))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms).post(create_room))
        .route("/:room_id", get(room).patch(perform_room_action))
        .route("/:room_id/messages", post(post_message))
}

#[cfg(test)]
mod test {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};

    use crate::test_util::{request, server};

    fn new_room(room_id: &str) -> Value {
        json!({
            "roomId": room_id,
            "hostUserId": "host_1",
            "hostUsername": "Host",
        })
    }

    fn action(action: &str, user_id: &str) -> Value {
        json!({
            "action": action,
            "userId": user_id,
            "username": user_id.to_uppercase(),
        })
    }

    #[tokio::test]
    async fn test_room_lifecycle() {
        let app = server();

        let (status, body) = request(&app, Method::POST, "/api/rooms", Some(new_room("r1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["room"]["status"], "created");
        assert_eq!(body["room"]["room_id"], "r1");

        let (status, _) = request(&app, Method::POST, "/api/rooms", Some(new_room("r1"))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = request(
            &app,
            Method::PATCH,
            "/api/rooms/r1",
            Some(action("start_stream", "host_1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["room"]["status"], "live");
        assert_eq!(body["room"]["current_viewers"], 1);

        let (_, body) = request(&app, Method::GET, "/api/rooms", None).await;
        assert_eq!(body["rooms"].as_array().map(Vec::len), Some(1));

        let (status, body) = request(
            &app,
            Method::PATCH,
            "/api/rooms/r1",
            Some(action("join_viewer", "viewer_1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = request(
            &app,
            Method::GET,
            "/api/rooms/r1?action=get_participants",
            None,
        )
        .await;
        let participants = body["participants"].as_array().cloned().unwrap_or_default();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0]["role"], "host");
        assert_eq!(participants[1]["username"], "VIEWER_1");

        let (status, body) = request(
            &app,
            Method::PATCH,
            "/api/rooms/r1",
            Some(json!({ "action": "end_stream" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["room"]["status"], "ended");
        assert_eq!(body["room"]["current_viewers"], 0);
        assert_eq!(body["room"]["total_viewers"], 1);

        // Ended rooms stay ended
        let (status, _) = request(
            &app,
            Method::PATCH,
            "/api/rooms/r1",
            Some(action("start_stream", "host_1")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_room_errors() {
        let app = server();

        let (status, body) = request(&app, Method::GET, "/api/rooms/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Room not found");

        request(&app, Method::POST, "/api/rooms", Some(new_room("r1"))).await;

        let (status, body) = request(
            &app,
            Method::PATCH,
            "/api/rooms/r1",
            Some(action("dance", "host_1")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action");

        let (status, body) = request(
            &app,
            Method::PATCH,
            "/api/rooms/r1",
            Some(action("join_viewer", "viewer_1")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Room not found or not live");

        let (status, body) = request(
            &app,
            Method::PATCH,
            "/api/rooms/r1",
            Some(json!({ "action": "start_stream" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "userId is required");
    }

    #[tokio::test]
    async fn test_unparseable_body() {
        use tower::ServiceExt;

        let app = server();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/rooms")
            .header("content-type", "application/json")
            .body(Body::from("{ not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_messages() {
        let app = server();
        request(&app, Method::POST, "/api/rooms", Some(new_room("r1"))).await;

        for text in ["first", "  second  "] {
            let (status, _) = request(
                &app,
                Method::POST,
                "/api/rooms/r1/messages",
                Some(json!({ "userId": "u1", "username": "U1", "message": text })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, _) = request(
            &app,
            Method::POST,
            "/api/rooms/r1/messages",
            Some(json!({ "userId": "u1", "username": "U1", "message": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = request(&app, Method::GET, "/api/rooms/r1?action=get_messages", None).await;
        let messages = body["messages"].as_array().cloned().unwrap_or_default();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["message"], "first");
        assert_eq!(messages[1]["message"], "second");
    }
}

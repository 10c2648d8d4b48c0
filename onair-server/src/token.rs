use axum::{extract::State, routing::post, Json};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{TokenSchema, ValidatedJson},
    serialized::TokenResponse,
    Router,
};

#[utoipa::path(
    post,
    path = "/api/zego-token",
    tag = "token",
    request_body = TokenSchema,
    responses(
        (status = 200, body = TokenResponse),
        (status = 400, description = "The engine rejected the inputs, see errorCode"),
        (status = 500, description = "Engine credentials are not configured")
    )
)]
pub(crate) async fn create_token(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<TokenSchema>,
) -> ServerResult<Json<TokenResponse>> {
    let token = context.collab.tokens.mint(&body.user_id, &body.room_id)?;

    Ok(Json(TokenResponse { token }))
}

pub fn router() -> Router {
    Router::new().route("/", post(create_token))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use onair_collab::{Collab, EngineCredentials, MemoryDatabase};
    use onair_core::Config;
    use serde_json::json;

    use crate::test_util::{request, server, server_with};

    fn configured() -> axum::Router {
        let credentials = EngineCredentials {
            app_id: 1234,
            server_secret: "0123456789abcdef0123456789abcdef".to_string(),
        };

        server_with(Collab::new(
            Arc::new(MemoryDatabase::new()),
            Config::default(),
            Some(credentials),
        ))
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let (status, body) = request(
            &server(),
            Method::POST,
            "/api/zego-token",
            Some(json!({ "userID": "u1", "roomID": "r1" })),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Zego configuration missing");
    }

    #[tokio::test]
    async fn test_mint() {
        let app = configured();

        let (status, body) = request(
            &app,
            Method::POST,
            "/api/zego-token",
            Some(json!({ "userID": "u1", "roomID": "r1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].as_str().is_some_and(|t| t.starts_with("04")));

        let (status, body) = request(
            &app,
            Method::POST,
            "/api/zego-token",
            Some(json!({ "roomID": "r1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Token generation failed");
        assert_eq!(body["errorCode"], 3);
    }
}

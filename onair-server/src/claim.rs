use axum::{extract::State, routing::post, Json};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{ClaimSchema, ValidatedJson},
    serialized::{ClaimResponse, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/api/claim",
    tag = "claim",
    request_body = ClaimSchema,
    responses(
        (status = 200, body = ClaimResponse),
        (status = 400, description = "userId is required")
    )
)]
pub(crate) async fn request_claim(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<ClaimSchema>,
) -> ServerResult<Json<ClaimResponse>> {
    if body.user_id.is_empty() {
        return Err(ServerError::bad_request("userId is required"));
    }

    let outcome = context.collab.claims.request(&body.user_id);

    Ok(Json(outcome.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/", post(request_claim))
}

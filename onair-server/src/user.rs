use axum::{
    extract::{Query, State},
    routing::get,
    Json,
};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::UserQuery,
    serialized::{StreamingStats, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/api/user/streaming-stats",
    tag = "user",
    params(UserQuery),
    responses(
        (status = 200, description = "Whether the user may claim, and their latest qualifying session", body = StreamingStats),
        (status = 400, description = "userId is required")
    )
)]
pub(crate) async fn streaming_stats(
    State(context): State<ServerContext>,
    Query(query): Query<UserQuery>,
) -> ServerResult<Json<StreamingStats>> {
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServerError::bad_request("userId is required"))?;

    let stats = context.collab.stats.for_user(&user_id).await?;

    Ok(Json(stats.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/streaming-stats", get(streaming_stats))
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use onair_collab::{DatabaseError, RoomError, TokenError};
use serde_json::json;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// The engine rejected the token inputs
    #[error("Token generation failed")]
    Token { code: i32, message: String },
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn bad_request(message: &str) -> Self {
        Self::BadRequest(message.to_string())
    }

    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Token { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::Token { code, message } => json!({
                "error": self.to_string(),
                "errorCode": code,
                "errorMessage": message,
            }),
            e => json!({ "error": e.to_string() }),
        };

        (self.as_status_code(), Json(body)).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound { .. } => Self::NotFound(value.to_string()),
            DatabaseError::Conflict { .. } => Self::Conflict(value.to_string()),
            DatabaseError::Internal(e) => {
                error!("Database error: {}", e);
                Self::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::NotFound | RoomError::NotLive => Self::NotFound(value.to_string()),
            RoomError::InvalidTransition { .. } => Self::Conflict(value.to_string()),
            RoomError::InvalidMessage { .. } => Self::BadRequest(value.to_string()),
            RoomError::Database(e) => e.into(),
        }
    }
}

impl From<TokenError> for ServerError {
    fn from(value: TokenError) -> Self {
        match value.code() {
            Some(code) => Self::Token {
                code,
                message: value.to_string(),
            },
            None => Self::Internal(value.to_string()),
        }
    }
}

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Every failure a request handler can surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not authorized, no token")]
    NoToken,
    #[error("Not authorized, token failed")]
    InvalidToken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Not authorized as an Admin")]
    InsufficientRole,

    #[error("{0}")]
    Validation(String),
    #[error("Quantity must be a positive integer")]
    InvalidQuantity,
    #[error("Movement type must be IN or OUT")]
    InvalidType,
    #[error("Start date and end date are required.")]
    MissingDateRange,
    #[error("Invalid item type specified.")]
    InvalidCategory,

    #[error("Item not found")]
    ItemNotFound,
    #[error("User not found")]
    UserNotFound,

    #[error("An item with description '{0}' already exists")]
    DuplicateItem(String),
    #[error("Username '{0}' is already taken")]
    DuplicateUser(String),
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i64, requested: i64 },
    #[error("The last Admin account cannot be removed or demoted")]
    LastAdmin,

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoToken | Self::InvalidToken | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InsufficientRole => StatusCode::FORBIDDEN,
            Self::Validation(_)
            | Self::InvalidQuantity
            | Self::InvalidType
            | Self::MissingDateRange
            | Self::InvalidCategory => StatusCode::BAD_REQUEST,
            Self::ItemNotFound | Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::DuplicateItem(_)
            | Self::DuplicateUser(_)
            | Self::InsufficientStock { .. }
            | Self::LastAdmin => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        Self::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (
            status,
            Json(serde_json::json!({
                "ok": false,
                "error": message
            })),
        )
            .into_response()
    }
}

/// `Json` extractor whose rejections come back in the API error body.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// True when the storage layer rejected a write on a UNIQUE constraint.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_distinct_from_role_denial() {
        assert_eq!(AppError::NoToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InsufficientRole.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn server_errors_hide_details() {
        let resp = AppError::Internal(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

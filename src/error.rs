use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::booking::BookingError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("{0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        let message = e.to_string();
        match e {
            BookingError::NotFound { .. } => AppError::NotFound(message),
            BookingError::Conflict(_)
            | BookingError::InvalidTransition { .. }
            | BookingError::AlreadyTerminal(_) => AppError::Conflict(message),
            BookingError::NotEligible(_) | BookingError::Forbidden(_) => {
                AppError::Forbidden(message)
            }
            BookingError::Validation(_) => AppError::BadRequest(message),
            BookingError::PaymentDeclined(_) => AppError::PaymentRequired(message),
            BookingError::Store(_) => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::booking::BookingStatus;

    fn status_of(e: BookingError) -> StatusCode {
        AppError::from(e).into_response().status()
    }

    #[test]
    fn test_booking_errors_map_to_http_status() {
        assert_eq!(status_of(BookingError::not_found("Car")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(BookingError::Conflict("taken".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(BookingError::AlreadyTerminal(BookingStatus::Completed)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(BookingError::NotEligible("too young".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(BookingError::Validation("bad dates".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BookingError::PaymentDeclined("card".to_string())),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(BookingError::Store("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

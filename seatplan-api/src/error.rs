use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use seatplan_core::AssignmentError;
use seatplan_store::SnapshotError;

use crate::session::UnreadableSnapshot;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<AssignmentError> for AppError {
    fn from(err: AssignmentError) -> Self {
        let message = err.to_string();
        match err {
            AssignmentError::NotFound { .. } => AppError::NotFoundError(message),
            AssignmentError::CapacityExceeded { .. }
            | AssignmentError::AlreadySeatedElsewhere { .. }
            | AssignmentError::AlreadyAssigned { .. }
            | AssignmentError::RoomFull(_)
            | AssignmentError::RoomOccupied(_)
            | AssignmentError::InvalidTransition { .. } => AppError::ConflictError(message),
            AssignmentError::DuplicateId(_)
            | AssignmentError::InvalidCapacity { .. }
            | AssignmentError::Inconsistent(_) => AppError::ValidationError(message),
        }
    }
}

impl From<UnreadableSnapshot> for AppError {
    fn from(err: UnreadableSnapshot) -> Self {
        AppError::ConflictError(err.to_string())
    }
}

impl From<SnapshotError> for AppError {
    fn from(err: SnapshotError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AssignmentError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_assignment_errors_map_to_status() {
        assert_eq!(status_of(AssignmentError::not_found("table", "t9")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AssignmentError::CapacityExceeded { requested: 3, available: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(AssignmentError::RoomFull("r1".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(AssignmentError::DuplicateId("g1".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unreadable_snapshot_conflicts() {
        let err = UnreadableSnapshot {
            event_id: "evt-1".to_string(),
            layout: crate::session::Layout::Seating,
            reason: "expected value".to_string(),
        };
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}

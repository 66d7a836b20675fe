use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use seatplan_lodging::{calculate_total_price, AssignmentStatus, Room, RoomAssignment, RoomType};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::seating::{Changed, ClearResponse, SaveResponse};
use crate::session::Layout;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct LodgingResponse {
    pub event_id: String,
    pub rooms: Vec<RoomView>,
    pub assignments: Vec<RoomAssignment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomView {
    #[serde(flatten)]
    pub room: Room,
    pub is_full: bool,
    pub icon: String,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        Self {
            room: room.clone(),
            is_full: seatplan_lodging::is_room_full(room),
            icon: room.room_type.icon().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub capacity: u32,
    pub price_per_night: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoomRequest {
    pub guest_id: String,
    pub guest_name: Option<String>,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignRoomResponse {
    pub room: RoomView,
    pub assignment: Option<RoomAssignment>,
    pub total_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UnassignRoomRequest {
    pub guest_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnassignRoomResponse {
    pub removed: bool,
    pub room: RoomView,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AssignmentStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events/{event_id}/lodging", get(get_lodging).delete(clear_lodging))
        .route("/v1/events/{event_id}/lodging/save", post(save_lodging))
        .route("/v1/events/{event_id}/rooms", post(create_room))
        .route("/v1/events/{event_id}/rooms/{room_id}", delete(delete_room))
        .route("/v1/events/{event_id}/rooms/{room_id}/assign", post(assign_room))
        .route("/v1/events/{event_id}/rooms/{room_id}/unassign", post(unassign_room))
        .route(
            "/v1/events/{event_id}/room-assignments/{assignment_id}/status",
            put(update_status),
        )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/events/{event_id}/lodging
async fn get_lodging(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<LodgingResponse>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let session = session.lock().await;
    session.check(Layout::Lodging)?;

    Ok(Json(LodgingResponse {
        event_id,
        rooms: session.lodging.rooms().iter().map(RoomView::from).collect(),
        assignments: session.lodging.assignments().to_vec(),
    }))
}

/// POST /v1/events/{event_id}/rooms
async fn create_room(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Changed<RoomView>>), AppError> {
    let room_id = req.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let room = Room::new(room_id, req.name, req.room_type, req.capacity, req.price_per_night)?
        .with_amenities(req.amenities);

    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Lodging)?;
    session.lodging.add_room(room.clone())?;
    let saved = session.changed(Layout::Lodging, &state.snapshots, state.autosave).await;

    Ok((StatusCode::CREATED, Json(Changed::new(RoomView::from(&room), saved))))
}

/// DELETE /v1/events/{event_id}/rooms/{room_id}
async fn delete_room(
    State(state): State<AppState>,
    Path((event_id, room_id)): Path<(String, String)>,
) -> Result<Json<Changed<Room>>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Lodging)?;
    let room = session.lodging.remove_room(&room_id)?;
    let saved = session.changed(Layout::Lodging, &state.snapshots, state.autosave).await;

    Ok(Json(Changed::new(room, saved)))
}

/// POST /v1/events/{event_id}/rooms/{room_id}/assign
/// With both stay dates a stay record is created alongside the slot.
async fn assign_room(
    State(state): State<AppState>,
    Path((event_id, room_id)): Path<(String, String)>,
    Json(req): Json<AssignRoomRequest>,
) -> Result<Json<Changed<AssignRoomResponse>>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Lodging)?;

    let assignment = match (req.check_in, req.check_out) {
        (Some(check_in), Some(check_out)) => {
            let guest_name = req
                .guest_name
                .or_else(|| {
                    session
                        .seating
                        .guests()
                        .iter()
                        .find(|g| g.id == req.guest_id)
                        .map(|g| g.name.clone())
                })
                .unwrap_or_else(|| req.guest_id.clone());
            let status = req.status.unwrap_or(AssignmentStatus::Confirmed);

            Some(session.lodging.book_stay(
                &room_id,
                &req.guest_id,
                &guest_name,
                check_in,
                check_out,
                status,
            )?)
        }
        (None, None) => {
            session.lodging.assign_guest_to_room(&room_id, &req.guest_id)?;
            None
        }
        _ => {
            return Err(AppError::ValidationError(
                "check_in and check_out must be given together".to_string(),
            ))
        }
    };
    let saved = session.changed(Layout::Lodging, &state.snapshots, state.autosave).await;

    let room = session
        .lodging
        .room(&room_id)
        .ok_or_else(|| AppError::NotFoundError(format!("room not found: {}", room_id)))?;
    let total_price = assignment
        .as_ref()
        .map(|a| calculate_total_price(room.price_per_night, a.number_of_nights));

    let response = AssignRoomResponse {
        room: RoomView::from(room),
        assignment,
        total_price,
    };
    Ok(Json(Changed::new(response, saved)))
}

/// POST /v1/events/{event_id}/rooms/{room_id}/unassign
/// Any active stay of the guest in this room is cancelled with the slot.
async fn unassign_room(
    State(state): State<AppState>,
    Path((event_id, room_id)): Path<(String, String)>,
    Json(req): Json<UnassignRoomRequest>,
) -> Result<Json<Changed<UnassignRoomResponse>>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Lodging)?;

    let removed = session.lodging.remove_guest_from_room(&room_id, &req.guest_id)?;
    let saved = if removed {
        session.changed(Layout::Lodging, &state.snapshots, state.autosave).await
    } else {
        None
    };

    let room = session
        .lodging
        .room(&room_id)
        .ok_or_else(|| AppError::NotFoundError(format!("room not found: {}", room_id)))?;
    let response = UnassignRoomResponse {
        removed,
        room: RoomView::from(room),
    };
    Ok(Json(Changed::new(response, saved)))
}

/// PUT /v1/events/{event_id}/room-assignments/{assignment_id}/status
async fn update_status(
    State(state): State<AppState>,
    Path((event_id, assignment_id)): Path<(String, String)>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Changed<RoomAssignment>>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Lodging)?;

    let assignment = session.lodging.set_assignment_status(&assignment_id, req.status)?;
    let saved = session.changed(Layout::Lodging, &state.snapshots, state.autosave).await;

    Ok(Json(Changed::new(assignment, saved)))
}

/// POST /v1/events/{event_id}/lodging/save
async fn save_lodging(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<SaveResponse>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Lodging)?;

    let saved = session.save(Layout::Lodging, &state.snapshots).await;
    info!("Lodging save for event {}: {}", event_id, saved);
    Ok(Json(SaveResponse { saved }))
}

/// DELETE /v1/events/{event_id}/lodging
async fn clear_lodging(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<ClearResponse>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;

    let cleared = session.clear(Layout::Lodging, &state.snapshots).await;
    Ok(Json(ClearResponse { cleared }))
}

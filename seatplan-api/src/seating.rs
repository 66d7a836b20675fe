use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use seatplan_core::{Guest, GuestGroup};
use seatplan_seating::{Occupancy, Table, TableType};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::session::Layout;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SeatingResponse {
    pub event_id: String,
    pub tables: Vec<Table>,
    pub guests: Vec<Guest>,
    pub groups: Vec<GuestGroup>,
    pub seated: usize,
    pub capacity: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: TableType,
    pub capacity: u32,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Deserialize)]
pub struct AssignSeatsRequest {
    pub guest_ids: Option<Vec<String>>,
    pub group_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignSeatsResponse {
    pub table_id: String,
    pub seat_indices: Vec<usize>,
    pub seated_count: usize,
    pub capacity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UnassignSeatsRequest {
    /// Omitted releases every seat on the table.
    pub guest_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnassignSeatsResponse {
    pub table_id: String,
    pub released: usize,
    pub seated_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGuestsRequest {
    pub guests: Vec<Guest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateGuestsResponse {
    pub cleared_seats: usize,
    pub seated: usize,
    pub capacity: usize,
}

/// Body of a mutation response. `saved` reports the autosave outcome and is
/// omitted when autosave is off.
#[derive(Debug, Serialize)]
pub struct Changed<T> {
    #[serde(flatten)]
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,
}

impl<T> Changed<T> {
    pub fn new(data: T, saved: Option<bool>) -> Self {
        Self { data, saved }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub saved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events/{event_id}/seating", get(get_seating).delete(clear_seating))
        .route("/v1/events/{event_id}/seating/save", post(save_seating))
        .route("/v1/events/{event_id}/tables", post(create_table))
        .route("/v1/events/{event_id}/tables/{table_id}", delete(delete_table))
        .route("/v1/events/{event_id}/tables/{table_id}/assign", post(assign_seats))
        .route("/v1/events/{event_id}/tables/{table_id}/unassign", post(unassign_seats))
        .route("/v1/events/{event_id}/guests", put(update_guests))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/events/{event_id}/seating
async fn get_seating(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<SeatingResponse>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let session = session.lock().await;
    session.check(Layout::Seating)?;

    let Occupancy { seated, capacity } = session.seating.occupancy();
    Ok(Json(SeatingResponse {
        event_id,
        tables: session.seating.tables().to_vec(),
        guests: session.seating.guests().to_vec(),
        groups: session.seating.groups(),
        seated,
        capacity,
    }))
}

/// POST /v1/events/{event_id}/tables
async fn create_table(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(req): Json<CreateTableRequest>,
) -> Result<(StatusCode, Json<Changed<Table>>), AppError> {
    let table_id = req.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let table = Table::new(table_id, req.name, req.table_type, req.capacity, req.x, req.y)?;

    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Seating)?;
    session.seating.add_table(table.clone())?;
    let saved = session.changed(Layout::Seating, &state.snapshots, state.autosave).await;

    Ok((StatusCode::CREATED, Json(Changed::new(table, saved))))
}

/// DELETE /v1/events/{event_id}/tables/{table_id}
async fn delete_table(
    State(state): State<AppState>,
    Path((event_id, table_id)): Path<(String, String)>,
) -> Result<Json<Changed<Table>>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Seating)?;
    let table = session.seating.remove_table(&table_id)?;
    let saved = session.changed(Layout::Seating, &state.snapshots, state.autosave).await;

    Ok(Json(Changed::new(table, saved)))
}

/// POST /v1/events/{event_id}/tables/{table_id}/assign
/// Seat a list of guests, or every pending member of a group.
async fn assign_seats(
    State(state): State<AppState>,
    Path((event_id, table_id)): Path<(String, String)>,
    Json(req): Json<AssignSeatsRequest>,
) -> Result<Json<Changed<AssignSeatsResponse>>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Seating)?;

    let seat_indices = match (req.guest_ids, req.group_id) {
        (Some(guest_ids), None) => session.seating.assign_guests_to_seats(&table_id, guest_ids.as_slice())?,
        (None, Some(group_id)) => session.seating.assign_group_to_table(&table_id, &group_id)?,
        _ => {
            return Err(AppError::ValidationError(
                "Provide exactly one of guest_ids or group_id".to_string(),
            ))
        }
    };
    let saved = session.changed(Layout::Seating, &state.snapshots, state.autosave).await;

    let table = session
        .seating
        .table(&table_id)
        .ok_or_else(|| AppError::NotFoundError(format!("table not found: {}", table_id)))?;
    let response = AssignSeatsResponse {
        seated_count: table.seated_count(),
        capacity: table.capacity,
        table_id,
        seat_indices,
    };
    Ok(Json(Changed::new(response, saved)))
}

/// POST /v1/events/{event_id}/tables/{table_id}/unassign
async fn unassign_seats(
    State(state): State<AppState>,
    Path((event_id, table_id)): Path<(String, String)>,
    Json(req): Json<UnassignSeatsRequest>,
) -> Result<Json<Changed<UnassignSeatsResponse>>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Seating)?;

    let released = match req.guest_ids {
        Some(guest_ids) => session.seating.remove_guests_from_table(&table_id, guest_ids.as_slice())?,
        None => session.seating.unassign_table_guests(&table_id)?.len(),
    };
    let saved = if released > 0 {
        session.changed(Layout::Seating, &state.snapshots, state.autosave).await
    } else {
        None
    };

    let seated_count = session.seating.get_seated_count(&table_id)?;
    let response = UnassignSeatsResponse {
        table_id,
        released,
        seated_count,
    };
    Ok(Json(Changed::new(response, saved)))
}

/// PUT /v1/events/{event_id}/guests
/// Replace the guest list; seats of removed guests are cleared.
async fn update_guests(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(req): Json<UpdateGuestsRequest>,
) -> Result<Json<Changed<UpdateGuestsResponse>>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Seating)?;

    let cleared_seats = session.seating.update_guest_assignments(req.guests)?;
    let saved = session.changed(Layout::Seating, &state.snapshots, state.autosave).await;

    let Occupancy { seated, capacity } = session.seating.occupancy();
    let response = UpdateGuestsResponse {
        cleared_seats,
        seated,
        capacity,
    };
    Ok(Json(Changed::new(response, saved)))
}

/// POST /v1/events/{event_id}/seating/save
async fn save_seating(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<SaveResponse>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;
    session.check(Layout::Seating)?;

    let saved = session.save(Layout::Seating, &state.snapshots).await;
    info!("Seating save for event {}: {}", event_id, saved);
    Ok(Json(SaveResponse { saved }))
}

/// DELETE /v1/events/{event_id}/seating
/// Drops the stored snapshot; the live session is left as is. Also the way
/// out of an unreadable snapshot.
async fn clear_seating(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<ClearResponse>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let mut session = session.lock().await;

    let cleared = session.clear(Layout::Seating, &state.snapshots).await;
    Ok(Json(ClearResponse { cleared }))
}

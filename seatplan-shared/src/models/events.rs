use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Change notification emitted by the seating and lodging stores after every
/// successful mutation. Subscribers (the SSE stream, UI adapters) only read
/// these; they never mutate store state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssignmentEvent {
    GuestsSeated {
        table_id: String,
        guest_ids: Vec<String>,
        at: i64,
    },
    GuestsUnseated {
        table_id: String,
        guest_ids: Vec<String>,
        at: i64,
    },
    GuestsReconciled {
        cleared_guest_ids: Vec<String>,
        at: i64,
    },
    TableAdded {
        table_id: String,
        at: i64,
    },
    TableRemoved {
        table_id: String,
        at: i64,
    },
    RoomAssigned {
        room_id: String,
        guest_id: String,
        at: i64,
    },
    RoomReleased {
        room_id: String,
        guest_id: String,
        at: i64,
    },
    RoomAdded {
        room_id: String,
        at: i64,
    },
    RoomRemoved {
        room_id: String,
        at: i64,
    },
    StayStatusChanged {
        assignment_id: String,
        status: String,
        at: i64,
    },
}

impl AssignmentEvent {
    pub fn guests_seated(table_id: &str, guest_ids: Vec<String>) -> Self {
        Self::GuestsSeated { table_id: table_id.to_string(), guest_ids, at: now() }
    }

    pub fn guests_unseated(table_id: &str, guest_ids: Vec<String>) -> Self {
        Self::GuestsUnseated { table_id: table_id.to_string(), guest_ids, at: now() }
    }

    pub fn guests_reconciled(cleared_guest_ids: Vec<String>) -> Self {
        Self::GuestsReconciled { cleared_guest_ids, at: now() }
    }

    pub fn table_added(table_id: &str) -> Self {
        Self::TableAdded { table_id: table_id.to_string(), at: now() }
    }

    pub fn table_removed(table_id: &str) -> Self {
        Self::TableRemoved { table_id: table_id.to_string(), at: now() }
    }

    pub fn room_assigned(room_id: &str, guest_id: &str) -> Self {
        Self::RoomAssigned { room_id: room_id.to_string(), guest_id: guest_id.to_string(), at: now() }
    }

    pub fn room_released(room_id: &str, guest_id: &str) -> Self {
        Self::RoomReleased { room_id: room_id.to_string(), guest_id: guest_id.to_string(), at: now() }
    }

    pub fn room_added(room_id: &str) -> Self {
        Self::RoomAdded { room_id: room_id.to_string(), at: now() }
    }

    pub fn room_removed(room_id: &str) -> Self {
        Self::RoomRemoved { room_id: room_id.to_string(), at: now() }
    }

    pub fn stay_status_changed(assignment_id: &str, status: &str) -> Self {
        Self::StayStatusChanged {
            assignment_id: assignment_id.to_string(),
            status: status.to_string(),
            at: now(),
        }
    }

    /// SSE event name, matches the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GuestsSeated { .. } => "guests_seated",
            Self::GuestsUnseated { .. } => "guests_unseated",
            Self::GuestsReconciled { .. } => "guests_reconciled",
            Self::TableAdded { .. } => "table_added",
            Self::TableRemoved { .. } => "table_removed",
            Self::RoomAssigned { .. } => "room_assigned",
            Self::RoomReleased { .. } => "room_released",
            Self::RoomAdded { .. } => "room_added",
            Self::RoomRemoved { .. } => "room_removed",
            Self::StayStatusChanged { .. } => "stay_status_changed",
        }
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

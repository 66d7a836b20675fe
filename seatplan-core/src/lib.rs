pub mod guest;
pub mod directory;
pub mod repository;

pub use guest::{Guest, GuestGroup};
pub use directory::{build_groups, create_guest_map};
pub use repository::{KeyValueStore, StorageError};

/// Failures of the seating and lodging stores. All of them are expected,
/// recoverable conditions that the caller surfaces to the user; none leaves
/// a store partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignmentError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded { requested: usize, available: usize },

    #[error("Guest {guest_id} is already seated at table {table_id}")]
    AlreadySeatedElsewhere { guest_id: String, table_id: String },

    #[error("Guest {guest_id} is already assigned to room {room_id}")]
    AlreadyAssigned { guest_id: String, room_id: String },

    #[error("Room is full: {0}")]
    RoomFull(String),

    #[error("Room still has assigned guests: {0}")]
    RoomOccupied(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Invalid capacity {capacity} for {id}")]
    InvalidCapacity { id: String, capacity: u32 },

    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl AssignmentError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

pub type AssignmentResult<T> = Result<T, AssignmentError>;

pub mod models;
pub mod stay;
pub mod manager;

pub use models::{AssignmentStatus, Room, RoomAssignment, RoomType};
pub use stay::{calculate_nights, calculate_total_price, is_room_full};
pub use manager::RoomStore;

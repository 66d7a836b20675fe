pub mod table;
pub mod store;

pub use table::{get_seated_count, Seat, Table, TableType};
pub use store::{Occupancy, SeatingStore};

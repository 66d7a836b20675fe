use serde::{Deserialize, Serialize};
use seatplan_core::{AssignmentError, AssignmentResult};

/// Table geometry, used only for layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    Rectangle,
    Circle,
}

/// One occupiable slot; `guest_id` is present iff occupied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    pub guest_id: Option<String>,
}

impl Seat {
    pub fn is_empty(&self) -> bool {
        self.guest_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: TableType,
    pub capacity: u32,
    pub seats: Vec<Seat>,
    pub x: f64,
    pub y: f64,
}

impl Table {
    /// Create a table with `capacity` empty seats, ids `<table_id>-seat-<n>`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        table_type: TableType,
        capacity: u32,
        x: f64,
        y: f64,
    ) -> AssignmentResult<Self> {
        let id = id.into();
        if capacity == 0 {
            return Err(AssignmentError::InvalidCapacity { id, capacity });
        }

        let seats = (1..=capacity)
            .map(|n| Seat {
                id: format!("{}-seat-{}", id, n),
                guest_id: None,
            })
            .collect();

        Ok(Self {
            id,
            name: name.into(),
            table_type,
            capacity,
            seats,
            x,
            y,
        })
    }

    pub fn seated_count(&self) -> usize {
        self.seats.iter().filter(|seat| !seat.is_empty()).count()
    }

    pub fn empty_seat_count(&self) -> usize {
        self.seats.len() - self.seated_count()
    }

    pub fn is_full(&self) -> bool {
        self.empty_seat_count() == 0
    }

    /// Index of the seat held by `guest_id` on this table.
    pub fn seat_index_of(&self, guest_id: &str) -> Option<usize> {
        self.seats
            .iter()
            .position(|seat| seat.guest_id.as_deref() == Some(guest_id))
    }

    pub fn guest_ids(&self) -> impl Iterator<Item = &str> {
        self.seats.iter().filter_map(|seat| seat.guest_id.as_deref())
    }

    /// Structural checks: positive capacity and one seat per unit of capacity.
    pub fn validate(&self) -> AssignmentResult<()> {
        if self.capacity == 0 {
            return Err(AssignmentError::InvalidCapacity {
                id: self.id.clone(),
                capacity: self.capacity,
            });
        }
        if self.seats.len() != self.capacity as usize {
            return Err(AssignmentError::Inconsistent(format!(
                "table {} has {} seats for capacity {}",
                self.id,
                self.seats.len(),
                self.capacity
            )));
        }
        Ok(())
    }
}

/// Number of occupied seats on `table`.
pub fn get_seated_count(table: &Table) -> usize {
    table.seated_count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_has_one_empty_seat_per_capacity() {
        let table = Table::new("t1", "Head table", TableType::Rectangle, 4, 10.0, 20.0).unwrap();

        assert_eq!(table.seats.len(), 4);
        assert_eq!(table.seats[0].id, "t1-seat-1");
        assert_eq!(table.seats[3].id, "t1-seat-4");
        assert_eq!(get_seated_count(&table), 0);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = Table::new("t0", "Empty", TableType::Circle, 0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, AssignmentError::InvalidCapacity { capacity: 0, .. }));
    }

    #[test]
    fn test_validate_catches_seat_count_mismatch() {
        let mut table = Table::new("t1", "Side", TableType::Circle, 3, 0.0, 0.0).unwrap();
        table.seats.pop();
        assert!(matches!(table.validate(), Err(AssignmentError::Inconsistent(_))));
    }

    #[test]
    fn test_table_serializes_with_type_tag() {
        let table = Table::new("t2", "Round", TableType::Circle, 2, 1.5, 2.5).unwrap();
        let value = serde_json::to_value(&table).unwrap();

        assert_eq!(value["type"], "circle");
        assert!(value["seats"][0]["guestId"].is_null());
    }
}

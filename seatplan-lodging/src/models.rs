use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use seatplan_core::{AssignmentError, AssignmentResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Single,
    Double,
    Suite,
    Villa,
}

impl RoomType {
    /// Icon name shown on room cards.
    pub fn icon(&self) -> &'static str {
        match self {
            RoomType::Single => "bed-single",
            RoomType::Double => "bed-double",
            RoomType::Suite => "star",
            RoomType::Villa => "home",
        }
    }
}

/// Lodging unit. `available` and `assigned_guests` describe the same
/// occupancy twice: `available == capacity - assigned_guests.len()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub capacity: u32,
    pub available: u32,
    pub price_per_night: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub assigned_guests: Vec<String>,
}

impl Room {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        room_type: RoomType,
        capacity: u32,
        price_per_night: f64,
    ) -> AssignmentResult<Self> {
        let id = id.into();
        if capacity == 0 {
            return Err(AssignmentError::InvalidCapacity { id, capacity });
        }
        Ok(Self {
            id,
            name: name.into(),
            room_type,
            capacity,
            available: capacity,
            price_per_night,
            amenities: Vec::new(),
            assigned_guests: Vec::new(),
        })
    }

    pub fn with_amenities(mut self, amenities: Vec<String>) -> Self {
        self.amenities = amenities;
        self
    }

    pub fn has_guest(&self, guest_id: &str) -> bool {
        self.assigned_guests.iter().any(|id| id == guest_id)
    }

    pub fn validate(&self) -> AssignmentResult<()> {
        if self.capacity == 0 {
            return Err(AssignmentError::InvalidCapacity {
                id: self.id.clone(),
                capacity: self.capacity,
            });
        }
        if self.assigned_guests.len() > self.capacity as usize
            || self.available as usize != self.capacity as usize - self.assigned_guests.len()
        {
            return Err(AssignmentError::Inconsistent(format!(
                "room {} has capacity {}, available {}, {} assigned",
                self.id,
                self.capacity,
                self.available,
                self.assigned_guests.len()
            )));
        }
        Ok(())
    }
}

/// Stay status. Transitions are driven by the caller; only a move into
/// `Cancelled` has a side effect (the room slot is released).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentStatus {
    Confirmed,
    Pending,
    Cancelled,
    CheckedIn,
    CheckedOut,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Confirmed => "confirmed",
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Cancelled => "cancelled",
            AssignmentStatus::CheckedIn => "checked-in",
            AssignmentStatus::CheckedOut => "checked-out",
        }
    }

    /// Badge colour for status chips.
    pub fn color(&self) -> &'static str {
        match self {
            AssignmentStatus::Confirmed => "#16a34a",
            AssignmentStatus::Pending => "#f59e0b",
            AssignmentStatus::Cancelled => "#dc2626",
            AssignmentStatus::CheckedIn => "#2563eb",
            AssignmentStatus::CheckedOut => "#6b7280",
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detail record of one guest's stay in one room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomAssignment {
    pub id: String,
    pub guest_id: String,
    pub guest_name: String,
    pub room_id: String,
    pub check_in_date: DateTime<Utc>,
    pub check_out_date: DateTime<Utc>,
    pub number_of_nights: u32,
    pub status: AssignmentStatus,
}

impl RoomAssignment {
    pub fn is_active(&self) -> bool {
        self.status != AssignmentStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_room_is_fully_available() {
        let room = Room::new("r1", "Garden", RoomType::Double, 2, 120.0).unwrap();
        assert_eq!(room.available, 2);
        assert!(room.assigned_guests.is_empty());
        assert!(room.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_counter_drift() {
        let mut room = Room::new("r1", "Garden", RoomType::Double, 2, 120.0).unwrap();
        room.assigned_guests.push("g1".to_string());
        assert!(matches!(room.validate(), Err(AssignmentError::Inconsistent(_))));

        room.available = 1;
        assert!(room.validate().is_ok());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&AssignmentStatus::CheckedIn).unwrap();
        assert_eq!(json, "\"checked-in\"");
        assert_eq!(AssignmentStatus::CheckedOut.to_string(), "checked-out");
    }

    #[test]
    fn test_presentation_mappings_are_distinct() {
        let icons = [RoomType::Single, RoomType::Double, RoomType::Suite, RoomType::Villa]
            .map(|t| t.icon());
        let colors = [
            AssignmentStatus::Confirmed,
            AssignmentStatus::Pending,
            AssignmentStatus::Cancelled,
            AssignmentStatus::CheckedIn,
            AssignmentStatus::CheckedOut,
        ]
        .map(|s| s.color());

        for (i, icon) in icons.iter().enumerate() {
            assert!(!icons[i + 1..].contains(icon));
        }
        for (i, color) in colors.iter().enumerate() {
            assert!(!colors[i + 1..].contains(color));
        }
    }
}

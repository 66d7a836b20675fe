use std::collections::HashSet;

use chrono::{DateTime, Utc};
use seatplan_core::{AssignmentError, AssignmentResult};
use seatplan_shared::AssignmentEvent;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{AssignmentStatus, Room, RoomAssignment};
use crate::stay::{calculate_nights, calculate_total_price, is_room_full};

const EVENT_BUFFER: usize = 64;

/// Tracks room occupancy and the stay records attached to it.
#[derive(Debug)]
pub struct RoomStore {
    rooms: Vec<Room>,
    assignments: Vec<RoomAssignment>,
    events: broadcast::Sender<AssignmentEvent>,
}

impl RoomStore {
    /// Restore a store. Every active stay must hold its guest's slot in its
    /// room, and a guest has at most one active stay.
    pub fn new(rooms: Vec<Room>, assignments: Vec<RoomAssignment>) -> AssignmentResult<Self> {
        let mut store = Self::empty();
        for room in rooms {
            store.insert_room(room)?;
        }

        let mut ids = HashSet::new();
        let mut staying = HashSet::new();
        for assignment in &assignments {
            if !ids.insert(assignment.id.as_str()) {
                return Err(AssignmentError::DuplicateId(assignment.id.clone()));
            }
            let index = store.room_index(&assignment.room_id)?;
            if !assignment.is_active() {
                continue;
            }
            if !store.rooms[index].has_guest(&assignment.guest_id) {
                return Err(AssignmentError::Inconsistent(format!(
                    "stay {} is {} but guest {} is not in room {}",
                    assignment.id, assignment.status, assignment.guest_id, assignment.room_id
                )));
            }
            if !staying.insert(assignment.guest_id.as_str()) {
                return Err(AssignmentError::Inconsistent(format!(
                    "guest {} has more than one active stay",
                    assignment.guest_id
                )));
            }
        }
        store.assignments = assignments;
        Ok(store)
    }

    pub fn empty() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            rooms: Vec::new(),
            assignments: Vec::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssignmentEvent> {
        self.events.subscribe()
    }

    /// Live change-stream receivers.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn assignments(&self) -> &[RoomAssignment] {
        &self.assignments
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    pub fn assignment(&self, assignment_id: &str) -> Option<&RoomAssignment> {
        self.assignments.iter().find(|a| a.id == assignment_id)
    }

    /// Room currently holding `guest_id`.
    pub fn room_of(&self, guest_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.has_guest(guest_id))
    }

    pub fn is_room_full(&self, room_id: &str) -> AssignmentResult<bool> {
        self.room(room_id)
            .map(is_room_full)
            .ok_or_else(|| AssignmentError::not_found("room", room_id))
    }

    pub fn assign_guest_to_room(&mut self, room_id: &str, guest_id: &str) -> AssignmentResult<()> {
        let index = self.room_index(room_id)?;
        if is_room_full(&self.rooms[index]) {
            return Err(AssignmentError::RoomFull(room_id.to_string()));
        }
        if let Some(current) = self.room_of(guest_id) {
            return Err(AssignmentError::AlreadyAssigned {
                guest_id: guest_id.to_string(),
                room_id: current.id.clone(),
            });
        }

        let room = &mut self.rooms[index];
        room.assigned_guests.push(guest_id.to_string());
        room.available -= 1;

        info!(
            "Assigned guest {} to room {} ({} left)",
            guest_id, room_id, room.available
        );
        self.publish(AssignmentEvent::room_assigned(room_id, guest_id));
        Ok(())
    }

    /// Returns whether the guest was in the room. Active stays of the guest
    /// in this room are cancelled along with the slot.
    pub fn remove_guest_from_room(&mut self, room_id: &str, guest_id: &str) -> AssignmentResult<bool> {
        let index = self.room_index(room_id)?;
        if !self.release_slot(index, guest_id) {
            debug!("Guest {} not in room {}, nothing to remove", guest_id, room_id);
            return Ok(false);
        }

        let cancelled: Vec<String> = self
            .assignments
            .iter_mut()
            .filter(|a| a.is_active() && a.room_id == room_id && a.guest_id == guest_id)
            .map(|a| {
                a.status = AssignmentStatus::Cancelled;
                a.id.clone()
            })
            .collect();
        for assignment_id in &cancelled {
            info!("Stay {} cancelled with its room slot", assignment_id);
            self.publish(AssignmentEvent::stay_status_changed(
                assignment_id,
                AssignmentStatus::Cancelled.as_str(),
            ));
        }
        Ok(true)
    }

    /// Take a room slot for the guest and record the stay. Nothing is
    /// recorded if the slot cannot be taken.
    pub fn book_stay(
        &mut self,
        room_id: &str,
        guest_id: &str,
        guest_name: &str,
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
        status: AssignmentStatus,
    ) -> AssignmentResult<RoomAssignment> {
        if status == AssignmentStatus::Cancelled {
            return Err(AssignmentError::InvalidTransition {
                from: "new".to_string(),
                to: status.to_string(),
            });
        }

        self.assign_guest_to_room(room_id, guest_id)?;

        let assignment = RoomAssignment {
            id: Uuid::new_v4().to_string(),
            guest_id: guest_id.to_string(),
            guest_name: guest_name.to_string(),
            room_id: room_id.to_string(),
            check_in_date: check_in,
            check_out_date: check_out,
            number_of_nights: calculate_nights(check_in, check_out),
            status,
        };
        info!(
            "Booked stay {} for guest {} ({} night(s))",
            assignment.id, guest_id, assignment.number_of_nights
        );
        self.assignments.push(assignment.clone());
        Ok(assignment)
    }

    /// Move a stay to `status`. Entering `Cancelled` releases the room slot;
    /// a cancelled stay cannot change again.
    pub fn set_assignment_status(
        &mut self,
        assignment_id: &str,
        status: AssignmentStatus,
    ) -> AssignmentResult<RoomAssignment> {
        let index = self
            .assignments
            .iter()
            .position(|a| a.id == assignment_id)
            .ok_or_else(|| AssignmentError::not_found("assignment", assignment_id))?;

        let current = self.assignments[index].status;
        if current == status {
            return Ok(self.assignments[index].clone());
        }
        if current == AssignmentStatus::Cancelled {
            return Err(AssignmentError::InvalidTransition {
                from: current.to_string(),
                to: status.to_string(),
            });
        }

        if status == AssignmentStatus::Cancelled {
            let room_id = self.assignments[index].room_id.clone();
            let guest_id = self.assignments[index].guest_id.clone();
            let room_index = self.room_index(&room_id)?;
            self.release_slot(room_index, &guest_id);
        }

        let assignment = &mut self.assignments[index];
        assignment.status = status;
        let updated = assignment.clone();

        info!("Stay {} moved from {} to {}", assignment_id, current, status);
        self.publish(AssignmentEvent::stay_status_changed(assignment_id, status.as_str()));
        Ok(updated)
    }

    /// Price of a recorded stay at the room's current nightly rate.
    pub fn stay_price(&self, assignment_id: &str) -> AssignmentResult<f64> {
        let assignment = self
            .assignment(assignment_id)
            .ok_or_else(|| AssignmentError::not_found("assignment", assignment_id))?;
        let room = self
            .room(&assignment.room_id)
            .ok_or_else(|| AssignmentError::not_found("room", assignment.room_id.as_str()))?;
        Ok(calculate_total_price(room.price_per_night, assignment.number_of_nights))
    }

    pub fn add_room(&mut self, room: Room) -> AssignmentResult<()> {
        let room_id = room.id.clone();
        self.insert_room(room)?;
        info!("Added room {}", room_id);
        self.publish(AssignmentEvent::room_added(&room_id));
        Ok(())
    }

    /// Rooms with guests still assigned cannot be removed.
    pub fn remove_room(&mut self, room_id: &str) -> AssignmentResult<Room> {
        let index = self.room_index(room_id)?;
        if !self.rooms[index].assigned_guests.is_empty() {
            return Err(AssignmentError::RoomOccupied(room_id.to_string()));
        }
        let room = self.rooms.remove(index);
        info!("Removed room {}", room_id);
        self.publish(AssignmentEvent::room_removed(room_id));
        Ok(room)
    }

    fn insert_room(&mut self, room: Room) -> AssignmentResult<()> {
        room.validate()?;
        if self.room(&room.id).is_some() {
            return Err(AssignmentError::DuplicateId(room.id.clone()));
        }

        let mut in_room = HashSet::new();
        for guest_id in &room.assigned_guests {
            if !in_room.insert(guest_id.as_str()) {
                return Err(AssignmentError::AlreadyAssigned {
                    guest_id: guest_id.clone(),
                    room_id: room.id.clone(),
                });
            }
            if let Some(current) = self.room_of(guest_id) {
                return Err(AssignmentError::AlreadyAssigned {
                    guest_id: guest_id.clone(),
                    room_id: current.id.clone(),
                });
            }
        }

        self.rooms.push(room);
        Ok(())
    }

    /// Free the guest's slot in the room at `index`. Stay records are left
    /// to the caller.
    fn release_slot(&mut self, index: usize, guest_id: &str) -> bool {
        let room = &mut self.rooms[index];
        let Some(position) = room.assigned_guests.iter().position(|id| id == guest_id) else {
            return false;
        };

        room.assigned_guests.remove(position);
        room.available += 1;

        info!(
            "Released guest {} from room {} ({} left)",
            guest_id, room.id, room.available
        );
        let room_id = room.id.clone();
        self.publish(AssignmentEvent::room_released(&room_id, guest_id));
        true
    }

    fn room_index(&self, room_id: &str) -> AssignmentResult<usize> {
        self.rooms
            .iter()
            .position(|r| r.id == room_id)
            .ok_or_else(|| AssignmentError::not_found("room", room_id))
    }

    fn publish(&self, event: AssignmentEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::empty()
    }
}

use std::collections::HashSet;

use serde::Serialize;
use seatplan_core::{
    build_groups, create_guest_map, AssignmentError, AssignmentResult, Guest, GuestGroup,
};
use seatplan_shared::AssignmentEvent;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::table::Table;

const EVENT_BUFFER: usize = 64;

/// Aggregate occupancy across all tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub seated: usize,
    pub capacity: usize,
}

/// Single source of truth for who sits where.
///
/// Every mutating operation either completes fully or leaves the store
/// untouched, and emits an [`AssignmentEvent`] to subscribers on success.
pub struct SeatingStore {
    tables: Vec<Table>,
    guests: Vec<Guest>,
    guest_ids: HashSet<String>,
    events: broadcast::Sender<AssignmentEvent>,
}

impl SeatingStore {
    pub fn new(tables: Vec<Table>, guests: Vec<Guest>) -> AssignmentResult<Self> {
        let guest_ids = create_guest_map(&guests)?.into_keys().collect();
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let mut store = Self {
            tables: Vec::with_capacity(tables.len()),
            guests,
            guest_ids,
            events,
        };
        for table in tables {
            store.insert_table(table)?;
        }
        Ok(store)
    }

    pub fn empty() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            tables: Vec::new(),
            guests: Vec::new(),
            guest_ids: HashSet::new(),
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

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn guests(&self) -> &[Guest] {
        &self.guests
    }

    pub fn table(&self, table_id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == table_id)
    }

    /// Table id and seat index currently held by `guest_id`.
    pub fn seat_of(&self, guest_id: &str) -> Option<(&str, usize)> {
        self.tables.iter().find_map(|table| {
            table
                .seat_index_of(guest_id)
                .map(|index| (table.id.as_str(), index))
        })
    }

    pub fn is_seated(&self, guest_id: &str) -> bool {
        self.seat_of(guest_id).is_some()
    }

    pub fn get_seated_count(&self, table_id: &str) -> AssignmentResult<usize> {
        self.table(table_id)
            .map(Table::seated_count)
            .ok_or_else(|| AssignmentError::not_found("table", table_id))
    }

    pub fn occupancy(&self) -> Occupancy {
        self.tables.iter().fold(
            Occupancy { seated: 0, capacity: 0 },
            |acc, table| Occupancy {
                seated: acc.seated + table.seated_count(),
                capacity: acc.capacity + table.capacity as usize,
            },
        )
    }

    /// Guest groups with their `assigned` flag computed from current seats.
    pub fn groups(&self) -> Vec<GuestGroup> {
        build_groups(&self.guests, |id| self.is_seated(id))
    }

    /// Seat `guest_ids` on the lowest-index empty seats of the table, in
    /// input order. Returns the seat indices filled.
    pub fn assign_guests_to_seats<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        guest_ids: &[S],
    ) -> AssignmentResult<Vec<usize>> {
        let table_index = self.table_index(table_id)?;

        let mut requested = HashSet::with_capacity(guest_ids.len());
        for id in guest_ids.iter().map(|id| id.as_ref()) {
            if !self.guest_ids.contains(id) {
                return Err(AssignmentError::not_found("guest", id));
            }
            if !requested.insert(id) {
                return Err(AssignmentError::DuplicateId(id.to_string()));
            }
        }

        for id in guest_ids.iter().map(|id| id.as_ref()) {
            if let Some((seated_at, _)) = self.seat_of(id) {
                return Err(AssignmentError::AlreadySeatedElsewhere {
                    guest_id: id.to_string(),
                    table_id: seated_at.to_string(),
                });
            }
        }

        let table = &mut self.tables[table_index];
        let empty: Vec<usize> = table
            .seats
            .iter()
            .enumerate()
            .filter(|(_, seat)| seat.is_empty())
            .map(|(index, _)| index)
            .collect();

        if guest_ids.len() > empty.len() {
            return Err(AssignmentError::CapacityExceeded {
                requested: guest_ids.len(),
                available: empty.len(),
            });
        }

        if guest_ids.is_empty() {
            return Ok(Vec::new());
        }

        let filled: Vec<usize> = empty.into_iter().take(guest_ids.len()).collect();
        for (&index, id) in filled.iter().zip(guest_ids) {
            table.seats[index].guest_id = Some(id.as_ref().to_string());
        }

        let seated: Vec<String> = guest_ids.iter().map(|id| id.as_ref().to_string()).collect();
        info!(
            "Seated {} guest(s) at table {} ({}/{})",
            seated.len(),
            table_id,
            table.seated_count(),
            table.capacity
        );
        self.publish(AssignmentEvent::guests_seated(table_id, seated));

        Ok(filled)
    }

    /// Seat every not-yet-seated member of a group at the table, all or nothing.
    pub fn assign_group_to_table(
        &mut self,
        table_id: &str,
        group_id: &str,
    ) -> AssignmentResult<Vec<usize>> {
        // A relation key wins over a solo guest whose id happens to match it.
        let mut members: Vec<&Guest> = self
            .guests
            .iter()
            .filter(|g| g.group.as_deref() == Some(group_id))
            .collect();
        if members.is_empty() {
            members = self
                .guests
                .iter()
                .filter(|g| g.group.is_none() && g.id == group_id)
                .collect();
        }
        if members.is_empty() {
            return Err(AssignmentError::not_found("group", group_id));
        }

        let pending: Vec<String> = members
            .into_iter()
            .filter(|g| !self.is_seated(&g.id))
            .map(|g| g.id.clone())
            .collect();

        self.assign_guests_to_seats(table_id, pending.as_slice())
    }

    /// Clear seats on the table held by any of `guest_ids`. Ids not seated
    /// there are ignored. Returns the number of seats cleared.
    pub fn remove_guests_from_table<S: AsRef<str>>(
        &mut self,
        table_id: &str,
        guest_ids: &[S],
    ) -> AssignmentResult<usize> {
        let table_index = self.table_index(table_id)?;
        let targets: HashSet<&str> = guest_ids.iter().map(|id| id.as_ref()).collect();

        let released = release_seats(&mut self.tables[table_index], |id| targets.contains(id));
        if released.is_empty() {
            debug!("No matching guests to remove at table {}", table_id);
            return Ok(0);
        }

        info!("Removed {} guest(s) from table {}", released.len(), table_id);
        let count = released.len();
        self.publish(AssignmentEvent::guests_unseated(table_id, released));
        Ok(count)
    }

    /// Clear every seat on the table. Returns the released guest ids.
    pub fn unassign_table_guests(&mut self, table_id: &str) -> AssignmentResult<Vec<String>> {
        let table_index = self.table_index(table_id)?;
        let released = release_seats(&mut self.tables[table_index], |_| true);

        if !released.is_empty() {
            info!("Released all {} seat(s) at table {}", released.len(), table_id);
            self.publish(AssignmentEvent::guests_unseated(table_id, released.clone()));
        }
        Ok(released)
    }

    /// Replace the guest list and clear any seat whose occupant is gone.
    /// Returns the number of seats cleared.
    pub fn update_guest_assignments(&mut self, guests: Vec<Guest>) -> AssignmentResult<usize> {
        let guest_ids: HashSet<String> = create_guest_map(&guests)?.into_keys().collect();

        let mut cleared = Vec::new();
        for table in &mut self.tables {
            cleared.extend(release_seats(table, |id| !guest_ids.contains(id)));
        }

        self.guests = guests;
        self.guest_ids = guest_ids;

        if !cleared.is_empty() {
            info!("Reconciled guest list, cleared {} seat(s)", cleared.len());
            let count = cleared.len();
            self.publish(AssignmentEvent::guests_reconciled(cleared));
            return Ok(count);
        }
        Ok(0)
    }

    pub fn add_table(&mut self, table: Table) -> AssignmentResult<()> {
        let table_id = table.id.clone();
        self.insert_table(table)?;
        info!("Added table {}", table_id);
        self.publish(AssignmentEvent::table_added(&table_id));
        Ok(())
    }

    /// Release the table's seats, then drop it.
    pub fn remove_table(&mut self, table_id: &str) -> AssignmentResult<Table> {
        self.unassign_table_guests(table_id)?;
        let table_index = self.table_index(table_id)?;
        let table = self.tables.remove(table_index);

        info!("Removed table {}", table_id);
        self.publish(AssignmentEvent::table_removed(table_id));
        Ok(table)
    }

    fn insert_table(&mut self, table: Table) -> AssignmentResult<()> {
        table.validate()?;
        if self.table(&table.id).is_some() {
            return Err(AssignmentError::DuplicateId(table.id.clone()));
        }

        let mut on_table = HashSet::new();
        for id in table.guest_ids() {
            if !self.guest_ids.contains(id) {
                return Err(AssignmentError::not_found("guest", id));
            }
            if !on_table.insert(id) {
                return Err(AssignmentError::AlreadySeatedElsewhere {
                    guest_id: id.to_string(),
                    table_id: table.id.clone(),
                });
            }
            if let Some((seated_at, _)) = self.seat_of(id) {
                return Err(AssignmentError::AlreadySeatedElsewhere {
                    guest_id: id.to_string(),
                    table_id: seated_at.to_string(),
                });
            }
        }

        self.tables.push(table);
        Ok(())
    }

    fn table_index(&self, table_id: &str) -> AssignmentResult<usize> {
        self.tables
            .iter()
            .position(|t| t.id == table_id)
            .ok_or_else(|| AssignmentError::not_found("table", table_id))
    }

    fn publish(&self, event: AssignmentEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

impl Default for SeatingStore {
    fn default() -> Self {
        Self::empty()
    }
}

fn release_seats<F>(table: &mut Table, mut matches: F) -> Vec<String>
where
    F: FnMut(&str) -> bool,
{
    let mut released = Vec::new();
    for seat in &mut table.seats {
        if seat.guest_id.as_deref().is_some_and(&mut matches) {
            if let Some(id) = seat.guest_id.take() {
                released.push(id);
            }
        }
    }
    released
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{get_seated_count, TableType};

    fn guests(n: usize) -> Vec<Guest> {
        (1..=n)
            .map(|i| Guest::new(format!("g{}", i), format!("Guest {}", i)))
            .collect()
    }

    fn store_with(capacity: u32, guest_count: usize) -> SeatingStore {
        let table = Table::new("t1", "Table 1", TableType::Rectangle, capacity, 0.0, 0.0).unwrap();
        SeatingStore::new(vec![table], guests(guest_count)).unwrap()
    }

    fn seat_guest_ids(store: &SeatingStore, table_id: &str) -> Vec<Option<String>> {
        store
            .table(table_id)
            .unwrap()
            .seats
            .iter()
            .map(|s| s.guest_id.clone())
            .collect()
    }

    #[test]
    fn test_lowest_index_fill() {
        let mut store = store_with(4, 2);

        let filled = store.assign_guests_to_seats("t1", &["g1", "g2"]).unwrap();

        assert_eq!(filled, vec![0, 1]);
        let table = store.table("t1").unwrap();
        assert_eq!(table.seats[0].guest_id.as_deref(), Some("g1"));
        assert_eq!(table.seats[1].guest_id.as_deref(), Some("g2"));
        assert_eq!(get_seated_count(table), 2);
    }

    #[test]
    fn test_fill_reuses_gaps_first() {
        let mut store = store_with(4, 4);
        store.assign_guests_to_seats("t1", &["g1", "g2", "g3"]).unwrap();
        store.remove_guests_from_table("t1", &["g2"]).unwrap();

        let filled = store.assign_guests_to_seats("t1", &["g4"]).unwrap();
        assert_eq!(filled, vec![1]);
    }

    #[test]
    fn test_over_capacity_is_all_or_nothing() {
        let mut store = store_with(3, 5);
        store.assign_guests_to_seats("t1", &["g1"]).unwrap();
        let before = seat_guest_ids(&store, "t1");

        let err = store
            .assign_guests_to_seats("t1", &["g2", "g3", "g4"])
            .unwrap_err();

        assert_eq!(
            err,
            AssignmentError::CapacityExceeded { requested: 3, available: 2 }
        );
        assert_eq!(seat_guest_ids(&store, "t1"), before);
    }

    #[test]
    fn test_guest_seated_elsewhere_rejected() {
        let t1 = Table::new("t1", "One", TableType::Circle, 2, 0.0, 0.0).unwrap();
        let t2 = Table::new("t2", "Two", TableType::Circle, 2, 0.0, 0.0).unwrap();
        let mut store = SeatingStore::new(vec![t1, t2], guests(2)).unwrap();
        store.assign_guests_to_seats("t1", &["g1"]).unwrap();

        let err = store.assign_guests_to_seats("t2", &["g2", "g1"]).unwrap_err();

        assert_eq!(
            err,
            AssignmentError::AlreadySeatedElsewhere {
                guest_id: "g1".to_string(),
                table_id: "t1".to_string(),
            }
        );
        assert_eq!(store.get_seated_count("t2").unwrap(), 0);
    }

    #[test]
    fn test_unknown_table_and_guest() {
        let mut store = store_with(2, 1);

        assert!(matches!(
            store.assign_guests_to_seats("nope", &["g1"]),
            Err(AssignmentError::NotFound { entity: "table", .. })
        ));
        assert!(matches!(
            store.assign_guests_to_seats("t1", &["ghost"]),
            Err(AssignmentError::NotFound { entity: "guest", .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_in_request_rejected() {
        let mut store = store_with(4, 1);
        let err = store.assign_guests_to_seats("t1", &["g1", "g1"]).unwrap_err();
        assert_eq!(err, AssignmentError::DuplicateId("g1".to_string()));
        assert_eq!(store.get_seated_count("t1").unwrap(), 0);
    }

    #[test]
    fn test_remove_unknown_guest_is_noop() {
        let mut store = store_with(2, 2);
        store.assign_guests_to_seats("t1", &["g1"]).unwrap();
        let before = seat_guest_ids(&store, "t1");

        let removed = store.remove_guests_from_table("t1", &["g2", "stranger"]).unwrap();

        assert_eq!(removed, 0);
        assert_eq!(seat_guest_ids(&store, "t1"), before);
    }

    #[test]
    fn test_unassign_table_releases_everyone() {
        let mut store = store_with(3, 3);
        store.assign_guests_to_seats("t1", &["g1", "g2", "g3"]).unwrap();

        let released = store.unassign_table_guests("t1").unwrap();

        assert_eq!(released, vec!["g1", "g2", "g3"]);
        assert_eq!(store.get_seated_count("t1").unwrap(), 0);
    }

    #[test]
    fn test_reconciliation_on_guest_deletion() {
        let mut store = store_with(8, 7);
        store.assign_guests_to_seats("t1", &["g1", "g7"]).unwrap();
        assert_eq!(store.get_seated_count("t1").unwrap(), 2);

        let remaining: Vec<Guest> = guests(6);
        let cleared = store.update_guest_assignments(remaining).unwrap();

        assert_eq!(cleared, 1);
        assert_eq!(store.get_seated_count("t1").unwrap(), 1);
        assert!(store.table("t1").unwrap().seats[1].guest_id.is_none());
        assert!(!store.is_seated("g7"));
    }

    #[test]
    fn test_group_flag_tracks_member_seats() {
        let guest_list = vec![
            Guest::new("g1", "Ana").in_group("family-a"),
            Guest::new("g2", "Ben").in_group("family-a"),
            Guest::new("g3", "Cal"),
        ];
        let table = Table::new("t1", "One", TableType::Rectangle, 4, 0.0, 0.0).unwrap();
        let mut store = SeatingStore::new(vec![table], guest_list).unwrap();

        store.assign_guests_to_seats("t1", &["g1"]).unwrap();
        assert!(!store.groups()[0].assigned);

        store.assign_guests_to_seats("t1", &["g2"]).unwrap();
        assert!(store.groups()[0].assigned);

        store.remove_guests_from_table("t1", &["g1"]).unwrap();
        assert!(!store.groups()[0].assigned);
    }

    #[test]
    fn test_assign_group_seats_only_pending_members() {
        let guest_list = vec![
            Guest::new("g1", "Ana").in_group("family-a"),
            Guest::new("g2", "Ben").in_group("family-a"),
            Guest::new("g3", "Cid").in_group("family-a"),
        ];
        let t1 = Table::new("t1", "One", TableType::Rectangle, 2, 0.0, 0.0).unwrap();
        let t2 = Table::new("t2", "Two", TableType::Rectangle, 2, 0.0, 0.0).unwrap();
        let mut store = SeatingStore::new(vec![t1, t2], guest_list).unwrap();
        store.assign_guests_to_seats("t1", &["g1"]).unwrap();

        let filled = store.assign_group_to_table("t2", "family-a").unwrap();

        assert_eq!(filled, vec![0, 1]);
        assert!(store.groups()[0].assigned);
    }

    #[test]
    fn test_relation_and_solo_guest_with_same_key_stay_apart() {
        let guest_list = vec![
            Guest::new("smith", "Solo Person"),
            Guest::new("g2", "Ben").in_group("smith"),
            Guest::new("g3", "Cid").in_group("smith"),
        ];
        let table = Table::new("t1", "One", TableType::Circle, 4, 0.0, 0.0).unwrap();
        let mut store = SeatingStore::new(vec![table], guest_list).unwrap();

        assert_eq!(store.groups().len(), 2);

        store.assign_group_to_table("t1", "smith").unwrap();

        assert!(!store.is_seated("smith"));
        assert!(store.is_seated("g2"));
        assert!(store.is_seated("g3"));
        let groups = store.groups();
        assert!(!groups[0].assigned);
        assert_eq!(groups[1].total_size, 2);
        assert!(groups[1].assigned);
    }

    #[test]
    fn test_solo_guest_addressable_as_group() {
        let mut store = store_with(2, 2);

        assert_eq!(store.assign_group_to_table("t1", "g2").unwrap(), vec![0]);
        assert!(matches!(
            store.assign_group_to_table("t1", "nobody"),
            Err(AssignmentError::NotFound { entity: "group", .. })
        ));
    }

    #[test]
    fn test_capacity_invariant_holds_across_operations() {
        let mut store = store_with(3, 6);
        let _ = store.assign_guests_to_seats("t1", &["g1", "g2"]);
        let _ = store.assign_guests_to_seats("t1", &["g3", "g4"]);
        let _ = store.assign_guests_to_seats("t1", &["g5"]);
        let _ = store.assign_guests_to_seats("t1", &["g6"]);

        let table = store.table("t1").unwrap();
        assert!(get_seated_count(table) <= table.capacity as usize);
        assert_eq!(table.seats.len(), table.capacity as usize);
        assert_eq!(store.occupancy(), Occupancy { seated: 3, capacity: 3 });
    }

    #[test]
    fn test_new_rejects_guest_seated_twice() {
        let mut t1 = Table::new("t1", "One", TableType::Circle, 2, 0.0, 0.0).unwrap();
        let mut t2 = Table::new("t2", "Two", TableType::Circle, 2, 0.0, 0.0).unwrap();
        t1.seats[0].guest_id = Some("g1".to_string());
        t2.seats[1].guest_id = Some("g1".to_string());

        let result = SeatingStore::new(vec![t1, t2], guests(1));
        assert!(matches!(result, Err(AssignmentError::AlreadySeatedElsewhere { .. })));
    }

    #[test]
    fn test_remove_table_releases_then_drops() {
        let mut store = store_with(2, 2);
        store.assign_guests_to_seats("t1", &["g1", "g2"]).unwrap();

        let removed = store.remove_table("t1").unwrap();

        assert_eq!(removed.seated_count(), 0);
        assert!(store.tables().is_empty());
        assert!(!store.is_seated("g1"));
    }

    #[test]
    fn test_subscribers_receive_events() {
        let mut store = store_with(2, 1);
        let mut rx = store.subscribe();

        store.assign_guests_to_seats("t1", &["g1"]).unwrap();

        match rx.try_recv().unwrap() {
            AssignmentEvent::GuestsSeated { table_id, guest_ids, .. } => {
                assert_eq!(table_id, "t1");
                assert_eq!(guest_ids, vec!["g1"]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

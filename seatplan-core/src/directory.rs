use std::collections::HashMap;

use tracing::warn;

use crate::{AssignmentError, AssignmentResult, Guest, GuestGroup};

/// Build an id -> guest lookup. Duplicate ids are rejected instead of letting
/// the last entry win.
pub fn create_guest_map(guests: &[Guest]) -> AssignmentResult<HashMap<String, Guest>> {
    let mut map = HashMap::with_capacity(guests.len());
    for guest in guests {
        if map.insert(guest.id.clone(), guest.clone()).is_some() {
            warn!("Duplicate guest id in guest list: {}", guest.id);
            return Err(AssignmentError::DuplicateId(guest.id.clone()));
        }
    }
    Ok(map)
}

/// Grouping key. Relation keys and solo guest ids live in separate
/// keyspaces, so a guest id never merges into a relation of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GroupKey<'a> {
    Relation(&'a str),
    Solo(&'a str),
}

/// Fold guests on their relation key, in first-seen order of the key.
///
/// A guest without a key forms a group of one, identified by the guest's own
/// id and name. `is_seated` decides the `assigned` flag per member.
pub fn build_groups<F>(guests: &[Guest], is_seated: F) -> Vec<GuestGroup>
where
    F: Fn(&str) -> bool,
{
    let mut groups: Vec<GuestGroup> = Vec::new();
    let mut index: HashMap<GroupKey<'_>, usize> = HashMap::new();

    for guest in guests {
        let (key, id, name) = match guest.group.as_deref() {
            Some(relation) => (GroupKey::Relation(relation), relation, relation),
            None => (
                GroupKey::Solo(guest.id.as_str()),
                guest.id.as_str(),
                guest.name.as_str(),
            ),
        };

        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(GuestGroup {
                id: id.to_string(),
                name: name.to_string(),
                total_size: 0,
                member_ids: Vec::new(),
                assigned: true,
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.total_size += 1;
        group.member_ids.push(guest.id.clone());
        group.assigned = group.assigned && is_seated(&guest.id);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guests() -> Vec<Guest> {
        vec![
            Guest::new("g1", "Ana").in_group("smith"),
            Guest::new("g2", "Ben").in_group("jones"),
            Guest::new("g3", "Cal").in_group("smith"),
            Guest::new("g4", "Dee"),
        ]
    }

    #[test]
    fn test_guest_map_lookup() {
        let map = create_guest_map(&guests()).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map["g3"].name, "Cal");
    }

    #[test]
    fn test_guest_map_rejects_duplicate_ids() {
        let mut list = guests();
        list.push(Guest::new("g2", "Another Ben"));

        let err = create_guest_map(&list).unwrap_err();
        assert_eq!(err, AssignmentError::DuplicateId("g2".to_string()));
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let groups = build_groups(&guests(), |_| false);

        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["smith", "jones", "g4"]);
        assert_eq!(groups[0].total_size, 2);
        assert_eq!(groups[0].member_ids, vec!["g1", "g3"]);
        assert_eq!(groups[2].name, "Dee");
    }

    #[test]
    fn test_group_assigned_requires_every_member() {
        let only_g1 = build_groups(&guests(), |id| id == "g1");
        assert!(!only_g1[0].assigned);

        let both = build_groups(&guests(), |id| id == "g1" || id == "g3");
        assert!(both[0].assigned);
        assert!(!both[1].assigned);
    }

    #[test]
    fn test_solo_guest_never_joins_relation_with_same_name() {
        let list = vec![
            Guest::new("smith", "Solo Person"),
            Guest::new("g2", "Ben").in_group("smith"),
        ];

        let groups = build_groups(&list, |id| id == "smith");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "Solo Person");
        assert_eq!(groups[0].member_ids, vec!["smith"]);
        assert!(groups[0].assigned);
        assert_eq!(groups[1].name, "smith");
        assert_eq!(groups[1].total_size, 1);
        assert_eq!(groups[1].member_ids, vec!["g2"]);
        assert!(!groups[1].assigned);
    }

    #[test]
    fn test_relation_alias_deserializes() {
        let guest: Guest =
            serde_json::from_str(r#"{"id":"g9","name":"Eve","relation":"family-1"}"#).unwrap();
        assert_eq!(guest.group.as_deref(), Some("family-1"));
    }
}

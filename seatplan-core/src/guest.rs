use serde::{Deserialize, Serialize};

/// An invited guest. `group` is the shared relation key (a family or party
/// identifier) used to fold guests into [`GuestGroup`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "relation", skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Guest {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Derived view over guests sharing a relation key. Never persisted; it is
/// rebuilt from the guest list and seat occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestGroup {
    pub id: String,
    pub name: String,
    pub total_size: usize,
    pub member_ids: Vec<String>,
    /// True iff every member currently occupies a seat.
    pub assigned: bool,
}

//! Inter-group topology: the local group and its siblings.

use serde::{Deserialize, Serialize};

use crate::{GroupAddr, GroupId, MapError, MAX_GROUP_SIZE};

/// What the mesh knows about one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub base: GroupAddr,
    /// How many of the group's slots are occupied.
    pub occupied: u16,
}

impl GroupRecord {
    /// Whether the group has no vacant slot left.
    pub fn is_full(&self) -> bool {
        self.occupied as usize >= MAX_GROUP_SIZE
    }
}

/// A peer's view of the inter-group structure, as shipped over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSnapshot {
    /// The sender's own group.
    pub own: GroupId,
    pub groups: Vec<GroupRecord>,
}

impl ExternalSnapshot {
    /// Bounds-check the snapshot: the sender's own group must appear, and
    /// no group may claim more occupants than slots.
    pub fn validate(&self) -> Result<(), MapError> {
        if self.groups.iter().all(|g| g.id != self.own)
            || self.groups.iter().any(|g| g.occupied as usize > MAX_GROUP_SIZE)
        {
            return Err(MapError::SnapshotTooLarge {
                slots: self.groups.len(),
                links: 0,
            });
        }
        Ok(())
    }
}

/// The local node's view of the inter-group structure.
///
/// Adopted whole from the first responsive peer during a join; later updates
/// come from the routing subsystem, outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalMap {
    own: GroupId,
    groups: Vec<GroupRecord>,
}

impl ExternalMap {
    /// Adopt a validated snapshot as the local external view.
    pub fn adopt(own: GroupId, snapshot: ExternalSnapshot) -> Self {
        Self {
            own,
            groups: snapshot.groups,
        }
    }

    /// The group the local node belongs to.
    pub fn own_group(&self) -> GroupId {
        self.own
    }

    pub fn groups(&self) -> &[GroupRecord] {
        &self.groups
    }

    /// Look up one group's record.
    pub fn group(&self, id: GroupId) -> Option<&GroupRecord> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// The snapshot this node would serve to a joining peer.
    pub fn snapshot(&self) -> ExternalSnapshot {
        ExternalSnapshot {
            own: self.own,
            groups: self.groups.clone(),
        }
    }
}

//! Slot identities and per-slot records.

use serde::{Deserialize, Serialize};

use crate::{MAX_GROUP_SIZE, MAX_NEIGHBOR_LINKS};

/// Index of one addressable slot within a group.
///
/// Always in `[0, MAX_GROUP_SIZE)`; the representation makes out-of-range
/// values unconstructible, so decoded wire data cannot smuggle one in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct SlotId(u8);

impl SlotId {
    /// Create a slot id from a raw index, if it is in range.
    pub fn new(raw: usize) -> Option<Self> {
        (raw < MAX_GROUP_SIZE).then(|| Self(raw as u8))
    }

    /// The raw index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Re-express this id, given relative to `from_root`, as relative to
    /// `to_root`.
    ///
    /// Returns `None` when the translated index falls outside the group.
    pub fn translate(self, from_root: SlotId, to_root: SlotId) -> Option<SlotId> {
        let shifted = self.0 as i32 - from_root.0 as i32 + to_root.0 as i32;
        if (0..MAX_GROUP_SIZE as i32).contains(&shifted) {
            Some(Self(shifted as u8))
        } else {
            None
        }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Occupancy state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SlotState {
    /// No node occupies this slot.
    #[default]
    Vacant,
    /// A remote node occupies this slot.
    Occupied,
    /// The local node occupies this slot. Provisional ("day node") until
    /// promotion completes.
    Local { provisional: bool },
}

impl SlotState {
    /// Whether a node (local or remote) occupies the slot.
    pub fn is_occupied(self) -> bool {
        !matches!(self, SlotState::Vacant)
    }
}

/// A neighbor link from one slot to another within the same group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// The slot at the far end of the link.
    pub to: SlotId,
    /// Round-trip time over the link, in milliseconds.
    pub rtt_ms: u32,
}

/// What one group slot holds: its occupancy and its neighbor links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SlotRecord {
    pub state: SlotState,
    pub links: Vec<Link>,
}

impl SlotRecord {
    /// An occupied record with the given links.
    pub fn occupied(links: Vec<Link>) -> Self {
        Self {
            state: SlotState::Occupied,
            links,
        }
    }

    /// Whether the record respects the per-slot link bound.
    pub fn links_in_bounds(&self) -> bool {
        self.links.len() <= MAX_NEIGHBOR_LINKS
    }
}

//! Warren topology model
//!
//! The mesh is organized into *groups*: clusters of up to [`MAX_GROUP_SIZE`]
//! addressable slots sharing a common address prefix. A node's identity is a
//! slot inside one group; its world-view is an [`InternalMap`] (slot occupancy
//! and neighbor links inside its own group) plus an [`ExternalMap`]
//! (inter-group structure).
//!
//! # Design
//!
//! Slot ids are explicit integer indices into an owned, bounds-checked
//! sequence. Cross-group translation is index arithmetic with explicit range
//! checks; an id that falls outside `[0, MAX_GROUP_SIZE)` after translation
//! is dropped, never wrapped.
//!
//! # Conflict Resolution
//!
//! When merging snapshots from several peers, the first source to supply a
//! record for a slot wins. Callers merge in discovery order, so better
//! responsiveness breaks ties.

mod external;
mod group;
mod internal;
mod slot;

pub use external::{ExternalMap, ExternalSnapshot, GroupRecord};
pub use group::{GroupAddr, GroupId};
pub use internal::{InternalMap, InternalSnapshot, MergeOutcome};
pub use slot::{Link, SlotId, SlotRecord, SlotState};

/// Number of addressable slots in one group.
pub const MAX_GROUP_SIZE: usize = 256;

/// Maximum number of neighbor links one slot may carry.
pub const MAX_NEIGHBOR_LINKS: usize = 16;

/// Errors raised by snapshot validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// A snapshot declared more slots or links than the bounds allow.
    #[error("snapshot exceeds bounds: {slots} slots, {links} links")]
    SnapshotTooLarge { slots: usize, links: usize },
}

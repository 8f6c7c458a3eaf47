//! Intra-group topology: slot occupancy and neighbor links.

use serde::{Deserialize, Serialize};

use crate::{
    GroupAddr, GroupId, Link, MapError, SlotId, SlotRecord, SlotState, MAX_GROUP_SIZE,
    MAX_NEIGHBOR_LINKS,
};

/// One peer's view of its own group, as shipped over the wire.
///
/// Slot ids are relative to the sender's group layout; `root` is the slot
/// the sender itself occupies, which the receiver uses to translate ids
/// into its own id space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalSnapshot {
    /// The sender's own slot.
    pub root: SlotId,
    /// Occupied slots and their links. Vacant slots are omitted.
    pub slots: Vec<(SlotId, SlotRecord)>,
}

impl InternalSnapshot {
    /// Bounds-check the declared block sizes.
    ///
    /// A snapshot claiming more slots than a group holds, or more links per
    /// slot than the link cap, is malformed and must be discarded whole.
    pub fn validate(&self) -> Result<(), MapError> {
        let links: usize = self.slots.iter().map(|(_, r)| r.links.len()).sum();
        if self.slots.len() > MAX_GROUP_SIZE
            || links > MAX_GROUP_SIZE * MAX_NEIGHBOR_LINKS
            || self.slots.iter().any(|(_, r)| !r.links_in_bounds())
        {
            return Err(MapError::SnapshotTooLarge {
                slots: self.slots.len(),
                links,
            });
        }
        Ok(())
    }
}

/// Counters describing what one snapshot merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Slots newly learned from this snapshot.
    pub added: usize,
    /// Slots skipped because an earlier source already supplied them.
    pub kept: usize,
    /// Records dropped because their id translated out of range.
    pub dropped: usize,
}

/// The local node's view of its own group.
///
/// Owns a fixed-size record per slot. Mutated only by the join attempt that
/// builds it; consumers see it only after a completed, successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalMap {
    group: GroupId,
    base: GroupAddr,
    slots: Vec<SlotRecord>,
    local: Option<SlotId>,
}

impl InternalMap {
    /// An empty map for a group: every slot vacant.
    pub fn new(group: GroupId, base: GroupAddr) -> Self {
        Self {
            group,
            base,
            slots: vec![SlotRecord::default(); MAX_GROUP_SIZE],
            local: None,
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn base(&self) -> GroupAddr {
        self.base
    }

    /// The local node's slot, once assigned.
    pub fn local_slot(&self) -> Option<SlotId> {
        self.local
    }

    /// The record for a slot.
    pub fn record(&self, slot: SlotId) -> &SlotRecord {
        &self.slots[slot.index()]
    }

    /// Claim a slot for the local node, provisionally ("day node").
    pub fn set_local(&mut self, slot: SlotId, links: Vec<Link>) {
        self.slots[slot.index()] = SlotRecord {
            state: SlotState::Local { provisional: true },
            links,
        };
        self.local = Some(slot);
    }

    /// Mark the local slot stable ("stable node"). No-op until
    /// [`set_local`](Self::set_local) has run.
    pub fn promote_local(&mut self) {
        if let Some(slot) = self.local {
            self.slots[slot.index()].state = SlotState::Local { provisional: false };
        }
    }

    /// Whether the local node is still provisional.
    pub fn local_is_provisional(&self) -> bool {
        matches!(
            self.local.map(|s| self.slots[s.index()].state),
            Some(SlotState::Local { provisional: true })
        )
    }

    /// Record a remote node occupying a slot.
    pub fn occupy(&mut self, slot: SlotId, record: SlotRecord) {
        self.slots[slot.index()] = record;
    }

    /// All slots no node occupies.
    pub fn vacant_slots(&self) -> Vec<SlotId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.state.is_occupied())
            .map(|(i, _)| SlotId::new(i).expect("index bounded by map length"))
            .collect()
    }

    /// Number of occupied slots.
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|r| r.state.is_occupied()).count()
    }

    /// Merge a validated peer snapshot into this map.
    ///
    /// `sender_slot` is the slot the sending peer actually occupies in this
    /// group (derived from its address); every id in the snapshot is
    /// translated from the sender's claimed root to it. Slots an earlier
    /// source already supplied are kept as-is, so merging in discovery order
    /// gives earlier (more responsive) peers precedence.
    pub fn merge_snapshot(
        &mut self,
        snapshot: &InternalSnapshot,
        sender_slot: SlotId,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for (id, record) in &snapshot.slots {
            let Some(translated) = id.translate(snapshot.root, sender_slot) else {
                outcome.dropped += 1;
                continue;
            };
            if self.slots[translated.index()].state.is_occupied() {
                outcome.kept += 1;
                continue;
            }

            // Links whose endpoints translate out of range are dropped with
            // the same check as the slot itself.
            let links: Vec<Link> = record
                .links
                .iter()
                .filter_map(|l| {
                    l.to.translate(snapshot.root, sender_slot).map(|to| Link {
                        to,
                        rtt_ms: l.rtt_ms,
                    })
                })
                .collect();

            self.slots[translated.index()] = SlotRecord::occupied(links);
            outcome.added += 1;
        }

        outcome
    }

    /// Produce the snapshot this node would serve to a joining peer.
    ///
    /// `None` until the local slot is assigned: a node with no identity has
    /// no root to anchor the snapshot to.
    pub fn snapshot(&self) -> Option<InternalSnapshot> {
        let root = self.local?;
        let slots = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, r)| r.state.is_occupied())
            .map(|(i, r)| {
                let id = SlotId::new(i).expect("index bounded by map length");
                // The local slot is just another occupied slot from the
                // receiver's point of view.
                (id, SlotRecord::occupied(r.links.clone()))
            })
            .collect();
        Some(InternalSnapshot { root, slots })
    }
}

//! Warren join (hooking) core
//!
//! A new node has no pre-existing identity: it must bootstrap its address,
//! its intra-group topology and its inter-group topology purely from the
//! replies of nearby peers found by an active scan, then transition from a
//! provisional "day node" to a "stable node". This crate implements that
//! procedure and the admission control that keeps it from running too often.
//!
//! # Overview
//!
//! - [`negotiate_address`] asks scanned peers for a free address slot and
//!   picks one uniformly at random from the first well-formed offer.
//! - [`fetch_external`] adopts the inter-group map from the first responsive
//!   peer; [`fetch_internal`] merges the intra-group map of *every*
//!   responsive peer, earlier (more responsive) sources winning conflicts.
//! - [`Hooker`] drives the whole attempt through the join state machine:
//!   `Idle → Scanning → NegotiatingAddress → FetchingTopology → Promoting →
//!   Active`, with an absorbing `Failed` on any attempt-ending error.
//! - [`promote`] runs the dnode→snode sequence: dwell, stable-node
//!   announcement, bounded acknowledgement wait, topology advertisement.
//! - [`RehookThrottle`] is the process-wide gate: at most one attempt in
//!   flight, and per-level windows with exponentially growing backoff.
//!
//! # Failure model
//!
//! Per-candidate problems (timeouts, malformed or unexpected replies) are
//! logged and skipped; the attempt only fails when a whole stage comes up
//! empty (`NoNeighbors`, `NoAddressAvailable`, `NoExternalMap`,
//! `NoInternalMap`). A failed attempt leaves no trace: the negotiated
//! address and any partially merged maps are discarded, and the caller
//! decides whether to try again.

mod config;
mod error;
mod fetch;
mod join;
mod negotiate;
mod promote;
mod rehook;

pub use config::HookConfig;
pub use error::{HookError, RehookError, Result};
pub use fetch::{fetch_external, fetch_internal};
pub use join::{Hooker, JoinReport, JoinState};
pub use negotiate::{negotiate_address, LocalIdentity};
pub use promote::{promote, PromotionReport};
pub use rehook::{
    rehook_instance_time, rehook_wait_time, JoinPermit, RehookThrottle, REHOOK_PER_INSTANCE,
};

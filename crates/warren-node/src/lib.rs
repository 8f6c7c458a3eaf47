//! Warren mesh daemon
//!
//! Wires the join core to the real world: a UDP transport for the
//! request/response exchanges and broadcasts, a responder serving the local
//! maps to joining peers, bootstrap-peer discovery, interface
//! configuration, and the operator surface (`run_join`, `request_rehook`).
//!
//! Architecture:
//! - Single daemon process; node state behind one `Arc<RwLock<_>>`
//! - A responder task services peer requests from the installed maps
//! - Join attempts build fresh state and install it atomically on success

mod config;
mod device;
mod discovery;
mod node;
mod responder;
mod transport;

pub use config::NodeConfig;
pub use device::Device;
pub use discovery::BootstrapRadar;
pub use node::{HookedState, NodeError, NodeState, WarrenNode};
pub use responder::serve;
pub use transport::UdpMesh;

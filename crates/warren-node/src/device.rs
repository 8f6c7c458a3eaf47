//! Network interface configuration.

use std::net::Ipv4Addr;

use tracing::{debug, info};
use warren_wire::{DeviceConfig, WireError};

/// How the daemon applies a negotiated address to the system.
#[derive(Debug, Clone)]
pub enum Device {
    /// Configure the named interface through the system `ip` tool, with a
    /// prefix covering the group's slot range.
    Iface(String),
    /// Log only. For dry runs and tests.
    Null,
}

impl DeviceConfig for Device {
    fn set_interface_address(&self, addr: Ipv4Addr) -> warren_wire::Result<()> {
        match self {
            Device::Iface(dev) => {
                let cidr = format!("{addr}/24");
                let status = std::process::Command::new("ip")
                    .args(["addr", "replace", &cidr, "dev", dev])
                    .status()
                    .map_err(|err| WireError::Device(format!("spawning ip: {err}")))?;
                if !status.success() {
                    return Err(WireError::Device(format!(
                        "ip addr replace {cidr} dev {dev} exited with {status}"
                    )));
                }
                info!(%addr, dev, "interface address configured");
                Ok(())
            }
            Device::Null => {
                debug!(%addr, "device configuration skipped (null device)");
                Ok(())
            }
        }
    }
}

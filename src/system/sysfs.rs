//! Physical port enumeration from `/sys/class/net`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, UacError};
use crate::model::{LinkState, UNKNOWN_MAC, UNKNOWN_SPEED};

/// Interface metadata as read from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInterface {
    pub name: String,
    pub mac_address: String,
    pub operstate: LinkState,
    pub speed: i64,
}

/// Source of host interfaces for the port registry.
pub trait InterfaceSource: Send + Sync {
    /// Enumerate physical candidates. An `Err` means enumeration as a whole
    /// failed; unreadable attributes of a single interface are not errors.
    fn enumerate(&self) -> Result<Vec<HostInterface>>;
}

/// Name prefixes of virtual and overlay devices.
const VIRTUAL_PREFIXES: &[&str] = &["veth", "wg", "bridge", "docker", "br-", "tun", "tap", "virbr"];

/// Whether `name` looks like a physical port.
///
/// Dotted names are sub-interfaces, typically ones this controller generated.
pub fn is_physical_candidate(name: &str) -> bool {
    name != "lo" && !name.contains('.') && !VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Reads `<root>/sys/class/net`.
#[derive(Debug, Clone)]
pub struct SysfsSource {
    class_net: PathBuf,
}

impl SysfsSource {
    pub fn new(root: &Path) -> Self {
        Self {
            class_net: root.join("sys/class/net"),
        }
    }

    fn read_interface(&self, name: &str) -> HostInterface {
        let dir = self.class_net.join(name);
        let attr = |file: &str| fs::read_to_string(dir.join(file)).ok();

        let mac_address = attr("address")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_MAC.to_string());
        let operstate = attr("operstate")
            .map(|s| LinkState::parse(&s))
            .unwrap_or(LinkState::Down);
        // Reading `speed` fails with EINVAL on links that are down.
        let speed = attr("speed")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(UNKNOWN_SPEED);

        HostInterface {
            name: name.to_string(),
            mac_address,
            operstate,
            speed,
        }
    }
}

impl InterfaceSource for SysfsSource {
    fn enumerate(&self) -> Result<Vec<HostInterface>> {
        let entries =
            fs::read_dir(&self.class_net).map_err(|e| UacError::io_at(&self.class_net, e))?;

        let mut interfaces: Vec<HostInterface> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| is_physical_candidate(name))
            .map(|name| self.read_interface(&name))
            .collect();

        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::path::Path;

    /// Create a fake `sys/class/net/<name>` entry under `root`.
    pub fn fake_iface(root: &Path, name: &str, mac: Option<&str>, state: Option<&str>, speed: Option<&str>) {
        let dir = root.join("sys/class/net").join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(mac) = mac {
            fs::write(dir.join("address"), format!("{}\n", mac)).unwrap();
        }
        if let Some(state) = state {
            fs::write(dir.join("operstate"), format!("{}\n", state)).unwrap();
        }
        if let Some(speed) = speed {
            fs::write(dir.join("speed"), format!("{}\n", speed)).unwrap();
        }
    }
}

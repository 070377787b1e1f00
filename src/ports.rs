//! Port registry: discovered ports merged with persisted profile bindings.
//!
//! Discovery is authoritative for which ports exist, the snapshot for which
//! profile each one is bound to. Every read reconciles the two and writes the
//! result back.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Result, UacError};
use crate::model::PhysicalPort;
use crate::store::{JsonFileStore, Repository};
use crate::system::{HostInterface, InterfaceSource};

pub struct PortRegistry {
    store: JsonFileStore<PhysicalPort>,
    source: Box<dyn InterfaceSource>,
}

impl PortRegistry {
    pub fn new(store_path: impl Into<PathBuf>, source: Box<dyn InterfaceSource>) -> Self {
        Self {
            store: JsonFileStore::lenient(store_path),
            source,
        }
    }

    /// Enumerate, or `None` when enumeration as a whole failed.
    fn enumerate(&self) -> Option<Vec<HostInterface>> {
        match self.source.enumerate() {
            Ok(found) => Some(found),
            Err(e) => {
                tracing::warn!(error = %e, "port discovery failed; keeping last known snapshot");
                None
            }
        }
    }

    /// Discover ports, merge bindings from the snapshot and persist the result.
    ///
    /// A failed enumeration returns an empty list and leaves the snapshot as
    /// it was, so an empty result is ambiguous: no hardware, or no discovery.
    pub fn discover(&self) -> Result<Vec<PhysicalPort>> {
        let Some(found) = self.enumerate() else {
            return Ok(Vec::new());
        };
        self.store.update(|snapshot| {
            reconcile(snapshot, found);
            Ok(snapshot.clone())
        })
    }

    /// The last persisted snapshot, without touching the host.
    pub fn snapshot(&self) -> Result<Vec<PhysicalPort>> {
        self.store.list()
    }

    /// Bind `port_name` to `profile_id`, or unbind it with `None`.
    ///
    /// Does not regenerate artifacts.
    pub fn assign(&self, port_name: &str, profile_id: Option<String>) -> Result<Vec<PhysicalPort>> {
        let Some(found) = self.enumerate() else {
            return Err(UacError::not_found("port", port_name));
        };
        self.store.update(|snapshot| {
            reconcile(snapshot, found);
            let port = snapshot
                .iter_mut()
                .find(|p| p.name == port_name)
                .ok_or_else(|| UacError::not_found("port", port_name))?;

            tracing::info!(
                port = port_name,
                from = ?port.assigned_profile_id,
                to = ?profile_id,
                "port binding changed"
            );
            port.assigned_profile_id = profile_id;
            Ok(snapshot.clone())
        })
    }

    /// Clear every binding to `profile_id`. Returns the number of ports unbound.
    ///
    /// Runs against the last snapshot when discovery fails so a cascade is
    /// never lost to a transient enumeration error.
    pub fn unbind_profile(&self, profile_id: &str) -> Result<usize> {
        let found = self.enumerate();
        self.store.update(|snapshot| {
            if let Some(found) = found {
                reconcile(snapshot, found);
            }
            let mut unbound = 0;
            for port in snapshot.iter_mut() {
                if port.assigned_profile_id.as_deref() == Some(profile_id) {
                    port.assigned_profile_id = None;
                    unbound += 1;
                }
            }
            if unbound > 0 {
                tracing::info!(profile = profile_id, ports = unbound, "unbound deleted profile");
            }
            Ok(unbound)
        })
    }
}

/// Replace `snapshot` with `found`, carrying bindings over by port name.
fn reconcile(snapshot: &mut Vec<PhysicalPort>, found: Vec<HostInterface>) {
    let mut bindings: HashMap<String, Option<String>> = snapshot
        .drain(..)
        .map(|p| (p.name, p.assigned_profile_id))
        .collect();

    for iface in found {
        let assigned_profile_id = bindings.remove(&iface.name).flatten();
        snapshot.push(PhysicalPort {
            name: iface.name,
            mac_address: iface.mac_address,
            operstate: iface.operstate,
            speed: iface.speed,
            assigned_profile_id,
        });
    }

    if !bindings.is_empty() {
        let mut lost: Vec<String> = bindings
            .into_iter()
            .map(|(name, binding)| match binding {
                Some(profile) => format!("{} (bound to {})", name, profile),
                None => name,
            })
            .collect();
        lost.sort();
        tracing::warn!(ports = %lost.join(", "), "previously known ports disappeared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkState;
    use crate::system::sysfs::testing::fake_iface;
    use crate::system::SysfsSource;
    use tempfile::TempDir;

    struct FailingSource;

    impl InterfaceSource for FailingSource {
        fn enumerate(&self) -> Result<Vec<HostInterface>> {
            Err(UacError::not_found("directory", "/sys/class/net"))
        }
    }

    fn registry(root: &TempDir) -> PortRegistry {
        PortRegistry::new(
            root.path().join("state/ports.json"),
            Box::new(SysfsSource::new(root.path())),
        )
    }

    fn host(root: &TempDir, names: &[&str]) {
        for name in names {
            fake_iface(root.path(), name, Some("aa:bb:cc:dd:ee:ff"), Some("up"), Some("1000"));
        }
    }

    #[test]
    fn test_discover_persists_snapshot() {
        let root = TempDir::new().unwrap();
        host(&root, &["eth0", "eth1", "docker0"]);
        let reg = registry(&root);

        let ports = reg.discover().unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[1].operstate, LinkState::Up);
        assert!(ports.iter().all(|p| p.assigned_profile_id.is_none()));

        let on_disk: Vec<PhysicalPort> =
            serde_json::from_str(&std::fs::read_to_string(root.path().join("state/ports.json")).unwrap())
                .unwrap();
        assert_eq!(on_disk, ports);
    }

    #[test]
    fn test_assignment_visible_in_next_listing() {
        let root = TempDir::new().unwrap();
        host(&root, &["eth0", "eth1"]);
        let reg = registry(&root);

        reg.assign("eth1", Some("guest".into())).unwrap();
        let ports = reg.discover().unwrap();
        let eth1 = ports.iter().find(|p| p.name == "eth1").unwrap();
        assert_eq!(eth1.assigned_profile_id.as_deref(), Some("guest"));

        reg.assign("eth1", None).unwrap();
        let ports = reg.discover().unwrap();
        assert!(ports.iter().all(|p| p.assigned_profile_id.is_none()));
    }

    #[test]
    fn test_assign_unknown_port() {
        let root = TempDir::new().unwrap();
        host(&root, &["eth0"]);
        let reg = registry(&root);
        assert!(matches!(
            reg.assign("eth9", Some("guest".into())),
            Err(UacError::NotFound { kind: "port", .. })
        ));
    }

    #[test]
    fn test_vanished_port_is_dropped() {
        let root = TempDir::new().unwrap();
        host(&root, &["eth0", "eth1"]);
        let reg = registry(&root);
        reg.assign("eth1", Some("guest".into())).unwrap();

        std::fs::remove_dir_all(root.path().join("sys/class/net/eth1")).unwrap();
        let ports = reg.discover().unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name, "eth0");
    }

    #[test]
    fn test_failed_discovery_keeps_snapshot() {
        let root = TempDir::new().unwrap();
        host(&root, &["eth0"]);
        registry(&root).assign("eth0", Some("guest".into())).unwrap();

        let failing = PortRegistry::new(root.path().join("state/ports.json"), Box::new(FailingSource));
        assert!(failing.discover().unwrap().is_empty());
        assert_eq!(failing.snapshot().unwrap().len(), 1);

        let ports = registry(&root).discover().unwrap();
        assert_eq!(ports[0].assigned_profile_id.as_deref(), Some("guest"));
    }

    #[test]
    fn test_unbind_profile_cascades() {
        let root = TempDir::new().unwrap();
        host(&root, &["eth0", "eth1", "eth2"]);
        let reg = registry(&root);
        reg.assign("eth0", Some("guest".into())).unwrap();
        reg.assign("eth1", Some("guest".into())).unwrap();
        reg.assign("eth2", Some("corp".into())).unwrap();

        assert_eq!(reg.unbind_profile("guest").unwrap(), 2);
        let ports = reg.discover().unwrap();
        let bound: Vec<_> = ports
            .iter()
            .filter_map(|p| p.assigned_profile_id.as_deref())
            .collect();
        assert_eq!(bound, vec!["corp"]);
    }

    #[test]
    fn test_unbind_without_discovery_uses_snapshot() {
        let root = TempDir::new().unwrap();
        host(&root, &["eth0"]);
        registry(&root).assign("eth0", Some("guest".into())).unwrap();

        let failing = PortRegistry::new(root.path().join("state/ports.json"), Box::new(FailingSource));
        assert_eq!(failing.unbind_profile("guest").unwrap(), 1);

        let ports = registry(&root).discover().unwrap();
        assert!(ports[0].assigned_profile_id.is_none());
    }
}

//! Network profile store.

use std::path::PathBuf;

use ipnetwork::IpNetwork;

use crate::error::{Result, UacError};
use crate::model::NetworkProfile;
use crate::ports::PortRegistry;
use crate::store::{JsonFileStore, Repository};

pub const VLAN_ID_RANGE: std::ops::RangeInclusive<u16> = 1..=4094;

pub struct ProfileStore {
    store: JsonFileStore<NetworkProfile>,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonFileStore::new(path),
        }
    }

    pub fn list(&self) -> Result<Vec<NetworkProfile>> {
        self.store.list()
    }

    pub fn get(&self, id: &str) -> Result<Option<NetworkProfile>> {
        self.store.get(id)
    }

    /// Validate and insert or replace by id.
    pub fn upsert(&self, profile: NetworkProfile) -> Result<NetworkProfile> {
        let profile = validate(profile)?;
        tracing::info!(profile = %profile.id, vlan = ?profile.vlan_id, "saving network profile");
        self.store.put(profile)
    }

    /// Remove the profile and clear every port binding to it.
    ///
    /// Does not regenerate artifacts.
    pub fn delete(&self, id: &str, ports: &PortRegistry) -> Result<()> {
        if !self.store.delete(id)? {
            return Err(UacError::not_found("profile", id));
        }
        tracing::info!(profile = id, "deleted network profile");
        ports.unbind_profile(id)?;
        Ok(())
    }
}

/// Normalise empty strings to `None` and check ranges and formats.
pub fn validate(mut profile: NetworkProfile) -> Result<NetworkProfile> {
    profile.id = profile.id.trim().to_string();
    if profile.id.is_empty() {
        return Err(UacError::invalid("id", "profile id must not be empty"));
    }
    if profile.id.eq_ignore_ascii_case("none") {
        return Err(UacError::invalid("id", "`none` is reserved for unassigned ports"));
    }
    if profile.name.trim().is_empty() {
        profile.name = profile.id.clone();
    }

    if let Some(vlan) = profile.vlan_id {
        if !VLAN_ID_RANGE.contains(&vlan) {
            return Err(UacError::invalid(
                "vlan_id",
                format!("{} is outside 1-4094", vlan),
            ));
        }
    }

    profile.ip_cidr = profile
        .ip_cidr
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(cidr) = &profile.ip_cidr {
        validate_cidr("ip_cidr", cidr)?;
    }

    Ok(profile)
}

/// Accepts `addr/prefix` only; a bare address is ambiguous in a netplan file.
pub fn validate_cidr(field: &'static str, cidr: &str) -> Result<()> {
    if !cidr.contains('/') {
        return Err(UacError::invalid(field, format!("{} has no prefix length", cidr)));
    }
    cidr.parse::<IpNetwork>()
        .map(|_| ())
        .map_err(|e| UacError::invalid(field, format!("{}: {}", cidr, e)))
}

/// A value written as one token of a line-based artifact: no whitespace,
/// no control characters.
pub fn validate_token(field: &'static str, value: &str) -> Result<()> {
    if value.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(UacError::invalid(
            field,
            format!("{:?} must not contain whitespace or control characters", value),
        ));
    }
    Ok(())
}

/// Comma-separated networks, as in a WireGuard `AllowedIPs` line.
pub fn validate_network_list(field: &'static str, list: &str) -> Result<()> {
    let mut count = 0;
    for item in list.split(',').map(str::trim) {
        item.parse::<IpNetwork>()
            .map_err(|e| UacError::invalid(field, format!("{:?}: {}", item, e)))?;
        count += 1;
    }
    if count == 0 {
        return Err(UacError::invalid(field, "no networks given"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::sysfs::testing::fake_iface;
    use crate::system::SysfsSource;
    use tempfile::TempDir;

    fn guest() -> NetworkProfile {
        NetworkProfile {
            id: "guest".into(),
            name: "Guest Wi-Fi".into(),
            vlan_id: Some(30),
            ip_cidr: Some("10.30.0.1/24".into()),
            dhcp_server_enabled: true,
        }
    }

    #[test]
    fn test_validate_normalises() {
        let mut p = guest();
        p.id = "  guest ".into();
        p.name = String::new();
        p.ip_cidr = Some("   ".into());
        let p = validate(p).unwrap();
        assert_eq!(p.id, "guest");
        assert_eq!(p.name, "guest");
        assert_eq!(p.ip_cidr, None);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut p = guest();
        p.vlan_id = Some(4095);
        assert!(matches!(validate(p), Err(UacError::Invalid { field: "vlan_id", .. })));

        let mut p = guest();
        p.vlan_id = Some(0);
        assert!(validate(p).is_err());

        let mut p = guest();
        p.ip_cidr = Some("10.30.0.1".into());
        assert!(matches!(validate(p), Err(UacError::Invalid { field: "ip_cidr", .. })));

        let mut p = guest();
        p.ip_cidr = Some("10.30.0.300/24".into());
        assert!(validate(p).is_err());

        let mut p = guest();
        p.id = "None".into();
        assert!(validate(p).is_err());
    }

    #[test]
    fn test_ipv6_cidr_accepted() {
        let mut p = guest();
        p.ip_cidr = Some("fd00:30::1/64".into());
        assert!(validate(p).is_ok());
    }

    #[test]
    fn test_delete_cascades_to_ports() {
        let root = TempDir::new().unwrap();
        fake_iface(root.path(), "eth0", None, Some("up"), None);
        fake_iface(root.path(), "eth1", None, Some("up"), None);
        let ports = PortRegistry::new(
            root.path().join("ports.json"),
            Box::new(SysfsSource::new(root.path())),
        );
        let store = ProfileStore::new(root.path().join("profiles.json"));

        store.upsert(guest()).unwrap();
        ports.assign("eth0", Some("guest".into())).unwrap();
        ports.assign("eth1", Some("guest".into())).unwrap();

        store.delete("guest", &ports).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(ports
            .discover()
            .unwrap()
            .iter()
            .all(|p| p.assigned_profile_id.is_none()));

        assert!(matches!(
            store.delete("guest", &ports),
            Err(UacError::NotFound { .. })
        ));
    }
}

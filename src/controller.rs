//! Entry point for every operation the console exposes.
//!
//! Mutations of ports and profiles regenerate the network artifacts, peer
//! mutations regenerate the VPN artifacts. Everything here is synchronous
//! except the host reload.

use crate::config::Settings;
use crate::error::{Result, UacError};
use crate::model::{InterfaceSpec, NetworkProfile, PhysicalPort, VlanSpec, VpnPeer};
use crate::peers::PeerStore;
use crate::ports::PortRegistry;
use crate::profiles::ProfileStore;
use crate::synth::{
    ArtifactOutcome, ConfigSynthesizer, GenerationReport, InterfaceSummary, VpnReport,
    VpnSynthesizer,
};
use crate::system::{ApplyOutcome, InterfaceSource, SysfsSource};

/// Port listing after a binding change, with what regeneration did.
#[derive(Debug, Clone)]
pub struct PortAssignment {
    pub ports: Vec<PhysicalPort>,
    pub report: GenerationReport,
}

pub struct Controller {
    settings: Settings,
    ports: PortRegistry,
    profiles: ProfileStore,
    peers: PeerStore,
    network: ConfigSynthesizer,
    vpn: VpnSynthesizer,
}

impl Controller {
    pub fn new(settings: Settings) -> Self {
        let source = SysfsSource::new(&settings.sysfs_root);
        Self::with_source(settings, Box::new(source))
    }

    pub fn with_source(settings: Settings, source: Box<dyn InterfaceSource>) -> Self {
        Self {
            ports: PortRegistry::new(settings.ports_store(), source),
            profiles: ProfileStore::new(settings.profiles_store()),
            peers: PeerStore::new(settings.peers_store()),
            network: ConfigSynthesizer::from_settings(&settings),
            vpn: VpnSynthesizer::from_settings(&settings),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn list_ports(&self) -> Result<Vec<PhysicalPort>> {
        self.ports.discover()
    }

    /// Bind a port. `None`, `""` and `"none"` unbind it.
    pub fn assign_port(&self, port_name: &str, profile_id: Option<&str>) -> Result<PortAssignment> {
        let profile_id = normalize_profile_ref(profile_id);
        if let Some(id) = &profile_id {
            if self.profiles.get(id)?.is_none() {
                return Err(UacError::not_found("profile", id.clone()));
            }
        }
        let ports = self.ports.assign(port_name, profile_id)?;
        let report = self.network.regenerate(&ports, &self.profiles.list()?)?;
        Ok(PortAssignment { ports, report })
    }

    pub fn list_profiles(&self) -> Result<Vec<NetworkProfile>> {
        self.profiles.list()
    }

    pub fn save_profile(&self, profile: NetworkProfile) -> Result<(NetworkProfile, GenerationReport)> {
        let saved = self.profiles.upsert(profile)?;
        let report = self.regenerate_network()?;
        Ok((saved, report))
    }

    pub fn delete_profile(&self, id: &str) -> Result<GenerationReport> {
        self.profiles.delete(id, &self.ports)?;
        self.regenerate_network()
    }

    pub fn list_peers(&self) -> Result<Vec<VpnPeer>> {
        self.peers.list()
    }

    pub fn add_peer(&self, peer: VpnPeer) -> Result<(VpnPeer, VpnReport)> {
        let added = self.peers.add(peer)?;
        let report = self.regenerate_vpn()?;
        Ok((added, report))
    }

    pub fn delete_peer(&self, name: &str) -> Result<VpnReport> {
        self.peers.delete(name)?;
        self.regenerate_vpn()
    }

    pub fn create_vlan(&self, spec: &VlanSpec) -> Result<ArtifactOutcome> {
        self.network.create_vlan(spec)
    }

    pub fn modify_interface(&self, spec: &InterfaceSpec) -> Result<ArtifactOutcome> {
        self.network.modify_interface(spec)
    }

    pub fn list_interfaces(&self) -> Result<Vec<InterfaceSummary>> {
        let ports = self.ports.discover()?;
        Ok(self.network.list_interfaces(&ports))
    }

    /// Rebuild profile artifacts from the persisted bindings. Refreshes
    /// discovery first; if that fails the last snapshot is used.
    pub fn regenerate_network(&self) -> Result<GenerationReport> {
        self.ports.discover()?;
        let ports = self.ports.snapshot()?;
        self.network.regenerate(&ports, &self.profiles.list()?)
    }

    pub fn regenerate_vpn(&self) -> Result<VpnReport> {
        self.vpn.regenerate(&self.peers.list()?)
    }

    pub async fn apply_network_config(&self) -> Result<ApplyOutcome> {
        self.network.apply().await
    }
}

/// Map the unassigned sentinels to `None`.
pub fn normalize_profile_ref(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("none"))
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PeerMode;
    use crate::system::sysfs::testing::fake_iface;
    use std::fs;
    use tempfile::TempDir;

    fn controller(root: &TempDir, ifaces: &[&str]) -> Controller {
        for name in ifaces {
            fake_iface(root.path(), name, Some("52:54:00:12:34:56"), Some("up"), Some("1000"));
        }
        Controller::new(Settings::rooted_at(root.path()))
    }

    fn guest() -> NetworkProfile {
        NetworkProfile {
            id: "guest".into(),
            name: "Guest".into(),
            vlan_id: Some(30),
            ip_cidr: Some("10.30.0.1/24".into()),
            dhcp_server_enabled: true,
        }
    }

    fn guest_netplan(c: &Controller) -> std::path::PathBuf {
        c.settings().netplan_dir().join("20-uac-profile-eth1.30.yaml")
    }

    fn guest_chilli(c: &Controller) -> std::path::PathBuf {
        c.settings().chilli_dir().join("uac-profile-eth1.30.conf")
    }

    #[test]
    fn test_normalize_profile_ref() {
        assert_eq!(normalize_profile_ref(None), None);
        assert_eq!(normalize_profile_ref(Some("")), None);
        assert_eq!(normalize_profile_ref(Some("None")), None);
        assert_eq!(normalize_profile_ref(Some(" guest ")), Some("guest".into()));
    }

    #[test]
    fn test_guest_vlan_end_to_end() {
        let root = TempDir::new().unwrap();
        let c = controller(&root, &["eth0", "eth1"]);

        c.save_profile(guest()).unwrap();
        let assignment = c.assign_port("eth1", Some("guest")).unwrap();
        assert_eq!(assignment.report.written.len(), 2);

        let yaml = fs::read_to_string(guest_netplan(&c)).unwrap();
        assert!(yaml.contains("eth1.30"));
        assert!(yaml.contains("link: eth1"));
        assert!(yaml.contains("10.30.0.1/24"));
        let snippet = fs::read_to_string(guest_chilli(&c)).unwrap();
        assert!(snippet.contains("hs_network=10.30.0.1/24"));

        let ports = c.list_ports().unwrap();
        let eth1 = ports.iter().find(|p| p.name == "eth1").unwrap();
        assert_eq!(eth1.assigned_profile_id.as_deref(), Some("guest"));

        let report = c.regenerate_network().unwrap();
        assert!(report.is_noop());
    }

    #[test]
    fn test_unassign_with_sentinel_removes_artifacts() {
        let root = TempDir::new().unwrap();
        let c = controller(&root, &["eth1"]);
        c.save_profile(guest()).unwrap();
        c.assign_port("eth1", Some("guest")).unwrap();

        let assignment = c.assign_port("eth1", Some("none")).unwrap();
        assert_eq!(assignment.report.removed.len(), 2);
        assert!(!guest_netplan(&c).exists());
        assert!(!guest_chilli(&c).exists());
    }

    #[test]
    fn test_assign_unknown_profile_or_port() {
        let root = TempDir::new().unwrap();
        let c = controller(&root, &["eth1"]);
        assert!(matches!(
            c.assign_port("eth1", Some("ghost")),
            Err(UacError::NotFound { kind: "profile", .. })
        ));

        c.save_profile(guest()).unwrap();
        let err = c.assign_port("eth7", Some("guest")).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_delete_profile_cascades_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let c = controller(&root, &["eth0", "eth1"]);
        c.save_profile(guest()).unwrap();
        c.assign_port("eth0", Some("guest")).unwrap();
        c.assign_port("eth1", Some("guest")).unwrap();

        let report = c.delete_profile("guest").unwrap();
        assert_eq!(report.removed.len(), 4);
        assert!(c
            .list_ports()
            .unwrap()
            .iter()
            .all(|p| p.assigned_profile_id.is_none()));
        assert!(c.list_profiles().unwrap().is_empty());
    }

    #[test]
    fn test_editing_profile_rewrites_bound_artifacts() {
        let root = TempDir::new().unwrap();
        let c = controller(&root, &["eth1"]);
        c.save_profile(guest()).unwrap();
        c.assign_port("eth1", Some("guest")).unwrap();

        let mut moved = guest();
        moved.vlan_id = Some(31);
        moved.dhcp_server_enabled = false;
        c.save_profile(moved).unwrap();

        assert!(!guest_netplan(&c).exists());
        assert!(!guest_chilli(&c).exists());
        assert!(c
            .settings()
            .netplan_dir()
            .join("20-uac-profile-eth1.31.yaml")
            .exists());
    }

    #[test]
    fn test_peers_end_to_end() {
        let root = TempDir::new().unwrap();
        let c = controller(&root, &["eth1"]);

        let site_a = VpnPeer {
            name: "siteA".into(),
            mode: PeerMode::Routed {
                allowed_ips: Some("10.20.0.0/24".into()),
            },
            endpoint: "203.0.113.5:51820".into(),
            public_key: "K1".into(),
            is_active: true,
        };
        let branch = VpnPeer {
            name: "branch".into(),
            mode: PeerMode::Bridged {
                target_vlan: Some("eth1.30".into()),
            },
            endpoint: "vpn.example.net:443".into(),
            public_key: "K2".into(),
            is_active: true,
        };
        c.add_peer(site_a.clone()).unwrap();
        let (_, report) = c.add_peer(branch).unwrap();
        assert_eq!((report.routed_peers, report.bridged_peers), (1, 1));

        let wg = fs::read_to_string(c.settings().routed_artifact()).unwrap();
        assert!(wg.contains("# Peer: siteA\n[Peer]\nPublicKey = K1\n"));
        let script = fs::read_to_string(c.settings().bridge_artifact()).unwrap();
        assert!(script.contains("BridgeCreate branch /DEVICE:eth1.30 /TAP:no"));

        let mut dup = site_a;
        dup.public_key = "K9".into();
        assert!(matches!(c.add_peer(dup), Err(UacError::Conflict { .. })));
        assert_eq!(c.list_peers().unwrap().len(), 2);

        c.delete_peer("siteA").unwrap();
        let wg = fs::read_to_string(c.settings().routed_artifact()).unwrap();
        assert!(!wg.contains("siteA"));
        assert!(matches!(c.delete_peer("siteA"), Err(UacError::NotFound { .. })));
    }

    #[test]
    fn test_list_interfaces_includes_one_off_vlan() {
        let root = TempDir::new().unwrap();
        let c = controller(&root, &["eth0", "eth3"]);
        let out = c
            .create_vlan(&VlanSpec {
                vlan_id: 40,
                parent_interface: "eth3".into(),
                ip_cidr: "10.40.0.1/24".into(),
                dhcp_server_enabled: true,
                description: None,
            })
            .unwrap();
        assert_eq!(out.status, "created");

        let rows = c.list_interfaces().unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["eth0", "eth3", "eth3.40"]);
    }

    #[tokio::test]
    async fn test_apply_is_dry_run_when_rooted() {
        let root = TempDir::new().unwrap();
        let c = controller(&root, &[]);
        let outcome = c.apply_network_config().await.unwrap();
        assert!(outcome.message.starts_with("Dry run"));
    }
}

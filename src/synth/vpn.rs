//! WireGuard and SoftEther artifacts for the peer set.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::{Settings, WireguardSettings};
use crate::error::Result;
use crate::model::{PeerMode, VpnPeer};
use crate::store::write_atomic_with_mode;

pub const BRIDGE_HUB: &str = "UACBRIDGE";
pub const DEFAULT_ALLOWED_IPS: &str = "0.0.0.0/0";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VpnReport {
    pub routed_peers: usize,
    pub bridged_peers: usize,
    pub inactive_peers: usize,
    pub written: Vec<PathBuf>,
    /// Artifacts that could not be written for lack of permission.
    pub skipped: Vec<PathBuf>,
}

pub struct VpnSynthesizer {
    routed_path: PathBuf,
    bridge_path: PathBuf,
    wireguard: WireguardSettings,
}

impl VpnSynthesizer {
    pub fn new(routed_path: impl Into<PathBuf>, bridge_path: impl Into<PathBuf>, wireguard: WireguardSettings) -> Self {
        Self {
            routed_path: routed_path.into(),
            bridge_path: bridge_path.into(),
            wireguard,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.routed_artifact(),
            settings.bridge_artifact(),
            settings.wireguard.clone(),
        )
    }

    pub fn routed_path(&self) -> &Path {
        &self.routed_path
    }

    pub fn bridge_path(&self) -> &Path {
        &self.bridge_path
    }

    /// `wg0.conf` for the routed peers.
    pub fn render_routed(&self, peers: &[&VpnPeer]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[Interface]");
        let _ = writeln!(out, "# UAC WireGuard (L3) Interface");
        let _ = writeln!(out, "PrivateKey = {}", self.wireguard.private_key);
        let _ = writeln!(out, "ListenPort = {}", self.wireguard.listen_port);
        out.push('\n');

        for peer in peers {
            let PeerMode::Routed { allowed_ips } = &peer.mode else {
                continue;
            };
            let _ = writeln!(out, "# Peer: {}", peer.name);
            let _ = writeln!(out, "[Peer]");
            let _ = writeln!(out, "PublicKey = {}", peer.public_key);
            let _ = writeln!(out, "Endpoint = {}", peer.endpoint);
            let _ = writeln!(
                out,
                "AllowedIPs = {}",
                allowed_ips.as_deref().unwrap_or(DEFAULT_ALLOWED_IPS)
            );
            let _ = writeln!(out, "PersistentKeepalive = {}", self.wireguard.keepalive_secs);
            out.push('\n');
        }
        out
    }

    /// SoftEther `vpncmd` script cascading the bridged peers into one hub.
    pub fn render_bridge(&self, peers: &[&VpnPeer]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Hub {}", BRIDGE_HUB);

        for peer in peers {
            let PeerMode::Bridged { target_vlan } = &peer.mode else {
                continue;
            };
            let _ = writeln!(
                out,
                "CascadeCreate {} /SERVER:{} /HUB:DEFAULT /USERNAME:bridge",
                peer.name, peer.endpoint
            );
            let _ = writeln!(out, "CascadeOnline {}", peer.name);
            if let Some(target) = target_vlan {
                let _ = writeln!(out, "BridgeCreate {} /DEVICE:{} /TAP:no", peer.name, target);
            }
        }
        out
    }

    /// Rewrite both artifacts from the active peers.
    ///
    /// A permission failure on either file is logged and reported in
    /// `skipped`; the other file is still written.
    pub fn regenerate(&self, peers: &[VpnPeer]) -> Result<VpnReport> {
        let mut report = VpnReport::default();
        let mut routed = Vec::new();
        let mut bridged = Vec::new();
        for peer in peers {
            if !peer.is_active {
                report.inactive_peers += 1;
                continue;
            }
            match peer.mode {
                PeerMode::Routed { .. } => routed.push(peer),
                PeerMode::Bridged { .. } => bridged.push(peer),
            }
        }
        report.routed_peers = routed.len();
        report.bridged_peers = bridged.len();

        let routed_conf = self.render_routed(&routed);
        write_tolerant(&self.routed_path, &routed_conf, Some(0o600), &mut report)?;
        let bridge_script = self.render_bridge(&bridged);
        write_tolerant(&self.bridge_path, &bridge_script, None, &mut report)?;

        tracing::info!(
            routed = report.routed_peers,
            bridged = report.bridged_peers,
            inactive = report.inactive_peers,
            skipped = report.skipped.len(),
            "regenerated VPN artifacts"
        );
        Ok(report)
    }
}

fn write_tolerant(path: &Path, contents: &str, mode: Option<u32>, report: &mut VpnReport) -> Result<()> {
    match write_atomic_with_mode(path, contents.as_bytes(), mode) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "wrote VPN artifact");
            report.written.push(path.to_path_buf());
            Ok(())
        }
        Err(e) if e.is_permission_denied() => {
            tracing::warn!(path = %path.display(), error = %e, "cannot write VPN artifact");
            report.skipped.push(path.to_path_buf());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn synth(root: &TempDir) -> VpnSynthesizer {
        VpnSynthesizer::from_settings(&Settings::rooted_at(root.path()))
    }

    fn site_a() -> VpnPeer {
        VpnPeer {
            name: "siteA".into(),
            mode: PeerMode::Routed {
                allowed_ips: Some("10.20.0.0/24".into()),
            },
            endpoint: "203.0.113.5:51820".into(),
            public_key: "K1".into(),
            is_active: true,
        }
    }

    fn branch(target: Option<&str>) -> VpnPeer {
        VpnPeer {
            name: "branch".into(),
            mode: PeerMode::Bridged {
                target_vlan: target.map(String::from),
            },
            endpoint: "vpn.example.net:443".into(),
            public_key: "K2".into(),
            is_active: true,
        }
    }

    #[test]
    fn test_routed_peer_block() {
        let root = TempDir::new().unwrap();
        let s = synth(&root);
        let report = s.regenerate(&[site_a()]).unwrap();
        assert_eq!(report.routed_peers, 1);
        assert_eq!(report.written.len(), 2);

        let conf = fs::read_to_string(s.routed_path()).unwrap();
        let expected = "[Interface]\n\
            # UAC WireGuard (L3) Interface\n\
            PrivateKey = <LOCAL_PRIVATE_KEY>\n\
            ListenPort = 51820\n\
            \n\
            # Peer: siteA\n\
            [Peer]\n\
            PublicKey = K1\n\
            Endpoint = 203.0.113.5:51820\n\
            AllowedIPs = 10.20.0.0/24\n\
            PersistentKeepalive = 25\n\
            \n";
        assert_eq!(conf, expected);

        let script = fs::read_to_string(s.bridge_path()).unwrap();
        assert_eq!(script, "Hub UACBRIDGE\n");
    }

    #[test]
    fn test_allowed_ips_default() {
        let root = TempDir::new().unwrap();
        let s = synth(&root);
        let mut peer = site_a();
        peer.mode = PeerMode::Routed { allowed_ips: None };
        let conf = s.render_routed(&[&peer]);
        assert!(conf.contains("AllowedIPs = 0.0.0.0/0\n"));
    }

    #[test]
    fn test_bridge_script() {
        let root = TempDir::new().unwrap();
        let s = synth(&root);

        let with_target = branch(Some("eth1.30"));
        let script = s.render_bridge(&[&with_target]);
        assert_eq!(
            script.lines().collect::<Vec<_>>(),
            vec![
                "Hub UACBRIDGE",
                "CascadeCreate branch /SERVER:vpn.example.net:443 /HUB:DEFAULT /USERNAME:bridge",
                "CascadeOnline branch",
                "BridgeCreate branch /DEVICE:eth1.30 /TAP:no",
            ]
        );

        let without = branch(None);
        assert!(!s.render_bridge(&[&without]).contains("BridgeCreate"));
    }

    #[test]
    fn test_inactive_peers_are_omitted() {
        let root = TempDir::new().unwrap();
        let s = synth(&root);
        let mut inactive = site_a();
        inactive.is_active = false;

        let report = s.regenerate(&[inactive, branch(None)]).unwrap();
        assert_eq!(report.routed_peers, 0);
        assert_eq!(report.bridged_peers, 1);
        assert_eq!(report.inactive_peers, 1);
        assert!(!fs::read_to_string(s.routed_path()).unwrap().contains("[Peer]"));
    }

    #[test]
    fn test_deleted_peer_disappears() {
        let root = TempDir::new().unwrap();
        let s = synth(&root);
        s.regenerate(&[site_a(), branch(Some("eth1.30"))]).unwrap();
        s.regenerate(&[branch(Some("eth1.30"))]).unwrap();
        assert!(!fs::read_to_string(s.routed_path()).unwrap().contains("siteA"));
        assert!(fs::read_to_string(s.bridge_path()).unwrap().contains("CascadeOnline branch"));
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_failure_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let wg_dir = root.path().join("etc/wireguard");
        fs::create_dir_all(&wg_dir).unwrap();
        fs::set_permissions(&wg_dir, fs::Permissions::from_mode(0o500)).unwrap();

        // root ignores directory permissions
        if fs::write(wg_dir.join("write-check"), "").is_ok() {
            return;
        }

        let s = synth(&root);
        let report = s.regenerate(&[site_a(), branch(None)]).unwrap();
        assert_eq!(report.skipped, vec![s.routed_path().to_path_buf()]);
        assert_eq!(report.written, vec![s.bridge_path().to_path_buf()]);

        fs::set_permissions(&wg_dir, fs::Permissions::from_mode(0o700)).unwrap();
    }
}

//! Records persisted by the stores and the one-off interface requests.

use serde::{Deserialize, Serialize};

/// Link state as reported by `/sys/class/net/<iface>/operstate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    #[default]
    Down,
    Dormant,
    LowerLayerDown,
    NotPresent,
    Testing,
    #[serde(other)]
    Unknown,
}

impl LinkState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "up" => Self::Up,
            "down" => Self::Down,
            "dormant" => Self::Dormant,
            "lowerlayerdown" => Self::LowerLayerDown,
            "notpresent" => Self::NotPresent,
            "testing" => Self::Testing,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Dormant => "dormant",
            Self::LowerLayerDown => "lowerlayerdown",
            Self::NotPresent => "notpresent",
            Self::Testing => "testing",
            Self::Unknown => "unknown",
        }
    }
}

pub const UNKNOWN_MAC: &str = "unknown";
pub const UNKNOWN_SPEED: i64 = -1;

/// A physical port. Rebuilt from host state on every read; only
/// `assigned_profile_id` survives between reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalPort {
    pub name: String,
    #[serde(default = "default_mac")]
    pub mac_address: String,
    #[serde(default)]
    pub operstate: LinkState,
    /// Mb/s, `-1` when the driver does not report it.
    #[serde(default = "default_speed")]
    pub speed: i64,
    #[serde(default)]
    pub assigned_profile_id: Option<String>,
}

fn default_mac() -> String {
    UNKNOWN_MAC.into()
}

fn default_speed() -> i64 {
    UNKNOWN_SPEED
}

/// Declarative network configuration bindable to any number of ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    #[serde(default)]
    pub ip_cidr: Option<String>,
    #[serde(default)]
    pub dhcp_server_enabled: bool,
}

impl NetworkProfile {
    /// Interface name this profile produces on `port`: `eth2` or `eth2.20`.
    pub fn effective_interface(&self, port: &str) -> String {
        match self.vlan_id {
            Some(vlan) => format!("{}.{}", port, vlan),
            None => port.to_string(),
        }
    }
}

/// How a peer is attached: L3 routed tunnel or L2 bridged cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum PeerMode {
    #[serde(rename = "L3")]
    Routed {
        #[serde(default)]
        allowed_ips: Option<String>,
    },
    #[serde(rename = "L2")]
    Bridged {
        #[serde(default)]
        target_vlan: Option<String>,
    },
}

impl PeerMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Routed { .. } => "L3",
            Self::Bridged { .. } => "L2",
        }
    }
}

/// A remote VPN endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnPeer {
    pub name: String,
    #[serde(flatten)]
    pub mode: PeerMode,
    pub endpoint: String,
    pub public_key: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// A one-off VLAN created outside the profile model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanSpec {
    pub vlan_id: u16,
    pub parent_interface: String,
    pub ip_cidr: String,
    #[serde(default = "default_true")]
    pub dhcp_server_enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// A one-off ethernet override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InterfaceSpec {
    pub name: String,
    #[serde(default)]
    pub dhcp4: bool,
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    #[serde(default)]
    pub gateway4: Option<String>,
    #[serde(default)]
    pub nameservers: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(vlan_id: Option<u16>) -> NetworkProfile {
        NetworkProfile {
            id: "guest".into(),
            name: "Guest".into(),
            vlan_id,
            ip_cidr: None,
            dhcp_server_enabled: false,
        }
    }

    #[test]
    fn test_effective_interface() {
        assert_eq!(profile(Some(20)).effective_interface("eth2"), "eth2.20");
        assert_eq!(profile(None).effective_interface("eth2"), "eth2");
    }

    #[test]
    fn test_peer_wire_format() {
        let json = r#"{"name":"siteA","mode":"L3","endpoint":"203.0.113.5:51820","public_key":"K1","allowed_ips":"10.20.0.0/24","target_vlan":null}"#;
        let peer: VpnPeer = serde_json::from_str(json).unwrap();
        assert_eq!(
            peer.mode,
            PeerMode::Routed {
                allowed_ips: Some("10.20.0.0/24".into())
            }
        );
        assert!(peer.is_active);

        let value = serde_json::to_value(&peer).unwrap();
        assert_eq!(value["mode"], "L3");
        assert_eq!(value["allowed_ips"], "10.20.0.0/24");
    }

    #[test]
    fn test_bridged_peer_without_target() {
        let json = r#"{"name":"branch","mode":"L2","endpoint":"vpn.example.net:443","public_key":"K2","is_active":false}"#;
        let peer: VpnPeer = serde_json::from_str(json).unwrap();
        assert_eq!(peer.mode, PeerMode::Bridged { target_vlan: None });
        assert!(!peer.is_active);
    }

    #[test]
    fn test_port_defaults_and_link_state() {
        let port: PhysicalPort =
            serde_json::from_str(r#"{"name":"eth0","operstate":"weird"}"#).unwrap();
        assert_eq!(port.mac_address, UNKNOWN_MAC);
        assert_eq!(port.speed, UNKNOWN_SPEED);
        assert_eq!(port.operstate, LinkState::Unknown);
        assert_eq!(LinkState::parse("up\n"), LinkState::Up);
        assert_eq!(LinkState::parse("lowerlayerdown"), LinkState::LowerLayerDown);
    }
}
